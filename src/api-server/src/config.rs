//! Application configuration
//!
//! Groups the library-level configs the server state is built from. Values
//! are filled from command line arguments in the binary.

use communitycar_authz::{AuditConfig, CacheConfig, PipelineConfig, RateLimitConfig};

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub rate_limit: RateLimitConfig,
    pub cache: CacheConfig,
    pub pipeline: PipelineConfig,
    pub audit: AuditConfig,
    /// Key anonymous callers by the first `x-forwarded-for` hop instead of
    /// the socket peer. Only safe behind a proxy that overwrites the header.
    pub trust_forwarded_for: bool,
}

impl AppConfig {
    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_audit(mut self, audit: AuditConfig) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.rate_limit.limit, 100);
        assert_eq!(config.rate_limit.window, Duration::from_secs(60));
        assert_eq!(config.pipeline.slow_request_threshold, Duration::from_millis(500));
        assert!(config.pipeline.enable_caching);
        assert!(!config.trust_forwarded_for);
    }
}
