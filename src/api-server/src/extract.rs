//! Request extractors for identity and correlation

use crate::error::ApiError;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use communitycar_authz::Principal;
use std::convert::Infallible;
use uuid::Uuid;

/// Authenticated caller; rejects with 401 when the request carries no identity
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub Principal);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .map(CurrentPrincipal)
            .ok_or(ApiError::Unauthenticated)
    }
}

/// Id assigned by the request id middleware, or a fresh one outside it
#[derive(Debug, Clone, Copy)]
pub struct RequestId(pub Uuid);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequestId {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RequestId(
            parts.extensions.get::<Uuid>().copied().unwrap_or_else(Uuid::new_v4),
        ))
    }
}
