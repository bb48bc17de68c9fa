//! Caller capability extraction

use std::sync::Arc;
use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use serde::Deserialize;
use std::convert::Infallible;

use crate::{engine::Access, state::AppState};

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

#[derive(Debug, Default, Deserialize)]
struct AdminQuery {
    #[serde(default)]
    admin: bool,
}

/// Access level of the current request.
///
/// With an admin token configured, only a matching `X-Admin-Token` header
/// grants admin access. Without one, `?admin=true` does. Followers never
/// grant admin access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub Access);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        if state.is_follower() {
            return Ok(Caller(Access::ReadOnly));
        }

        let privileged = match &state.info.admin_token {
            Some(token) => parts
                .headers
                .get(ADMIN_TOKEN_HEADER)
                .and_then(|value| value.to_str().ok())
                .is_some_and(|value| value == token),
            None => Query::<AdminQuery>::try_from_uri(&parts.uri)
                .map(|Query(query)| query.admin)
                .unwrap_or(false),
        };

        Ok(Caller(Access::from_privileged(privileged)))
    }
}
