//! Caller resolution from the `Authorization: Bearer <token>` header
//!
//! Missing, unknown and expired tokens all resolve to an anonymous caller.
//! `MaybeActor` leaves the decision to the workflow; `SignedIn` is used on
//! routes that always need a session and rejects before the body is read,
//! so an anonymous caller is sent to the login page whatever it posted.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use confrarias_common::{Actor, Error};

use crate::error::ApiError;
use crate::AppState;

/// Session token carried by the request, if any
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// The caller, or `None` when anonymous
#[derive(Debug, Clone)]
pub struct MaybeActor(pub Option<Actor>);

impl MaybeActor {
    pub fn actor(&self) -> Option<&Actor> {
        self.0.as_ref()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeActor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(&parts.headers) else {
            return Ok(MaybeActor(None));
        };
        let user = state.identity.get_user(token).await?;
        Ok(MaybeActor(user.map(|u| u.actor())))
    }
}

/// The caller; anonymous requests are rejected with `NotAuthenticated`
#[derive(Debug, Clone)]
pub struct SignedIn(pub Actor);

impl SignedIn {
    /// In the `Option` form the workflows take
    pub fn actor(&self) -> Option<&Actor> {
        Some(&self.0)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for SignedIn {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let MaybeActor(actor) = MaybeActor::from_request_parts(parts, state).await?;
        actor.map(SignedIn).ok_or_else(|| Error::NotAuthenticated.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers), Some("abc123"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc123"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
