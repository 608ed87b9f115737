//! Membership gate for route handlers.
//!
//! Provides an extractor for requiring a signed-in, entitled visitor in
//! route handlers.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::models::{VisitorState, session_keys};

/// Extractor that requires a signed-in member.
///
/// Visitors without an identity or without membership are sent back to the
/// home page, where the sign-in control and purchase call-to-action live.
pub struct RequireMember(pub VisitorState);

/// Error returned when membership is required but not present.
pub enum MemberRejection {
    /// Redirect to the home page (for HTML requests).
    RedirectToHome,
    /// Unauthorized response (for API requests).
    Unauthorized,
}

impl IntoResponse for MemberRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToHome => Redirect::to("/").into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        }
    }
}

impl<S> FromRequestParts<S> for RequireMember
where
    S: Send + Sync,
{
    type Rejection = MemberRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let is_api = parts.uri.path().starts_with("/api/");
        let reject = || {
            if is_api {
                MemberRejection::Unauthorized
            } else {
                MemberRejection::RedirectToHome
            }
        };

        // Get the session from extensions (set by SessionManagerLayer)
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(MemberRejection::Unauthorized)?;

        let visitor: VisitorState = session
            .get(session_keys::VISITOR)
            .await
            .ok()
            .flatten()
            .ok_or_else(reject)?;

        if !visitor.identity.is_known() || !visitor.membership {
            return Err(reject());
        }

        Ok(Self(visitor))
    }
}
