//! Membership provider OAuth route handlers.
//!
//! Handles the sign-in flow against the membership provider:
//! - Login: Redirects to the provider's OAuth authorization page
//! - Callback: Validates state, exchanges the code, stores the identity
//! - Logout: Resets the visitor to anonymous
//!
//! Membership itself is not decided here; the callback only stores the
//! identity and token, and the next home-page load validates the token
//! through the access resolver.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use rand::Rng;
use serde::Deserialize;
use tower_sessions::Session;

use crate::models::{AccessUpdate, Identity, VisitorStore, session_keys};
use crate::state::AppState;

/// Query parameters from the provider's OAuth callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    /// Authorization code to exchange for a token.
    pub code: Option<String>,
    /// State parameter for CSRF protection.
    pub state: Option<String>,
    /// Error code if authorization failed.
    pub error: Option<String>,
    /// Error description.
    pub error_description: Option<String>,
}

/// Generate a cryptographically secure random string.
fn generate_random_string(length: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            // SAFETY: idx is always within bounds since random_range returns 0..CHARSET.len()
            char::from(*CHARSET.get(idx).expect("idx within bounds"))
        })
        .collect()
}

/// Initiate sign-in with the membership provider.
///
/// # Route
///
/// `GET /auth/login`
pub async fn login(State(state): State<AppState>, session: Session) -> Response {
    // Generate CSRF state
    let oauth_state = generate_random_string(32);

    // Store in session for validation on callback
    if let Err(e) = session
        .insert(session_keys::OAUTH_STATE, &oauth_state)
        .await
    {
        tracing::error!("Failed to store OAuth state in session: {}", e);
        return Redirect::to("/?error=session").into_response();
    }

    let redirect_uri = format!("{}/auth/callback", state.config().base_url);
    let auth_url = state
        .membership()
        .authorization_url(&redirect_uri, &oauth_state);

    Redirect::to(&auth_url).into_response()
}

/// Handle the provider's OAuth callback.
///
/// Validates the state parameter, exchanges the authorization code for a
/// token, fetches the member profile, and stores both in the session.
///
/// # Route
///
/// `GET /auth/callback`
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CallbackQuery>,
) -> Response {
    // Check for OAuth errors from the provider
    if let Some(error) = query.error {
        let description = query.error_description.unwrap_or_default();
        tracing::warn!("OAuth error: {} - {}", error, description);
        return Redirect::to("/?error=denied").into_response();
    }

    // Verify we have an authorization code
    let Some(code) = query.code else {
        tracing::warn!("OAuth callback missing code");
        return Redirect::to("/?error=missing_code").into_response();
    };

    // Verify state parameter (CSRF protection)
    let Some(returned_state) = query.state else {
        tracing::warn!("OAuth callback missing state");
        return Redirect::to("/?error=missing_state").into_response();
    };

    let stored_state: Option<String> = session
        .get(session_keys::OAUTH_STATE)
        .await
        .ok()
        .flatten();

    if stored_state.as_ref() != Some(&returned_state) {
        tracing::warn!("OAuth state mismatch");
        return Redirect::to("/?error=invalid_state").into_response();
    }

    // Clear the stored state (one-time use)
    let _ = session.remove::<String>(session_keys::OAUTH_STATE).await;

    // Exchange code for a token
    let redirect_uri = format!("{}/auth/callback", state.config().base_url);
    let token = match state.membership().exchange_code(&code, &redirect_uri).await {
        Ok(token) => token,
        Err(e) => {
            tracing::error!("Failed to exchange OAuth code: {}", e);
            return Redirect::to("/?error=token_exchange").into_response();
        }
    };

    // Fetch the member profile behind the token
    let profile = match state.membership().member_profile(&token.access_token).await {
        Ok(profile) => profile,
        Err(e) => {
            tracing::error!("Failed to fetch member profile: {}", e);
            return Redirect::to("/?error=profile").into_response();
        }
    };

    let mut store = VisitorStore::load(session).await;
    let update = AccessUpdate {
        membership: None,
        identity: Some(Identity::Session {
            id: profile.id,
            name: profile.name,
            username: profile.username,
        }),
        access_token: Some(token.access_token),
    };
    if let Err(e) = store.apply(update).await {
        tracing::error!("Failed to store member identity: {}", e);
        return Redirect::to("/?error=session").into_response();
    }

    tracing::info!("Member signed in");

    // Membership is decided by the access resolver on the next page load.
    Redirect::to("/").into_response()
}

/// Sign out.
///
/// Resets the visitor to anonymous without membership. The submission
/// counter is untouched; the hourly limit is per browser.
///
/// # Route
///
/// `POST /auth/logout`
pub async fn logout(session: Session) -> Response {
    let mut store = VisitorStore::load(session).await;
    if let Err(e) = store.sign_out().await {
        tracing::error!("Failed to clear visitor state: {}", e);
    }
    Redirect::to("/").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_random_string_length_and_charset() {
        let s = generate_random_string(32);
        assert_eq!(s.len(), 32);
        assert!(s.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_generate_random_string_varies() {
        let a = generate_random_string(32);
        let b = generate_random_string(32);
        assert_ne!(a, b);
    }
}
