//! HTTP route handlers for the advisor.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                  - Home page (runs access resolution)
//! GET  /health            - Health check
//!
//! # Auth
//! GET  /auth/login        - Redirect to the membership provider's OAuth page
//! GET  /auth/callback     - Handle the OAuth callback
//! POST /auth/logout       - Sign out
//!
//! # Itinerary
//! POST /itinerary         - Start an itinerary build (HTMX, membership-gated)
//! GET  /itinerary/status  - Current build phase (HTMX polling fragment)
//! ```

pub mod auth;
pub mod home;
pub mod itinerary;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::auth_rate_limiter;
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login))
        .route("/callback", get(auth::callback))
        .route("/logout", post(auth::logout))
        .layer(auth_rate_limiter())
}

/// Create the itinerary routes router.
pub fn itinerary_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(itinerary::submit))
        .route("/status", get(itinerary::status))
}

/// Create all routes for the advisor.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .nest("/auth", auth_routes())
        .nest("/itinerary", itinerary_routes())
}
