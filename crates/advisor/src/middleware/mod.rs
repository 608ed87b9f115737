//! HTTP middleware stack for the advisor.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Session layer (tower-sessions with in-memory store)
//! 4. Rate limiting on auth endpoints (governor)

pub mod auth;
pub mod rate_limit;
pub mod session;

pub use auth::RequireMember;
pub use rate_limit::auth_rate_limiter;
pub use session::create_session_layer;
