//! External collaborators and domain services.
//!
//! - [`membership`] - membership provider client (OAuth + entitlement checks)
//! - [`planner`] - itinerary planner service client
//! - [`access`] - membership resolution from URL and session signals
//! - [`builds`] - itinerary build pipeline and registry

pub mod access;
pub mod builds;
pub mod membership;
pub mod planner;

pub use access::{AccessParams, Resolution};
pub use builds::{BuildPhase, BuildRegistry};
pub use membership::MembershipClient;
pub use planner::PlannerClient;
