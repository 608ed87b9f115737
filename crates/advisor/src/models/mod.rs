//! Domain models for the advisor.
//!
//! All state is transient and session-backed; there is no database.

pub mod quota;
pub mod visitor;

pub use quota::SubmissionWindow;
pub use visitor::{AccessUpdate, Identity, VisitorState, VisitorStore, session_keys};
