//! Visitor identity and membership state.
//!
//! The visitor state is the single source of truth for who the browser is and
//! whether it holds a membership. It lives in the session; all mutation goes
//! through [`VisitorStore`], so the access-resolution channels propose updates
//! instead of writing session keys directly.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;

/// Session keys for advisor state.
pub mod session_keys {
    /// Key for the visitor identity/membership state.
    pub const VISITOR: &str = "visitor";

    /// Key for the itinerary submission counter window.
    pub const SUBMISSION_WINDOW: &str = "submission_window";

    /// Key for the OAuth state parameter (CSRF protection).
    pub const OAUTH_STATE: &str = "oauth_state";

    /// Key for the id of the visitor's current itinerary build.
    pub const CURRENT_BUILD: &str = "current_build";
}

/// Who the browser is, as far as the advisor can tell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Identity {
    /// No identity source has resolved.
    #[default]
    Anonymous,
    /// A bare username, typically persisted by a code redemption.
    Cookie {
        /// Provider username.
        username: String,
    },
    /// A full identity from a completed OAuth sign-in.
    Session {
        /// Provider member id.
        id: String,
        /// Display name.
        name: String,
        /// Provider username.
        username: String,
    },
}

impl Identity {
    /// Name shown in the signed-in header, if any identity resolved.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::Cookie { username } => Some(username),
            Self::Session { name, .. } => Some(name),
        }
    }

    /// True when any identity source has resolved.
    #[must_use]
    pub const fn is_known(&self) -> bool {
        !matches!(self, Self::Anonymous)
    }
}

/// Session-persisted visitor state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitorState {
    /// Entitlement flag gating the itinerary form.
    pub membership: bool,
    /// Resolved identity.
    pub identity: Identity,
    /// Provider access token, used to re-validate the identity.
    pub access_token: Option<String>,
}

/// A proposed change to the visitor state.
///
/// Access-resolution channels return one of these; only [`VisitorStore::apply`]
/// writes it, so there is a single writer and no silent last-write-wins race
/// between channels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessUpdate {
    /// New membership flag, if the channel produced a verdict.
    pub membership: Option<bool>,
    /// New identity, if the channel produced one.
    pub identity: Option<Identity>,
    /// New access token, if the channel produced one.
    pub access_token: Option<String>,
}

impl AccessUpdate {
    /// An update that only sets the membership flag.
    #[must_use]
    pub const fn membership(granted: bool) -> Self {
        Self {
            membership: Some(granted),
            identity: None,
            access_token: None,
        }
    }

    /// True when the update carries no changes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.membership.is_none() && self.identity.is_none() && self.access_token.is_none()
    }
}

/// The session-backed store owning the visitor state.
///
/// Reads once per request, writes through on every applied update so the next
/// page load short-circuits network calls via the cached membership flag.
pub struct VisitorStore {
    session: Session,
    state: VisitorState,
}

impl VisitorStore {
    /// Load the visitor state from the session, defaulting to anonymous.
    pub async fn load(session: Session) -> Self {
        let state: VisitorState = session
            .get(session_keys::VISITOR)
            .await
            .ok()
            .flatten()
            .unwrap_or_default();
        Self { session, state }
    }

    /// Current state snapshot.
    #[must_use]
    pub const fn state(&self) -> &VisitorState {
        &self.state
    }

    /// Current membership flag.
    #[must_use]
    pub const fn membership(&self) -> bool {
        self.state.membership
    }

    /// Merge an update into the state and persist it.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be written.
    pub async fn apply(
        &mut self,
        update: AccessUpdate,
    ) -> Result<(), tower_sessions::session::Error> {
        if update.is_empty() {
            return Ok(());
        }
        if let Some(membership) = update.membership {
            self.state.membership = membership;
        }
        if let Some(identity) = update.identity {
            self.state.identity = identity;
        }
        if let Some(token) = update.access_token {
            self.state.access_token = Some(token);
        }
        self.session
            .insert(session_keys::VISITOR, &self.state)
            .await
    }

    /// Reset to an anonymous, membership-less visitor (sign-out).
    ///
    /// The submission counter is left alone: the hourly limit is per browser,
    /// not per identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be written.
    pub async fn sign_out(&mut self) -> Result<(), tower_sessions::session::Error> {
        self.state = VisitorState::default();
        self.session
            .insert(session_keys::VISITOR, &self.state)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name() {
        assert_eq!(Identity::Anonymous.display_name(), None);
        assert_eq!(
            Identity::Cookie {
                username: "bob".to_string()
            }
            .display_name(),
            Some("bob")
        );
        assert_eq!(
            Identity::Session {
                id: "mem_1".to_string(),
                name: "Bob B.".to_string(),
                username: "bob".to_string()
            }
            .display_name(),
            Some("Bob B.")
        );
    }

    #[test]
    fn test_is_known() {
        assert!(!Identity::Anonymous.is_known());
        assert!(
            Identity::Cookie {
                username: "bob".to_string()
            }
            .is_known()
        );
    }

    #[test]
    fn test_default_state_is_anonymous() {
        let state = VisitorState::default();
        assert!(!state.membership);
        assert_eq!(state.identity, Identity::Anonymous);
        assert!(state.access_token.is_none());
    }

    #[test]
    fn test_access_update_is_empty() {
        assert!(AccessUpdate::default().is_empty());
        assert!(!AccessUpdate::membership(true).is_empty());
    }

    #[test]
    fn test_visitor_state_round_trips_through_json() {
        let state = VisitorState {
            membership: true,
            identity: Identity::Session {
                id: "mem_1".to_string(),
                name: "Bob B.".to_string(),
                username: "bob".to_string(),
            },
            access_token: Some("tok_abc".to_string()),
        };
        let json = serde_json::to_string(&state).expect("serialize");
        let back: VisitorState = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, state);
    }
}
