//! Access resolution.
//!
//! Three independent signals can grant membership: the access token behind a
//! signed-in identity, a redemption code carried in the URL, and a membership
//! id carried in the URL. The channels run in a fixed priority order
//! (session > code > membership-id) and stop at the first grant, so the
//! outcome is deterministic no matter how many signals arrive together.
//! Every channel is gated on the cached flag; a known member costs no
//! network calls.
//!
//! Channels never write the session themselves; they produce
//! [`AccessUpdate`]s that the visitor store applies.

use tracing::instrument;

use crate::config::MembershipConfig;
use crate::models::{AccessUpdate, Identity, VisitorStore};

use super::membership::{MembershipClient, Redemption};

/// What the caller should do after resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Render the page with the (possibly updated) visitor state.
    Render,
    /// Redirect to the bare path so the new identity is picked up everywhere.
    Reload,
}

/// Membership signals carried in the URL.
#[derive(Debug, Default, Clone)]
pub struct AccessParams {
    /// `?membershipId=` query parameter.
    pub membership_id: Option<String>,
    /// `?code=` query parameter.
    pub code: Option<String>,
}

/// Resolve the visitor's membership from all available signals.
///
/// Failures in any channel are logged and leave the prior state unchanged;
/// resolution never fails the page render.
#[instrument(skip_all)]
pub async fn resolve(
    client: &MembershipClient,
    config: &MembershipConfig,
    store: &mut VisitorStore,
    params: &AccessParams,
) -> Resolution {
    // A cached grant short-circuits every channel.
    if store.membership() {
        return Resolution::Render;
    }

    resolve_session_channel(client, store).await;
    if store.membership() {
        return Resolution::Render;
    }

    if resolve_code_channel(client, store, params).await == Resolution::Reload {
        return Resolution::Reload;
    }
    if store.membership() {
        return Resolution::Render;
    }

    resolve_membership_id_channel(client, config, store, params).await;
    Resolution::Render
}

/// Validate the access token behind an already-resolved identity.
async fn resolve_session_channel(client: &MembershipClient, store: &mut VisitorStore) {
    if !store.state().identity.is_known() {
        return;
    }
    let Some(token) = store.state().access_token.clone() else {
        return;
    };

    match client.validate_token(&token).await {
        Ok(valid) => {
            if let Err(e) = store.apply(AccessUpdate::membership(valid)).await {
                tracing::warn!(error = %e, "Failed to persist token validation result");
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Token validation failed; keeping prior membership");
        }
    }
}

/// Redeem a URL-carried code for a comp identity and membership.
async fn resolve_code_channel(
    client: &MembershipClient,
    store: &mut VisitorStore,
    params: &AccessParams,
) -> Resolution {
    let Some(code) = params.code.as_deref() else {
        return Resolution::Render;
    };

    match client.redeem_code(code).await {
        Ok(redemption) => {
            let reload = redemption.valid;
            if let Some(update) = update_from_redemption(&redemption) {
                if let Err(e) = store.apply(update).await {
                    tracing::warn!(error = %e, "Failed to persist code redemption");
                    return Resolution::Render;
                }
            }
            if reload {
                tracing::info!("Redemption code accepted");
                return Resolution::Reload;
            }
            Resolution::Render
        }
        Err(e) => {
            tracing::warn!(error = %e, "Code redemption failed; keeping prior membership");
            Resolution::Render
        }
    }
}

/// Look up the plan behind a URL-carried membership id.
async fn resolve_membership_id_channel(
    client: &MembershipClient,
    config: &MembershipConfig,
    store: &mut VisitorStore,
    params: &AccessParams,
) {
    let Some(membership_id) = params.membership_id.as_deref() else {
        return;
    };

    match client.lookup_plan(membership_id).await {
        Ok(plan) => {
            let granted = config.plan_grants_membership(&plan);
            if let Err(e) = store.apply(AccessUpdate::membership(granted)).await {
                tracing::warn!(error = %e, "Failed to persist plan lookup result");
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Membership lookup failed; keeping prior membership");
        }
    }
}

/// Translate a redemption outcome into a state update.
///
/// A valid code grants membership plus the returned identity. An invalid
/// code with a username still persists the partial identity, without
/// membership. An invalid code with nothing attached changes nothing.
fn update_from_redemption(redemption: &Redemption) -> Option<AccessUpdate> {
    let identity = redemption.user.as_ref().map(|user| Identity::Cookie {
        username: user.username.clone(),
    });

    if redemption.valid {
        return Some(AccessUpdate {
            membership: Some(true),
            identity,
            access_token: redemption.access_token.clone(),
        });
    }

    if identity.is_none() && redemption.access_token.is_none() {
        return None;
    }

    Some(AccessUpdate {
        membership: None,
        identity,
        access_token: redemption.access_token.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::membership::RedeemedUser;

    #[test]
    fn test_valid_redemption_grants_membership_and_identity() {
        let redemption = Redemption {
            valid: true,
            user: Some(RedeemedUser {
                username: "bob".to_string(),
            }),
            access_token: Some("tok_1".to_string()),
        };

        let update = update_from_redemption(&redemption).expect("update");
        assert_eq!(update.membership, Some(true));
        assert_eq!(
            update.identity,
            Some(Identity::Cookie {
                username: "bob".to_string()
            })
        );
        assert_eq!(update.access_token.as_deref(), Some("tok_1"));
    }

    #[test]
    fn test_invalid_redemption_with_user_keeps_membership_unset() {
        let redemption = Redemption {
            valid: false,
            user: Some(RedeemedUser {
                username: "bob".to_string(),
            }),
            access_token: Some("tok_1".to_string()),
        };

        let update = update_from_redemption(&redemption).expect("update");
        assert_eq!(update.membership, None);
        assert_eq!(
            update.identity,
            Some(Identity::Cookie {
                username: "bob".to_string()
            })
        );
    }

    #[test]
    fn test_invalid_redemption_without_identity_is_noop() {
        let redemption = Redemption {
            valid: false,
            user: None,
            access_token: None,
        };
        assert!(update_from_redemption(&redemption).is_none());
    }
}
