//! Membership provider API client.
//!
//! The provider handles sign-in (OAuth 2.0 authorization-code flow) and owns
//! the three entitlement checks the advisor relies on: membership lookup,
//! redemption-code exchange, and access-token validation.
//!
//! # OAuth Flow
//!
//! 1. Generate authorization URL with `authorization_url()`
//! 2. Redirect the visitor to the provider's login page
//! 3. Provider redirects back with an authorization code
//! 4. Exchange the code for a token with `exchange_code()`
//! 5. Fetch the member profile with `member_profile()`
//!
//! Plan lookups are cached in-process for a few minutes; the same membership
//! id arriving on every page load of a shared link should not hit the
//! provider each time.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::config::MembershipConfig;

/// Plan lookup cache TTL.
const PLAN_CACHE_TTL: Duration = Duration::from_secs(300);

/// Plan lookup cache capacity.
const PLAN_CACHE_CAPACITY: u64 = 1_000;

/// Errors that can occur when talking to the membership provider.
#[derive(Debug, thiserror::Error)]
pub enum MembershipError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse a response body.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Token obtained from the provider's OAuth token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberToken {
    /// The access token for provider API requests.
    pub access_token: String,
}

/// A member profile from the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct MemberProfile {
    /// Provider member id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Provider username.
    pub username: String,
}

/// Outcome of redeeming a code.
///
/// A failed redemption can still carry a username; the caller persists that
/// partial identity without granting membership.
#[derive(Debug, Clone, Deserialize)]
pub struct Redemption {
    /// Whether the code was accepted.
    pub valid: bool,
    /// The comp identity created for the code, if any.
    pub user: Option<RedeemedUser>,
    /// Access token for the comp identity, if any.
    pub access_token: Option<String>,
}

/// Identity attached to a redeemed code.
#[derive(Debug, Clone, Deserialize)]
pub struct RedeemedUser {
    /// Provider username.
    pub username: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct PlanResponse {
    plan: String,
}

#[derive(Debug, Deserialize)]
struct ValidResponse {
    valid: bool,
}

/// Client for the membership provider API.
#[derive(Clone)]
pub struct MembershipClient {
    inner: Arc<MembershipClientInner>,
}

struct MembershipClientInner {
    client: reqwest::Client,
    api_url: String,
    portal_url: String,
    client_id: String,
    client_secret: String,
    plan_cache: Cache<String, String>,
}

impl MembershipClient {
    /// Create a new membership provider client.
    #[must_use]
    pub fn new(config: &MembershipConfig) -> Self {
        Self {
            inner: Arc::new(MembershipClientInner {
                client: reqwest::Client::new(),
                api_url: config.api_url.trim_end_matches('/').to_string(),
                portal_url: config.portal_url.trim_end_matches('/').to_string(),
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.expose_secret().to_string(),
                plan_cache: Cache::builder()
                    .max_capacity(PLAN_CACHE_CAPACITY)
                    .time_to_live(PLAN_CACHE_TTL)
                    .build(),
            }),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // OAuth Flow
    // ─────────────────────────────────────────────────────────────────────────

    /// Generate the authorization URL for member sign-in.
    ///
    /// # Arguments
    ///
    /// * `redirect_uri` - The callback URL to redirect to after sign-in
    /// * `state` - A random string stored in the session to prevent CSRF attacks
    #[must_use]
    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "{}/oauth/authorize?\
            client_id={}&\
            response_type=code&\
            redirect_uri={}&\
            scope=openid%20profile&\
            state={}",
            self.inner.portal_url,
            urlencoding::encode(&self.inner.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(state)
        )
    }

    /// Checkout link for purchasing the given plan.
    #[must_use]
    pub fn checkout_url(&self, plan_id: &str) -> String {
        format!(
            "{}/checkout/{}",
            self.inner.portal_url,
            urlencoding::encode(plan_id)
        )
    }

    /// Exchange an authorization code for an access token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token exchange fails.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<MemberToken, MembershipError> {
        let url = format!("{}/oauth/token", self.inner.api_url);

        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", &self.inner.client_id),
            ("client_secret", &self.inner.client_secret),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ];

        let response = self.inner.client.post(&url).form(&params).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MembershipError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| MembershipError::Parse(e.to_string()))?;

        Ok(MemberToken {
            access_token: token.access_token,
        })
    }

    /// Fetch the member profile behind an access token.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn member_profile(
        &self,
        access_token: &str,
    ) -> Result<MemberProfile, MembershipError> {
        let url = format!("{}/me", self.inner.api_url);

        let response = self
            .inner
            .client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MembershipError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| MembershipError::Parse(e.to_string()))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Entitlement Checks
    // ─────────────────────────────────────────────────────────────────────────

    /// Look up the plan behind a membership id.
    ///
    /// Results are cached for [`PLAN_CACHE_TTL`].
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or the body has no plan.
    pub async fn lookup_plan(&self, membership_id: &str) -> Result<String, MembershipError> {
        if let Some(plan) = self.inner.plan_cache.get(membership_id).await {
            return Ok(plan);
        }

        let url = format!("{}/memberships/lookup", self.inner.api_url);
        let body = serde_json::json!({ "membershipId": membership_id });

        let response = self.inner.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MembershipError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let plan: PlanResponse = response
            .json()
            .await
            .map_err(|e| MembershipError::Parse(e.to_string()))?;

        self.inner
            .plan_cache
            .insert(membership_id.to_string(), plan.plan.clone())
            .await;

        Ok(plan.plan)
    }

    /// Redeem a code for a comp identity and membership.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails. A rejected code is not an
    /// error; it comes back as `Redemption { valid: false, .. }`.
    pub async fn redeem_code(&self, code: &str) -> Result<Redemption, MembershipError> {
        let url = format!("{}/codes/redeem", self.inner.api_url);
        let body = serde_json::json!({ "code": code });

        let response = self.inner.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MembershipError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| MembershipError::Parse(e.to_string()))
    }

    /// Validate an access token against the provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    pub async fn validate_token(&self, access_token: &str) -> Result<bool, MembershipError> {
        let url = format!("{}/tokens/validate", self.inner.api_url);
        let body = serde_json::json!({ "access_token": access_token });

        let response = self.inner.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MembershipError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let valid: ValidResponse = response
            .json()
            .await
            .map_err(|e| MembershipError::Parse(e.to_string()))?;

        Ok(valid.valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn test_client() -> MembershipClient {
        MembershipClient::new(&MembershipConfig {
            api_url: "https://api.membership.test/".to_string(),
            portal_url: "https://portal.membership.test".to_string(),
            client_id: "client id".to_string(),
            client_secret: SecretString::from("kJ93bXw1Lq"),
            recommended_plan_id: "plan_rec".to_string(),
            paid_recommended_plan_id: "plan_paid".to_string(),
        })
    }

    #[test]
    fn test_authorization_url_encodes_params() {
        let client = test_client();
        let url = client.authorization_url("https://advisor.test/auth/callback", "st&ate");

        assert!(url.starts_with("https://portal.membership.test/oauth/authorize?"));
        assert!(url.contains("client_id=client%20id"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fadvisor.test%2Fauth%2Fcallback"));
        assert!(url.contains("state=st%26ate"));
    }

    #[test]
    fn test_checkout_url() {
        let client = test_client();
        assert_eq!(
            client.checkout_url("plan_rec"),
            "https://portal.membership.test/checkout/plan_rec"
        );
    }

    #[test]
    fn test_redemption_parses_partial_identity() {
        let json = r#"{"valid": false, "user": {"username": "bob"}}"#;
        let redemption: Redemption = serde_json::from_str(json).expect("parse");
        assert!(!redemption.valid);
        assert_eq!(redemption.user.expect("user").username, "bob");
        assert!(redemption.access_token.is_none());
    }

    #[test]
    fn test_redemption_parses_success() {
        let json = r#"{"valid": true, "user": {"username": "bob"}, "access_token": "tok_1"}"#;
        let redemption: Redemption = serde_json::from_str(json).expect("parse");
        assert!(redemption.valid);
        assert_eq!(redemption.access_token.as_deref(), Some("tok_1"));
    }
}
