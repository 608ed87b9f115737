//! Advisor configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ADVISOR_BASE_URL` - Public URL for the advisor
//! - `ADVISOR_SESSION_SECRET` - Session signing secret (min 32 chars)
//! - `MEMBERSHIP_API_URL` - Membership provider API base URL
//! - `MEMBERSHIP_CLIENT_ID` - Membership provider OAuth client ID
//! - `MEMBERSHIP_CLIENT_SECRET` - Membership provider OAuth client secret
//! - `RECOMMENDED_PLAN_ID` - Plan identifier that grants membership
//! - `PAID_RECOMMENDED_PLAN_ID` - Second plan identifier that grants membership
//! - `PLANNER_API_URL` - Itinerary planner service base URL
//! - `PLANNER_API_KEY` - Itinerary planner service API key
//!
//! ## Optional
//! - `ADVISOR_HOST` - Bind address (default: 127.0.0.1)
//! - `ADVISOR_PORT` - Listen port (default: 3000)
//! - `MEMBERSHIP_PORTAL_URL` - Checkout/portal base URL (default: API URL)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SESSION_SECRET_LENGTH: usize = 32;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Advisor application configuration.
#[derive(Debug, Clone)]
pub struct AdvisorConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the advisor
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Membership provider configuration
    pub membership: MembershipConfig,
    /// Itinerary planner service configuration
    pub planner: PlannerConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Membership provider configuration.
///
/// Implements `Debug` manually to redact the client secret.
#[derive(Clone)]
pub struct MembershipConfig {
    /// Provider API base URL (e.g., <https://api.membership.example>)
    pub api_url: String,
    /// Provider portal base URL, used for checkout links
    pub portal_url: String,
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: SecretString,
    /// Plan identifier that grants membership
    pub recommended_plan_id: String,
    /// Second plan identifier that grants membership
    pub paid_recommended_plan_id: String,
}

impl std::fmt::Debug for MembershipConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MembershipConfig")
            .field("api_url", &self.api_url)
            .field("portal_url", &self.portal_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("recommended_plan_id", &self.recommended_plan_id)
            .field("paid_recommended_plan_id", &self.paid_recommended_plan_id)
            .finish()
    }
}

/// Itinerary planner service configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct PlannerConfig {
    /// Planner service base URL
    pub api_url: String,
    /// Planner service API key
    pub api_key: SecretString,
}

impl std::fmt::Debug for PlannerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlannerConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl AdvisorConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, length check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("ADVISOR_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("ADVISOR_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("ADVISOR_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("ADVISOR_PORT".to_string(), e.to_string()))?;
        let base_url = get_required_env("ADVISOR_BASE_URL")?;
        url::Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("ADVISOR_BASE_URL".to_string(), e.to_string())
        })?;
        let session_secret = get_validated_secret("ADVISOR_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "ADVISOR_SESSION_SECRET")?;

        let membership = MembershipConfig::from_env()?;
        let planner = PlannerConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");

        Ok(Self {
            host,
            port,
            base_url,
            session_secret,
            membership,
            planner,
            sentry_dsn,
            sentry_environment,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl MembershipConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let api_url = get_required_env("MEMBERSHIP_API_URL")?;
        let portal_url = get_env_or_default("MEMBERSHIP_PORTAL_URL", &api_url);
        Ok(Self {
            api_url,
            portal_url,
            client_id: get_required_env("MEMBERSHIP_CLIENT_ID")?,
            client_secret: get_validated_secret("MEMBERSHIP_CLIENT_SECRET")?,
            recommended_plan_id: get_required_env("RECOMMENDED_PLAN_ID")?,
            paid_recommended_plan_id: get_required_env("PAID_RECOMMENDED_PLAN_ID")?,
        })
    }

    /// True when the given plan identifier grants membership.
    #[must_use]
    pub fn plan_grants_membership(&self, plan: &str) -> bool {
        plan == self.recommended_plan_id || plan == self.paid_recommended_plan_id
    }
}

impl PlannerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_url: get_required_env("PLANNER_API_URL")?,
            api_key: get_validated_secret("PLANNER_API_KEY")?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Validate that a secret is not a placeholder value.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }
    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_membership_config() -> MembershipConfig {
        MembershipConfig {
            api_url: "https://api.membership.test".to_string(),
            portal_url: "https://portal.membership.test".to_string(),
            client_id: "client_id".to_string(),
            client_secret: SecretString::from("kJ93bXw1Lq"),
            recommended_plan_id: "plan_rec".to_string(),
            paid_recommended_plan_id: "plan_paid".to_string(),
        }
    }

    #[test]
    fn test_plan_grants_membership() {
        let config = test_membership_config();
        assert!(config.plan_grants_membership("plan_rec"));
        assert!(config.plan_grants_membership("plan_paid"));
        assert!(!config.plan_grants_membership("plan_basic"));
        assert!(!config.plan_grants_membership(""));
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-key-here", "TEST_VAR");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_changeme() {
        let result = validate_secret_strength("changeme123", "TEST_VAR");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3xY9mK2nL5pQ7rT0uW4zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_session_secret_too_short() {
        let secret = SecretString::from("short");
        let result = validate_session_secret(&secret, "TEST_SESSION");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_session_secret_valid_length() {
        let secret = SecretString::from("a".repeat(32));
        let result = validate_session_secret(&secret, "TEST_SESSION");
        assert!(result.is_ok());
    }

    #[test]
    fn test_socket_addr() {
        let config = AdvisorConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            session_secret: SecretString::from("x".repeat(32)),
            membership: test_membership_config(),
            planner: PlannerConfig {
                api_url: "https://planner.test".to_string(),
                api_key: SecretString::from("kJ93bXw1Lq"),
            },
            sentry_dsn: None,
            sentry_environment: None,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_membership_config_debug_redacts_secret() {
        let config = test_membership_config();
        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("client_id"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("kJ93bXw1Lq"));
    }

    #[test]
    fn test_planner_config_debug_redacts_key() {
        let config = PlannerConfig {
            api_url: "https://planner.test".to_string(),
            api_key: SecretString::from("kJ93bXw1Lq"),
        };
        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("https://planner.test"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("kJ93bXw1Lq"));
    }
}
