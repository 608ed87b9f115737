//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::AdvisorConfig;
use crate::services::builds::BuildRegistry;
use crate::services::membership::MembershipClient;
use crate::services::planner::{PlannerClient, PlannerError};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the external API clients and the build registry.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AdvisorConfig,
    membership: MembershipClient,
    planner: PlannerClient,
    builds: BuildRegistry,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the planner HTTP client cannot be built.
    pub fn new(config: AdvisorConfig) -> Result<Self, PlannerError> {
        let membership = MembershipClient::new(&config.membership);
        let planner = PlannerClient::new(&config.planner)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                membership,
                planner,
                builds: BuildRegistry::new(),
            }),
        })
    }

    /// Get a reference to the advisor configuration.
    #[must_use]
    pub fn config(&self) -> &AdvisorConfig {
        &self.inner.config
    }

    /// Get a reference to the membership provider client.
    #[must_use]
    pub fn membership(&self) -> &MembershipClient {
        &self.inner.membership
    }

    /// Get a reference to the planner service client.
    #[must_use]
    pub fn planner(&self) -> &PlannerClient {
        &self.inner.planner
    }

    /// Get a reference to the build registry.
    #[must_use]
    pub fn builds(&self) -> &BuildRegistry {
        &self.inner.builds
    }
}
