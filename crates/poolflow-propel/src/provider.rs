//! Reconcilers wired to the Propel API

use crate::client::PropelClient;
use crate::error::Result;
use poolflow_cloud::{
    DataPool, DataSource, MaterializedView, Metric, PollTiming, Policy, Reconciler, Resource,
    ResourceApi, Timeouts,
};
use poolflow_config::PoolflowConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Authentication status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    /// Whether authentication is valid
    pub authenticated: bool,

    /// Error message if not authenticated
    pub error: Option<String>,
}

impl AuthStatus {
    pub fn ok() -> Self {
        Self {
            authenticated: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            error: Some(error.into()),
        }
    }
}

/// Builds one [`Reconciler`] per resource type over a shared client
#[derive(Debug, Clone)]
pub struct PropelProvider {
    client: Arc<PropelClient>,
    timeouts: Timeouts,
    timing: PollTiming,
    cancel: CancellationToken,
}

impl PropelProvider {
    pub fn new(config: &PoolflowConfig) -> Result<Self> {
        config.validate()?;
        let client = Arc::new(PropelClient::new(config)?);

        Ok(Self {
            client,
            timeouts: Timeouts {
                create: config.create_timeout(),
                update: config.update_timeout(),
                delete: config.delete_timeout(),
            },
            timing: PollTiming {
                delay: config.poll_delay(),
                poll_interval: config.poll_interval(),
                min_timeout: config.min_poll_timeout(),
                settle_count: config.polling.settle_count,
            },
            cancel: CancellationToken::new(),
        })
    }

    /// Load the configuration from the usual locations
    pub fn from_env() -> Result<Self> {
        Self::new(&PoolflowConfig::load()?)
    }

    /// Share a cancellation token with every reconciler built afterwards
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn name(&self) -> &str {
        "propel"
    }

    pub fn display_name(&self) -> &str {
        "Propel"
    }

    pub fn client(&self) -> &Arc<PropelClient> {
        &self.client
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// Check that the configured credentials yield a token
    pub async fn check_auth(&self) -> AuthStatus {
        match self.client.access_token().await {
            Ok(_) => AuthStatus::ok(),
            Err(e) => {
                tracing::warn!(error = %e, "authentication failed");
                AuthStatus::failed(e.to_string())
            }
        }
    }

    fn reconciler<R: Resource>(&self) -> Reconciler<R>
    where
        PropelClient: ResourceApi<R>,
    {
        let api: Arc<dyn ResourceApi<R>> = self.client.clone();
        Reconciler::new(api)
            .with_jobs(self.client.clone())
            .with_timeouts(self.timeouts.clone())
            .with_timing(self.timing.clone())
            .with_cancellation(self.cancel.clone())
    }

    pub fn data_sources(&self) -> Reconciler<DataSource> {
        self.reconciler()
    }

    pub fn data_pools(&self) -> Reconciler<DataPool> {
        self.reconciler()
    }

    pub fn materialized_views(&self) -> Reconciler<MaterializedView> {
        self.reconciler()
    }

    pub fn metrics(&self) -> Reconciler<Metric> {
        self.reconciler()
    }

    pub fn policies(&self) -> Reconciler<Policy> {
        self.reconciler()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poolflow_config::{PollingConfig, TimeoutConfig};
    use std::time::Duration;

    fn config() -> PoolflowConfig {
        PoolflowConfig {
            token: Some("token".to_string()),
            timeouts: TimeoutConfig {
                create: 60,
                update: 120,
                delete: 30,
            },
            polling: PollingConfig {
                settle_count: 2,
                ..PollingConfig::default()
            },
            ..PoolflowConfig::default()
        }
    }

    #[test]
    fn test_provider_from_config() {
        let provider = PropelProvider::new(&config()).unwrap();
        assert_eq!(provider.name(), "propel");
        assert_eq!(provider.timeouts().create, Duration::from_secs(60));
        assert_eq!(provider.timeouts().update, Duration::from_secs(120));

        let pools = provider.data_pools();
        assert_eq!(pools.timeouts().delete, Duration::from_secs(30));
    }

    #[test]
    fn test_provider_rejects_invalid_config() {
        let mut invalid = config();
        invalid.polling.settle_count = 0;
        assert!(PropelProvider::new(&invalid).is_err());

        let mut anonymous = config();
        anonymous.token = None;
        assert!(PropelProvider::new(&anonymous).is_err());
    }

    #[test]
    fn test_cancellation_is_shared() {
        let cancel = CancellationToken::new();
        let provider = PropelProvider::new(&config())
            .unwrap()
            .with_cancellation(cancel.clone());

        let metrics = provider.metrics();
        cancel.cancel();
        assert!(metrics.cancellation().is_cancelled());
    }

    #[tokio::test]
    async fn test_static_token_authenticates_offline() {
        let provider = PropelProvider::new(&config()).unwrap();
        assert!(provider.check_auth().await.authenticated);
    }
}
