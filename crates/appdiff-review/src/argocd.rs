use std::time::Duration;

use appdiff_core::{AppDiffError, Application, ArgoCdConfig};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

/// Source of the application inventory.
#[async_trait]
pub trait Inventory: Send + Sync {
    /// Every application the deployment server knows, in server order.
    async fn list_applications(&self) -> Result<Vec<Application>, AppDiffError>;
}

#[derive(Deserialize)]
struct ApplicationList {
    #[serde(default)]
    items: Option<Vec<Application>>,
}

/// Read-only client for the Argo CD REST API.
///
/// # Examples
///
/// ```
/// use appdiff_core::ArgoCdConfig;
/// use appdiff_review::argocd::ArgoCdClient;
///
/// let config = ArgoCdConfig {
///     server_url: "argocd.acme.dev".into(),
///     token: Some("t0k".into()),
///     ..ArgoCdConfig::default()
/// };
/// let client = ArgoCdClient::new(&config).unwrap();
/// assert_eq!(client.applications_url(), "https://argocd.acme.dev/api/v1/applications");
/// ```
pub struct ArgoCdClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl ArgoCdClient {
    /// Create a client from Argo CD configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AppDiffError::Config`] if no token is configured, or
    /// [`AppDiffError::Upstream`] if the HTTP client cannot be built.
    pub fn new(config: &ArgoCdConfig) -> Result<Self, AppDiffError> {
        let token = config
            .token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppDiffError::Config("argocd token not set".into()))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| AppDiffError::Upstream(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: format!("{}://{}", config.scheme(), config.host()),
            token,
        })
    }

    pub fn applications_url(&self) -> String {
        format!("{}/api/v1/applications", self.base_url)
    }
}

#[async_trait]
impl Inventory for ArgoCdClient {
    async fn list_applications(&self) -> Result<Vec<Application>, AppDiffError> {
        let url = self.applications_url();
        debug!(%url, "fetching application inventory");

        let response = self
            .http
            .get(&url)
            .header("Cookie", format!("argocd.token={}", self.token))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| AppDiffError::Upstream(format!("failed to fetch applications: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppDiffError::Upstream(format!("failed to read applications: {e}")))?;
        if !status.is_success() {
            return Err(AppDiffError::Upstream(format!(
                "Argo CD API error {status}: {body}"
            )));
        }

        let list: ApplicationList = serde_json::from_str(&body).map_err(|e| {
            AppDiffError::MalformedResponse(format!("applications response is not valid JSON: {e}"))
        })?;
        Ok(list.items.unwrap_or_default())
    }
}
