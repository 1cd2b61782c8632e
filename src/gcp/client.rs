//! GCP Client
//!
//! Main client for interacting with GCP APIs, combining authentication
//! and HTTP functionality.

use super::auth::GcpCredentials;
use super::http::GcpHttpClient;
use crate::error::Fault;
use anyhow::{Context, Result};
use serde_json::Value;
use url::Url;

/// Username GCR expects when the password is an OAuth2 access token
const REGISTRY_TOKEN_USER: &str = "oauth2accesstoken";

/// Main GCP client
#[derive(Clone)]
pub struct GcpClient {
    pub credentials: GcpCredentials,
    pub http: GcpHttpClient,
    pub project_id: String,
    /// Replaces `https://` so every host becomes `{endpoint}/{host}/...` (tests, proxies)
    endpoint_override: Option<String>,
}

impl GcpClient {
    /// Create a new GCP client using Application Default Credentials
    pub async fn new(project_id: &str) -> Result<Self> {
        let credentials = GcpCredentials::new()
            .await
            .context("Failed to initialize GCP credentials")?;

        Self::with_credentials(project_id, credentials)
    }

    /// Create a client around credentials obtained elsewhere
    pub fn with_credentials(project_id: &str, credentials: GcpCredentials) -> Result<Self> {
        let http = GcpHttpClient::new()?;

        Ok(Self {
            credentials,
            http,
            project_id: project_id.to_string(),
            endpoint_override: None,
        })
    }

    /// Route every API host through a single base URL
    pub fn with_endpoint(mut self, endpoint: &str) -> Result<Self> {
        let parsed =
            Url::parse(endpoint).with_context(|| format!("Invalid endpoint URL: {}", endpoint))?;
        self.endpoint_override = Some(parsed.as_str().trim_end_matches('/').to_string());
        Ok(self)
    }

    /// Make a GET request to a GCP API
    pub async fn get(&self, url: &str) -> Result<Value, Fault> {
        let token = self.credentials.get_token().await?;
        self.http.get(url, &token).await
    }

    /// Make a POST request to a GCP API
    pub async fn post(&self, url: &str, body: Option<&Value>) -> Result<Value, Fault> {
        let token = self.credentials.get_token().await?;
        self.http.post(url, &token, body).await
    }

    /// GET against a container registry, passing the access token as a basic-auth password
    pub async fn get_registry(&self, url: &str) -> Result<Value, Fault> {
        let token = self.credentials.get_token().await?;
        self.http.get_basic(url, REGISTRY_TOKEN_USER, &token).await
    }

    /// Build a URL for `path` on an API host
    pub fn api_url(&self, host: &str, path: &str) -> String {
        match &self.endpoint_override {
            Some(base) => format!("{}/{}/{}", base, host, path),
            None => format!("https://{}/{}", host, path),
        }
    }

    /// Build a `{version}/projects/{project}/{path}` URL, the layout most APIs share
    pub fn project_api_url(&self, host: &str, version: &str, path: &str) -> String {
        self.api_url(
            host,
            &format!("{}/projects/{}/{}", version, self.project_id, path),
        )
    }

    // =========================================================================
    // Compute Engine API helpers
    // =========================================================================

    /// Build global Compute Engine API URL
    pub fn compute_global_url(&self, resource: &str) -> String {
        self.project_api_url(
            "compute.googleapis.com",
            "compute/v1",
            &format!("global/{}", resource),
        )
    }

    /// Build aggregated Compute Engine API URL (all zones / regions)
    pub fn compute_aggregated_url(&self, resource: &str) -> String {
        self.project_api_url(
            "compute.googleapis.com",
            "compute/v1",
            &format!("aggregated/{}", resource),
        )
    }

    // =========================================================================
    // Cloud Storage API helpers
    // =========================================================================

    /// Build Cloud Storage API URL
    pub fn storage_url(&self, path: &str) -> String {
        self.api_url("storage.googleapis.com", &format!("storage/v1/{}", path))
    }

    /// Build Cloud Storage objects URL
    pub fn storage_objects_url(&self, bucket: &str) -> String {
        self.storage_url(&format!("b/{}/o", urlencoding::encode(bucket)))
    }

    // =========================================================================
    // Other API helpers
    // =========================================================================

    /// Build GKE location URL (region, zone, or `-` for all)
    pub fn container_location_url(&self, location: &str, resource: &str) -> String {
        self.project_api_url(
            "container.googleapis.com",
            "v1",
            &format!("locations/{}/{}", location, resource),
        )
    }

    /// Build Resource Manager API URL
    pub fn resourcemanager_url(&self, path: &str) -> String {
        self.api_url("cloudresourcemanager.googleapis.com", &format!("v1/{}", path))
    }

    /// Build App Engine URL for this project's application
    pub fn appengine_url(&self, path: &str) -> String {
        self.api_url(
            "appengine.googleapis.com",
            &format!("v1/apps/{}{}", self.project_id, path),
        )
    }

    /// Build a registry mirror URL; `prefix` is `""`, `"us."`, `"eu."` or `"asia."`
    pub fn registry_url(&self, prefix: &str, path: &str) -> String {
        self.api_url(&format!("{}gcr.io", prefix), &format!("v2/{}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GcpClient {
        GcpClient::with_credentials("my-project", GcpCredentials::from_access_token("t")).unwrap()
    }

    #[test]
    fn test_default_urls_use_https_hosts() {
        let client = client();
        assert_eq!(
            client.compute_aggregated_url("instances"),
            "https://compute.googleapis.com/compute/v1/projects/my-project/aggregated/instances"
        );
        assert_eq!(
            client.storage_objects_url("my bucket"),
            "https://storage.googleapis.com/storage/v1/b/my%20bucket/o"
        );
        assert_eq!(
            client.registry_url("eu.", "my-project/tags/list"),
            "https://eu.gcr.io/v2/my-project/tags/list"
        );
    }

    #[test]
    fn test_endpoint_override_prefixes_host() {
        let client = client().with_endpoint("http://127.0.0.1:8080/").unwrap();
        assert_eq!(
            client.appengine_url("/services"),
            "http://127.0.0.1:8080/appengine.googleapis.com/v1/apps/my-project/services"
        );
        assert_eq!(
            client.container_location_url("-", "clusters"),
            "http://127.0.0.1:8080/container.googleapis.com/v1/projects/my-project/locations/-/clusters"
        );
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        assert!(client().with_endpoint("not a url").is_err());
    }
}
