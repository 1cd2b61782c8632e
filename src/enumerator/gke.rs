//! Kubernetes Engine clusters and the container registry mirrors

use super::{not_owned, CrawlContext, ResourceEnumerator};
use crate::gcp::client::GcpClient;
use crate::report::{EnumerationOutcome, KindOutcome, Outcome};
use crate::resource::fetcher::extract_items;
use crate::resource::{EnumeratorGroup, Record, ResourceKind};
use async_trait::async_trait;
use futures::future::join_all;

/// Registry mirrors queried for image tags: (report key, host prefix)
pub const REGISTRY_MIRRORS: [(&str, &str); 4] =
    [("global", ""), ("us", "us."), ("eu", "eu."), ("asia", "asia.")];

pub struct GkeEnumerator {
    client: GcpClient,
}

impl GkeEnumerator {
    pub fn new(ctx: &CrawlContext) -> Self {
        Self {
            client: ctx.client.clone(),
        }
    }

    /// Clusters in every location. The API returns them in one response.
    pub async fn clusters(&self) -> EnumerationOutcome {
        let url = self.client.container_location_url("-", "clusters");
        match self.client.get(&url).await {
            Ok(response) => match extract_items(&response, "clusters") {
                Ok(clusters) => Outcome::complete(clusters),
                Err(fault) => Outcome::failed(fault),
            },
            Err(fault) => {
                tracing::warn!("Failed to list GKE clusters: {}", fault);
                Outcome::failed(fault)
            },
        }
    }

    /// Tag listings from each registry mirror, keyed by mirror.
    ///
    /// Mirrors are queried concurrently. A mirror that fails (commonly
    /// because the project never pushed there) is left out of the document.
    pub async fn images(&self) -> Outcome<Record> {
        let path = format!("{}/tags/list", registry_repository(&self.client.project_id));

        let lookups = REGISTRY_MIRRORS.iter().map(|(key, prefix)| {
            let url = self.client.registry_url(prefix, &path);
            async move { (*key, self.client.get_registry(&url).await) }
        });

        let mut mirrors = Record::new();
        for (key, result) in join_all(lookups).await {
            match result {
                Ok(tags) => {
                    mirrors.insert(key.to_string(), tags);
                },
                Err(fault) => {
                    tracing::debug!("Registry mirror {} skipped: {}", key, fault);
                },
            }
        }
        Outcome::complete(mirrors)
    }
}

/// Registry repository path for a project; domain-scoped ids (`example.com:proj`)
/// become `example.com/proj`
fn registry_repository(project_id: &str) -> String {
    project_id.replace(':', "/")
}

#[async_trait]
impl ResourceEnumerator for GkeEnumerator {
    fn group(&self) -> EnumeratorGroup {
        EnumeratorGroup::Gke
    }

    async fn enumerate(&self, kind: ResourceKind) -> KindOutcome {
        match kind {
            ResourceKind::GkeClusters => KindOutcome::Records(self.clusters().await),
            ResourceKind::GkeImages => KindOutcome::Document(self.images().await),
            other => not_owned(self.group(), other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_repository_for_domain_scoped_project() {
        assert_eq!(registry_repository("my-project"), "my-project");
        assert_eq!(registry_repository("example.com:my-project"), "example.com/my-project");
    }

    #[test]
    fn test_mirror_keys_are_distinct() {
        let keys: std::collections::HashSet<_> = REGISTRY_MIRRORS.iter().map(|(k, _)| k).collect();
        assert_eq!(keys.len(), REGISTRY_MIRRORS.len());
    }
}
