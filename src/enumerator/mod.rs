//! Resource enumerators
//!
//! One enumerator per [`EnumeratorGroup`]. Each operation is a short
//! composition: build the list request for the project, hand a fetch
//! closure to the right walker, return the outcome.

mod compute;
mod database;
mod gke;
mod messaging;
mod network;
mod project;
mod serverless;
mod source_repo;
mod storage;

pub use compute::ComputeEnumerator;
pub use database::DatabaseEnumerator;
pub use gke::{GkeEnumerator, REGISTRY_MIRRORS};
pub use messaging::MessagingEnumerator;
pub use network::NetworkEnumerator;
pub use project::{derive_service_accounts, ProjectEnumerator};
pub use serverless::ServerlessEnumerator;
pub use source_repo::SourceRepoEnumerator;
pub use storage::StorageEnumerator;

use crate::error::Fault;
use crate::gcp::client::GcpClient;
use crate::report::KindOutcome;
use crate::resource::{EnumeratorGroup, ResourceKind};
use crate::sink::ObjectSink;
use crate::walker::PageWalker;
use async_trait::async_trait;
use std::sync::Arc;

/// Enumerates the resource kinds of one group
#[async_trait]
pub trait ResourceEnumerator: Send + Sync {
    fn group(&self) -> EnumeratorGroup;

    /// Enumerate one kind owned by this group. Never fails: faults are
    /// recorded in the returned outcome.
    async fn enumerate(&self, kind: ResourceKind) -> KindOutcome;
}

/// Read-only inputs shared by every enumerator of a crawl
#[derive(Clone)]
pub struct CrawlContext {
    pub client: GcpClient,
    pub walker: PageWalker,
    /// Opt-in destination for per-object bucket metadata
    pub object_sink: Option<Arc<dyn ObjectSink>>,
}

impl CrawlContext {
    pub fn new(client: GcpClient, walker: PageWalker) -> Self {
        Self {
            client,
            walker,
            object_sink: None,
        }
    }

    pub fn with_object_sink(mut self, sink: Arc<dyn ObjectSink>) -> Self {
        self.object_sink = Some(sink);
        self
    }

    /// Every enumerator needs a project to address
    fn require_project(&self) -> Result<(), Fault> {
        if self.client.project_id.trim().is_empty() {
            return Err(Fault::Setup("no project id configured".into()));
        }
        Ok(())
    }
}

/// Builds the enumerator for a group
pub trait EnumeratorFactory: Send + Sync {
    fn build(
        &self,
        group: EnumeratorGroup,
        ctx: &CrawlContext,
    ) -> Result<Box<dyn ResourceEnumerator>, Fault>;
}

/// Builds the enumerators backed by the Google REST APIs
#[derive(Debug, Clone, Copy, Default)]
pub struct GcpEnumeratorFactory;

impl EnumeratorFactory for GcpEnumeratorFactory {
    fn build(
        &self,
        group: EnumeratorGroup,
        ctx: &CrawlContext,
    ) -> Result<Box<dyn ResourceEnumerator>, Fault> {
        ctx.require_project()?;

        Ok(match group {
            EnumeratorGroup::Compute => Box::new(ComputeEnumerator::new(ctx)),
            EnumeratorGroup::Database => Box::new(DatabaseEnumerator::new(ctx)),
            EnumeratorGroup::Gke => Box::new(GkeEnumerator::new(ctx)),
            EnumeratorGroup::Messaging => Box::new(MessagingEnumerator::new(ctx)),
            EnumeratorGroup::Network => Box::new(NetworkEnumerator::new(ctx)),
            EnumeratorGroup::Serverless => Box::new(ServerlessEnumerator::new(ctx)),
            EnumeratorGroup::SourceRepo => Box::new(SourceRepoEnumerator::new(ctx)),
            EnumeratorGroup::Storage => Box::new(StorageEnumerator::new(ctx)),
            EnumeratorGroup::Project => Box::new(ProjectEnumerator::new(ctx)),
        })
    }
}

/// Outcome for a kind handed to the wrong enumerator
fn not_owned(group: EnumeratorGroup, kind: ResourceKind) -> KindOutcome {
    KindOutcome::failed(
        kind,
        Fault::Setup(format!("{} enumerator does not handle {}", group, kind)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcp::auth::GcpCredentials;

    fn ctx(project: &str) -> CrawlContext {
        let client =
            GcpClient::with_credentials(project, GcpCredentials::from_access_token("t")).unwrap();
        CrawlContext::new(client, PageWalker::without_retry())
    }

    #[test]
    fn test_factory_builds_every_group() {
        let ctx = ctx("my-project");
        for group in EnumeratorGroup::ALL {
            let enumerator = GcpEnumeratorFactory.build(group, &ctx).unwrap();
            assert_eq!(enumerator.group(), group);
        }
    }

    #[test]
    fn test_factory_rejects_missing_project() {
        let result = GcpEnumeratorFactory.build(EnumeratorGroup::Compute, &ctx(""));
        assert!(matches!(result, Err(Fault::Setup(_))));
    }

    #[tokio::test]
    async fn test_foreign_kind_is_setup_fault() {
        let enumerator = GcpEnumeratorFactory
            .build(EnumeratorGroup::Messaging, &ctx("my-project"))
            .unwrap();
        let outcome = enumerator.enumerate(ResourceKind::Buckets).await;
        assert!(matches!(outcome.reason(), Some(Fault::Setup(_))));
    }
}
