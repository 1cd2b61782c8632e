//! Cloud Source Repositories

use super::{not_owned, CrawlContext, ResourceEnumerator};
use crate::gcp::client::GcpClient;
use crate::report::{EnumerationOutcome, KindOutcome};
use crate::resource::{lister, EnumeratorGroup, ListCall, ResourceKind};
use crate::walker::PageWalker;
use async_trait::async_trait;

const REPOS_PAGE_SIZE: &str = "500";

pub struct SourceRepoEnumerator {
    client: GcpClient,
    walker: PageWalker,
}

impl SourceRepoEnumerator {
    pub fn new(ctx: &CrawlContext) -> Self {
        Self {
            client: ctx.client.clone(),
            walker: ctx.walker,
        }
    }

    pub async fn repos(&self) -> EnumerationOutcome {
        let url = self
            .client
            .project_api_url("sourcerepo.googleapis.com", "v1", "repos");
        let call = ListCall::new(url, "repos").param("pageSize", REPOS_PAGE_SIZE);
        self.walker.walk(lister(&self.client, call)).await
    }
}

#[async_trait]
impl ResourceEnumerator for SourceRepoEnumerator {
    fn group(&self) -> EnumeratorGroup {
        EnumeratorGroup::SourceRepo
    }

    async fn enumerate(&self, kind: ResourceKind) -> KindOutcome {
        match kind {
            ResourceKind::SourceRepos => KindOutcome::Records(self.repos().await),
            other => not_owned(self.group(), other),
        }
    }
}
