//! Pub/Sub

use super::{not_owned, CrawlContext, ResourceEnumerator};
use crate::gcp::client::GcpClient;
use crate::report::{EnumerationOutcome, KindOutcome};
use crate::resource::{lister, EnumeratorGroup, ListCall, ResourceKind};
use crate::walker::PageWalker;
use async_trait::async_trait;

pub struct MessagingEnumerator {
    client: GcpClient,
    walker: PageWalker,
}

impl MessagingEnumerator {
    pub fn new(ctx: &CrawlContext) -> Self {
        Self {
            client: ctx.client.clone(),
            walker: ctx.walker,
        }
    }

    pub async fn subscriptions(&self) -> EnumerationOutcome {
        let url = self
            .client
            .project_api_url("pubsub.googleapis.com", "v1", "subscriptions");
        self.walker
            .walk(lister(&self.client, ListCall::new(url, "subscriptions")))
            .await
    }
}

#[async_trait]
impl ResourceEnumerator for MessagingEnumerator {
    fn group(&self) -> EnumeratorGroup {
        EnumeratorGroup::Messaging
    }

    async fn enumerate(&self, kind: ResourceKind) -> KindOutcome {
        match kind {
            ResourceKind::PubsubSubscriptions => KindOutcome::Records(self.subscriptions().await),
            other => not_owned(self.group(), other),
        }
    }
}
