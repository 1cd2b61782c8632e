//! Compute Engine: instances, images, disks, static IPs, snapshots,
//! subnets and firewall rules

use super::{not_owned, CrawlContext, ResourceEnumerator};
use crate::error::Fault;
use crate::gcp::client::GcpClient;
use crate::report::{EnumerationOutcome, KindOutcome};
use crate::resource::{firewall_rule_name, lister, record_of, scoped_lister, ListCall, Record};
use crate::resource::{EnumeratorGroup, ResourceKind};
use crate::walker::{PageWalker, ScopeMode};
use async_trait::async_trait;
use serde_json::Value;

pub struct ComputeEnumerator {
    client: GcpClient,
    walker: PageWalker,
}

impl ComputeEnumerator {
    pub fn new(ctx: &CrawlContext) -> Self {
        Self {
            client: ctx.client.clone(),
            walker: ctx.walker,
        }
    }

    /// All VM instances across zones
    pub async fn instances(&self) -> EnumerationOutcome {
        self.aggregated("instances", ScopeMode::Drop).await
    }

    pub async fn images(&self) -> EnumerationOutcome {
        self.global("images").await
    }

    /// All persistent disks across zones
    pub async fn disks(&self) -> EnumerationOutcome {
        self.aggregated("disks", ScopeMode::Drop).await
    }

    /// Reserved addresses, each wrapped as `{ "regions/<r>": address }`
    pub async fn static_ips(&self) -> EnumerationOutcome {
        self.aggregated("addresses", ScopeMode::Keep).await
    }

    pub async fn snapshots(&self) -> EnumerationOutcome {
        self.global("snapshots").await
    }

    /// Subnetworks of every region, wrapped by region like static IPs
    pub async fn subnets(&self) -> EnumerationOutcome {
        self.aggregated("subnetworks", ScopeMode::Keep).await
    }

    /// Firewall rules, projected to `{ "name": ... }`
    pub async fn firewall_rules(&self) -> EnumerationOutcome {
        let call = ListCall::new(self.client.compute_global_url("firewalls"), "items");
        self.walker
            .walk_map(lister(&self.client, call), firewall_name_only)
            .await
    }

    async fn global(&self, resource: &str) -> EnumerationOutcome {
        let call = ListCall::new(self.client.compute_global_url(resource), "items");
        self.walker.walk(lister(&self.client, call)).await
    }

    /// Aggregated list; the item field inside each scope matches the resource name
    async fn aggregated(&self, resource: &'static str, mode: ScopeMode) -> EnumerationOutcome {
        let call = ListCall::new(self.client.compute_aggregated_url(resource), resource);
        self.walker
            .walk_aggregated(scoped_lister(&self.client, call), mode)
            .await
    }
}

fn firewall_name_only(rule: Record) -> Result<Record, Fault> {
    firewall_rule_name(&rule)
        .map(|name| record_of([("name", Value::from(name))]))
        .ok_or_else(|| Fault::Malformed("firewall rule is missing `name`".into()))
}

#[async_trait]
impl ResourceEnumerator for ComputeEnumerator {
    fn group(&self) -> EnumeratorGroup {
        EnumeratorGroup::Compute
    }

    async fn enumerate(&self, kind: ResourceKind) -> KindOutcome {
        let outcome = match kind {
            ResourceKind::ComputeInstances => self.instances().await,
            ResourceKind::ComputeImages => self.images().await,
            ResourceKind::ComputeDisks => self.disks().await,
            ResourceKind::StaticIps => self.static_ips().await,
            ResourceKind::ComputeSnapshots => self.snapshots().await,
            ResourceKind::Subnets => self.subnets().await,
            ResourceKind::FirewallRules => self.firewall_rules().await,
            other => return not_owned(self.group(), other),
        };
        KindOutcome::Records(outcome)
    }
}
