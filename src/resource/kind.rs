//! Resource kind registry
//!
//! Every resource kind the crawler knows about, the enumerator group that
//! owns it, and the config key that switches that group on or off.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One kind of remote resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    ComputeInstances,
    ComputeImages,
    ComputeDisks,
    StaticIps,
    ComputeSnapshots,
    Subnets,
    FirewallRules,
    SqlInstances,
    Bigquery,
    Bigtable,
    Spanner,
    GkeClusters,
    GkeImages,
    PubsubSubscriptions,
    DnsZones,
    KmsKeys,
    Endpoints,
    CloudFunctions,
    AppServices,
    SourceRepos,
    Buckets,
    Filestore,
    ProjectInfo,
    IamPolicy,
    ServiceAccounts,
    EnabledServices,
}

/// The payload shape a kind reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Flat list of records
    Records,
    /// Per-parent sub-outcomes
    Grouped,
    /// A single assembled document
    Document,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 26] = [
        ResourceKind::ComputeInstances,
        ResourceKind::ComputeImages,
        ResourceKind::ComputeDisks,
        ResourceKind::StaticIps,
        ResourceKind::ComputeSnapshots,
        ResourceKind::Subnets,
        ResourceKind::FirewallRules,
        ResourceKind::SqlInstances,
        ResourceKind::Bigquery,
        ResourceKind::Bigtable,
        ResourceKind::Spanner,
        ResourceKind::GkeClusters,
        ResourceKind::GkeImages,
        ResourceKind::PubsubSubscriptions,
        ResourceKind::DnsZones,
        ResourceKind::KmsKeys,
        ResourceKind::Endpoints,
        ResourceKind::CloudFunctions,
        ResourceKind::AppServices,
        ResourceKind::SourceRepos,
        ResourceKind::Buckets,
        ResourceKind::Filestore,
        ResourceKind::ProjectInfo,
        ResourceKind::IamPolicy,
        ResourceKind::ServiceAccounts,
        ResourceKind::EnabledServices,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::ComputeInstances => "compute-instances",
            ResourceKind::ComputeImages => "compute-images",
            ResourceKind::ComputeDisks => "compute-disks",
            ResourceKind::StaticIps => "static-ips",
            ResourceKind::ComputeSnapshots => "compute-snapshots",
            ResourceKind::Subnets => "subnets",
            ResourceKind::FirewallRules => "firewall-rules",
            ResourceKind::SqlInstances => "sql-instances",
            ResourceKind::Bigquery => "bigquery",
            ResourceKind::Bigtable => "bigtable",
            ResourceKind::Spanner => "spanner",
            ResourceKind::GkeClusters => "gke-clusters",
            ResourceKind::GkeImages => "gke-images",
            ResourceKind::PubsubSubscriptions => "pubsub-subscriptions",
            ResourceKind::DnsZones => "dns-zones",
            ResourceKind::KmsKeys => "kms-keys",
            ResourceKind::Endpoints => "endpoints",
            ResourceKind::CloudFunctions => "cloud-functions",
            ResourceKind::AppServices => "app-services",
            ResourceKind::SourceRepos => "source-repos",
            ResourceKind::Buckets => "buckets",
            ResourceKind::Filestore => "filestore",
            ResourceKind::ProjectInfo => "project-info",
            ResourceKind::IamPolicy => "iam-policy",
            ResourceKind::ServiceAccounts => "service-accounts",
            ResourceKind::EnabledServices => "enabled-services",
        }
    }

    /// The enumerator group responsible for this kind
    pub fn group(&self) -> EnumeratorGroup {
        EnumeratorGroup::ALL
            .into_iter()
            .find(|g| g.kinds().contains(self))
            .unwrap_or(EnumeratorGroup::Project)
    }

    pub fn shape(&self) -> Shape {
        match self {
            ResourceKind::Bigquery => Shape::Grouped,
            ResourceKind::GkeImages
            | ResourceKind::AppServices
            | ResourceKind::ProjectInfo
            | ResourceKind::IamPolicy => Shape::Document,
            _ => Shape::Records,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A set of resource kinds enumerated together and enabled by one config entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumeratorGroup {
    Compute,
    Database,
    Gke,
    Messaging,
    Network,
    Serverless,
    SourceRepo,
    Storage,
    Project,
}

impl EnumeratorGroup {
    /// Start order of a crawl
    pub const ALL: [EnumeratorGroup; 9] = [
        EnumeratorGroup::Compute,
        EnumeratorGroup::Database,
        EnumeratorGroup::Gke,
        EnumeratorGroup::Messaging,
        EnumeratorGroup::Network,
        EnumeratorGroup::Serverless,
        EnumeratorGroup::SourceRepo,
        EnumeratorGroup::Storage,
        EnumeratorGroup::Project,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EnumeratorGroup::Compute => "compute",
            EnumeratorGroup::Database => "database",
            EnumeratorGroup::Gke => "gke",
            EnumeratorGroup::Messaging => "messaging",
            EnumeratorGroup::Network => "network",
            EnumeratorGroup::Serverless => "serverless",
            EnumeratorGroup::SourceRepo => "source-repo",
            EnumeratorGroup::Storage => "storage",
            EnumeratorGroup::Project => "project",
        }
    }

    /// Key of the crawl config entry that enables this group
    pub fn config_key(&self) -> &'static str {
        match self {
            EnumeratorGroup::Compute => "compute_instances",
            EnumeratorGroup::Database => "db_instances",
            EnumeratorGroup::Gke => "gke_instances",
            EnumeratorGroup::Messaging => "mq_instances",
            EnumeratorGroup::Network => "network_instances",
            EnumeratorGroup::Serverless => "serverless_instances",
            EnumeratorGroup::SourceRepo => "sourcerepo_instances",
            EnumeratorGroup::Storage => "storage_instances",
            EnumeratorGroup::Project => "project_instances",
        }
    }

    /// Kinds owned by this group, in enumeration order
    pub fn kinds(&self) -> &'static [ResourceKind] {
        use ResourceKind::*;
        match self {
            EnumeratorGroup::Compute => &[
                ComputeInstances,
                ComputeImages,
                ComputeDisks,
                StaticIps,
                ComputeSnapshots,
                Subnets,
                FirewallRules,
            ],
            EnumeratorGroup::Database => &[SqlInstances, Bigquery, Bigtable, Spanner],
            EnumeratorGroup::Gke => &[GkeClusters, GkeImages],
            EnumeratorGroup::Messaging => &[PubsubSubscriptions],
            EnumeratorGroup::Network => &[DnsZones, KmsKeys, Endpoints],
            EnumeratorGroup::Serverless => &[CloudFunctions, AppServices],
            EnumeratorGroup::SourceRepo => &[SourceRepos],
            EnumeratorGroup::Storage => &[Buckets, Filestore],
            EnumeratorGroup::Project => &[ProjectInfo, IamPolicy, ServiceAccounts, EnabledServices],
        }
    }
}

impl fmt::Display for EnumeratorGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}
