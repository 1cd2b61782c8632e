//! Networking and security: Cloud DNS, KMS keys, Cloud Endpoints

use super::{not_owned, CrawlContext, ResourceEnumerator};
use crate::error::Fault;
use crate::gcp::client::GcpClient;
use crate::report::{EnumerationOutcome, KindOutcome, Outcome};
use crate::resource::{child_lister, lister, location_id, resource_name, ListCall, Record};
use crate::resource::{EnumeratorGroup, ResourceKind};
use crate::walker::PageWalker;
use async_trait::async_trait;

const KMS_HOST: &str = "cloudkms.googleapis.com";

pub struct NetworkEnumerator {
    client: GcpClient,
    walker: PageWalker,
}

impl NetworkEnumerator {
    pub fn new(ctx: &CrawlContext) -> Self {
        Self {
            client: ctx.client.clone(),
            walker: ctx.walker,
        }
    }

    pub async fn dns_zones(&self) -> EnumerationOutcome {
        let url = self
            .client
            .project_api_url("dns.googleapis.com", "dns/v1", "managedZones");
        self.walker
            .walk(lister(&self.client, ListCall::new(url, "managedZones")))
            .await
    }

    /// Crypto keys of every key ring in every location.
    ///
    /// Locations → key rings → keys, depth-first: each location's key rings
    /// and their keys are drained before the next page of locations. A
    /// failing key ring or location is skipped after recording its fault;
    /// its siblings are still listed.
    pub async fn kms_keys(&self) -> EnumerationOutcome {
        let locations = ListCall::new(
            self.client.project_api_url(KMS_HOST, "v1", "locations"),
            "locations",
        );
        let this = self;
        self.walker
            .walk_nested_with(lister(&self.client, locations), move |location: &Record| {
                let rings = this.key_rings_call(location);
                async move {
                    match rings {
                        Ok(rings) => this.location_keys(rings).await,
                        Err(fault) => Outcome::failed(fault),
                    }
                }
            })
            .await
            .flatten()
    }

    async fn location_keys(&self, rings: ListCall) -> EnumerationOutcome {
        self.walker
            .walk_nested(lister(&self.client, rings), |ring: &Record| {
                child_lister(&self.client, self.crypto_keys_call(ring))
            })
            .await
            .flatten()
    }

    /// Endpoints services produced by this project
    pub async fn endpoints(&self) -> EnumerationOutcome {
        let url = self
            .client
            .api_url("servicemanagement.googleapis.com", "v1/services");
        let call = ListCall::new(url, "services").param("producerProjectId", &self.client.project_id);
        self.walker.walk(lister(&self.client, call)).await
    }

    fn key_rings_call(&self, location: &Record) -> Result<ListCall, Fault> {
        let location = location_id(location)
            .ok_or_else(|| Fault::Malformed("KMS location is missing `locationId`".into()))?;
        let url = self.client.project_api_url(
            KMS_HOST,
            "v1",
            &format!("locations/{}/keyRings", location),
        );
        Ok(ListCall::new(url, "keyRings"))
    }

    fn crypto_keys_call(&self, ring: &Record) -> Result<ListCall, Fault> {
        let ring = resource_name(ring)
            .ok_or_else(|| Fault::Malformed("key ring is missing `name`".into()))?;
        let url = self
            .client
            .api_url(KMS_HOST, &format!("v1/{}/cryptoKeys", ring));
        Ok(ListCall::new(url, "cryptoKeys"))
    }
}

#[async_trait]
impl ResourceEnumerator for NetworkEnumerator {
    fn group(&self) -> EnumeratorGroup {
        EnumeratorGroup::Network
    }

    async fn enumerate(&self, kind: ResourceKind) -> KindOutcome {
        let outcome = match kind {
            ResourceKind::DnsZones => self.dns_zones().await,
            ResourceKind::KmsKeys => self.kms_keys().await,
            ResourceKind::Endpoints => self.endpoints().await,
            other => return not_owned(self.group(), other),
        };
        KindOutcome::Records(outcome)
    }
}
