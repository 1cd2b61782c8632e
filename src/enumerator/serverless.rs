//! Cloud Functions and App Engine

use super::{not_owned, CrawlContext, ResourceEnumerator};
use crate::error::Fault;
use crate::gcp::client::GcpClient;
use crate::report::{EnumerationOutcome, KindOutcome, Outcome};
use crate::resource::{lister, record_of, EnumeratorGroup, ListCall, Record, ResourceKind};
use crate::walker::PageWalker;
use async_trait::async_trait;
use serde_json::Value;

/// Fields of the App Engine application kept in the report
const DEFAULT_APP_FIELDS: [&str; 3] = ["name", "defaultHostname", "servingStatus"];

pub struct ServerlessEnumerator {
    client: GcpClient,
    walker: PageWalker,
}

impl ServerlessEnumerator {
    pub fn new(ctx: &CrawlContext) -> Self {
        Self {
            client: ctx.client.clone(),
            walker: ctx.walker,
        }
    }

    pub async fn cloud_functions(&self) -> EnumerationOutcome {
        let url = self.client.project_api_url(
            "cloudfunctions.googleapis.com",
            "v1",
            "locations/-/functions",
        );
        self.walker
            .walk(lister(&self.client, ListCall::new(url, "functions")))
            .await
    }

    /// `{ "default_app": {...}, "services": [...] }`.
    ///
    /// A project without an App Engine application reports no
    /// `default_app` and an empty service list; that is not a fault.
    pub async fn app_services(&self) -> Outcome<Record> {
        let mut document = Record::new();
        let mut reason = None;

        match self.client.get(&self.client.appengine_url("")).await {
            Ok(app) => {
                document.insert("default_app".into(), Value::Object(default_app(&app)));
            },
            Err(Fault::NotFound(_)) => {
                tracing::debug!("No App Engine application in {}", self.client.project_id);
                document.insert("services".into(), Value::Array(Vec::new()));
                return Outcome::complete(document);
            },
            Err(fault) => {
                tracing::warn!("Failed to get App Engine application: {}", fault);
                reason = Some(fault);
            },
        }

        let call = ListCall::new(self.client.appengine_url("/services"), "services");
        let (services, fault) = self.walker.walk(lister(&self.client, call)).await.into_parts();
        document.insert(
            "services".into(),
            Value::Array(services.into_iter().map(Value::Object).collect()),
        );

        Outcome::from_parts(document, reason.or(fault))
    }
}

fn default_app(app: &Value) -> Record {
    record_of(
        DEFAULT_APP_FIELDS
            .iter()
            .filter_map(|field| app.get(*field).map(|v| (*field, v.clone()))),
    )
}

#[async_trait]
impl ResourceEnumerator for ServerlessEnumerator {
    fn group(&self) -> EnumeratorGroup {
        EnumeratorGroup::Serverless
    }

    async fn enumerate(&self, kind: ResourceKind) -> KindOutcome {
        match kind {
            ResourceKind::CloudFunctions => KindOutcome::Records(self.cloud_functions().await),
            ResourceKind::AppServices => KindOutcome::Document(self.app_services().await),
            other => not_owned(self.group(), other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_app_keeps_summary_fields() {
        let app = json!({
            "name": "apps/demo",
            "id": "demo",
            "defaultHostname": "demo.appspot.com",
            "servingStatus": "SERVING",
            "locationId": "us-central"
        });
        assert_eq!(
            Value::Object(default_app(&app)),
            json!({"name": "apps/demo", "defaultHostname": "demo.appspot.com", "servingStatus": "SERVING"})
        );
    }
}
