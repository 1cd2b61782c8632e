//! Managed databases: Cloud SQL, BigQuery, Bigtable, Spanner

use super::{not_owned, CrawlContext, ResourceEnumerator};
use crate::error::Fault;
use crate::gcp::client::GcpClient;
use crate::report::{EnumerationOutcome, Groups, GroupedOutcome, KindOutcome};
use crate::resource::{child_lister, dataset_id, lister, ListCall, Record};
use crate::resource::{EnumeratorGroup, ResourceKind};
use crate::walker::PageWalker;
use async_trait::async_trait;

const BIGQUERY_HOST: &str = "bigquery.googleapis.com";

/// Key used for a dataset whose listing entry has no id
const UNKNOWN_DATASET: &str = "<unknown>";

pub struct DatabaseEnumerator {
    client: GcpClient,
    walker: PageWalker,
}

impl DatabaseEnumerator {
    pub fn new(ctx: &CrawlContext) -> Self {
        Self {
            client: ctx.client.clone(),
            walker: ctx.walker,
        }
    }

    pub async fn sql_instances(&self) -> EnumerationOutcome {
        let url = self
            .client
            .project_api_url("sqladmin.googleapis.com", "sql/v1beta4", "instances");
        self.walker
            .walk(lister(&self.client, ListCall::new(url, "items")))
            .await
    }

    /// Tables of every dataset, keyed by dataset id.
    ///
    /// A dataset whose table listing fails keeps whatever tables were
    /// gathered; the remaining datasets are still visited.
    pub async fn bigquery(&self) -> GroupedOutcome {
        let datasets = ListCall::new(
            self.client.project_api_url(BIGQUERY_HOST, "bigquery/v2", "datasets"),
            "datasets",
        );

        let nested = self
            .walker
            .walk_nested(lister(&self.client, datasets), |dataset: &Record| {
                child_lister(&self.client, self.tables_call(dataset))
            })
            .await;

        nested
            .into_groups(|dataset| dataset_id(dataset).unwrap_or(UNKNOWN_DATASET).to_string())
            .map(Groups)
    }

    pub async fn bigtable(&self) -> EnumerationOutcome {
        let url = self
            .client
            .project_api_url("bigtableadmin.googleapis.com", "v2", "instances");
        self.walker
            .walk(lister(&self.client, ListCall::new(url, "instances")))
            .await
    }

    pub async fn spanner(&self) -> EnumerationOutcome {
        let url = self
            .client
            .project_api_url("spanner.googleapis.com", "v1", "instances");
        self.walker
            .walk(lister(&self.client, ListCall::new(url, "instances")))
            .await
    }

    fn tables_call(&self, dataset: &Record) -> Result<ListCall, Fault> {
        let id = dataset_id(dataset)
            .ok_or_else(|| Fault::Malformed("dataset is missing `datasetReference.datasetId`".into()))?;
        let url = self.client.project_api_url(
            BIGQUERY_HOST,
            "bigquery/v2",
            &format!("datasets/{}/tables", urlencoding::encode(id)),
        );
        Ok(ListCall::new(url, "tables"))
    }
}

#[async_trait]
impl ResourceEnumerator for DatabaseEnumerator {
    fn group(&self) -> EnumeratorGroup {
        EnumeratorGroup::Database
    }

    async fn enumerate(&self, kind: ResourceKind) -> KindOutcome {
        match kind {
            ResourceKind::SqlInstances => KindOutcome::Records(self.sql_instances().await),
            ResourceKind::Bigquery => KindOutcome::Grouped(self.bigquery().await),
            ResourceKind::Bigtable => KindOutcome::Records(self.bigtable().await),
            ResourceKind::Spanner => KindOutcome::Records(self.spanner().await),
            other => not_owned(self.group(), other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcp::auth::GcpCredentials;
    use crate::resource::into_record;
    use serde_json::json;

    fn enumerator() -> DatabaseEnumerator {
        let client =
            GcpClient::with_credentials("demo", GcpCredentials::from_access_token("t")).unwrap();
        DatabaseEnumerator::new(&CrawlContext::new(client, PageWalker::without_retry()))
    }

    #[test]
    fn test_tables_call_uses_dataset_reference() {
        let dataset =
            into_record(json!({"id": "demo:sales", "datasetReference": {"datasetId": "sales"}}))
                .unwrap();
        let call = enumerator().tables_call(&dataset).unwrap();
        assert_eq!(
            call.url,
            "https://bigquery.googleapis.com/bigquery/v2/projects/demo/datasets/sales/tables"
        );
        assert_eq!(call.items_field, "tables");
    }

    #[test]
    fn test_tables_call_without_id_is_malformed() {
        let dataset = into_record(json!({"id": "demo:sales"})).unwrap();
        assert!(matches!(
            enumerator().tables_call(&dataset),
            Err(Fault::Malformed(_))
        ));
    }
}
