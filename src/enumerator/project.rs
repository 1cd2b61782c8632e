//! Project metadata, IAM, and enabled APIs

use super::{not_owned, CrawlContext, ResourceEnumerator};
use crate::error::Fault;
use crate::gcp::client::GcpClient;
use crate::report::{EnumerationOutcome, KindOutcome, Outcome};
use crate::resource::fetcher::extract_items;
use crate::resource::{into_record, lister, record_of, require_str, str_at, ListCall, Record};
use crate::resource::{EnumeratorGroup, ResourceKind};
use crate::walker::PageWalker;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;

/// IAM policy version that includes conditional bindings
const IAM_POLICY_VERSION: u32 = 3;

/// Members removed from the directory keep their binding with this prefix
const DELETED_MEMBER_PREFIX: &str = "deleted:";

const SERVICES_PAGE_SIZE: &str = "200";

pub struct ProjectEnumerator {
    client: GcpClient,
    walker: PageWalker,
}

impl ProjectEnumerator {
    pub fn new(ctx: &CrawlContext) -> Self {
        Self {
            client: ctx.client.clone(),
            walker: ctx.walker,
        }
    }

    /// The project resource itself. A response without `projectNumber` is
    /// kept but marked malformed.
    pub async fn project_info(&self) -> Outcome<Record> {
        let url = self
            .client
            .resourcemanager_url(&format!("projects/{}", self.client.project_id));

        let project = match self.client.get(&url).await.and_then(into_record) {
            Ok(project) => project,
            Err(fault) => return Outcome::failed(fault),
        };

        match require_str(&project, "projectNumber") {
            Ok(_) => Outcome::complete(project),
            Err(fault) => Outcome::partial(project, fault),
        }
    }

    /// `{ "bindings": [...], "serviceAccounts": [...] }`
    pub async fn iam_policy(&self) -> Outcome<Record> {
        let url = self
            .client
            .resourcemanager_url(&format!("projects/{}:getIamPolicy", self.client.project_id));
        let body = json!({ "options": { "requestedPolicyVersion": IAM_POLICY_VERSION } });

        let bindings = match self
            .client
            .post(&url, Some(&body))
            .await
            .and_then(|policy| extract_items(&policy, "bindings"))
        {
            Ok(bindings) => bindings,
            Err(fault) => return Outcome::failed(fault),
        };

        let accounts = derive_service_accounts(&bindings);
        tracing::debug!(
            "IAM policy has {} bindings, {} distinct accounts",
            bindings.len(),
            accounts.len()
        );

        Outcome::complete(record_of([
            (
                "bindings",
                Value::Array(bindings.into_iter().map(Value::Object).collect()),
            ),
            (
                "serviceAccounts",
                Value::Array(accounts.into_iter().map(Value::String).collect()),
            ),
        ]))
    }

    /// Service accounts, projected to `{ "email", "description" }`
    pub async fn service_accounts(&self) -> EnumerationOutcome {
        let url = self
            .client
            .project_api_url("iam.googleapis.com", "v1", "serviceAccounts");
        self.walker
            .walk_map(lister(&self.client, ListCall::new(url, "accounts")), account_summary)
            .await
    }

    pub async fn enabled_services(&self) -> EnumerationOutcome {
        let url = self
            .client
            .project_api_url("serviceusage.googleapis.com", "v1", "services");
        let call = ListCall::new(url, "services")
            .param("filter", "state:ENABLED")
            .param("pageSize", SERVICES_PAGE_SIZE);
        self.walker.walk(lister(&self.client, call)).await
    }
}

fn account_summary(account: Record) -> Result<Record, Fault> {
    let email = require_str(&account, "email")?;
    let description = str_at(&account, "description").unwrap_or("");
    Ok(record_of([
        ("email", Value::from(email)),
        ("description", Value::from(description)),
    ]))
}

/// Distinct accounts referenced by IAM bindings, in first-seen order.
///
/// For each member of each binding: members of deleted principals are
/// skipped, and of the `:`-separated parts the first one containing `@`
/// is the account. Members with no such part (`allUsers`,
/// `projectOwner:...`) contribute nothing.
pub fn derive_service_accounts(bindings: &[Record]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut accounts = Vec::new();

    let members = bindings
        .iter()
        .filter_map(|binding| binding.get("members").and_then(Value::as_array))
        .flatten()
        .filter_map(Value::as_str);

    for member in members {
        if member.starts_with(DELETED_MEMBER_PREFIX) {
            continue;
        }
        let Some(account) = member.split(':').find(|part| part.contains('@')) else {
            continue;
        };
        if seen.insert(account) {
            accounts.push(account.to_string());
        }
    }

    accounts
}

#[async_trait]
impl ResourceEnumerator for ProjectEnumerator {
    fn group(&self) -> EnumeratorGroup {
        EnumeratorGroup::Project
    }

    async fn enumerate(&self, kind: ResourceKind) -> KindOutcome {
        match kind {
            ResourceKind::ProjectInfo => KindOutcome::Document(self.project_info().await),
            ResourceKind::IamPolicy => KindOutcome::Document(self.iam_policy().await),
            ResourceKind::ServiceAccounts => KindOutcome::Records(self.service_accounts().await),
            ResourceKind::EnabledServices => KindOutcome::Records(self.enabled_services().await),
            other => not_owned(self.group(), other),
        }
    }
}
