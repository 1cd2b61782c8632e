//! GCP Projects
//!
//! Lists the projects the credential can see, for choosing a crawl target.

use super::client::GcpClient;
use crate::report::Outcome;
use crate::resource::{lister, str_at, ListCall, Record};
use crate::walker::PageWalker;

const ACTIVE: &str = "ACTIVE";

/// Project information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub project_id: String,
    pub name: String,
    pub project_number: String,
    pub lifecycle_state: String,
}

impl From<&Record> for Project {
    fn from(record: &Record) -> Self {
        let field = |path: &str, default: &str| str_at(record, path).unwrap_or(default).to_string();
        Self {
            project_id: field("projectId", "-"),
            name: field("name", "-"),
            project_number: field("projectNumber", "-"),
            lifecycle_state: field("lifecycleState", "UNKNOWN"),
        }
    }
}

impl Project {
    pub fn is_active(&self) -> bool {
        self.lifecycle_state == ACTIVE
    }
}

/// List every accessible project that is ACTIVE, following all pages
pub async fn list_projects(client: &GcpClient, walker: &PageWalker) -> Outcome<Vec<Project>> {
    let call = ListCall::new(client.resourcemanager_url("projects"), "projects");
    walker.walk(lister(client, call)).await.map(|records| {
        records
            .iter()
            .map(Project::from)
            .filter(Project::is_active)
            .collect()
    })
}
