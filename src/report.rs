//! Crawl results
//!
//! A walk never throws away what it gathered: every result is an
//! [`Outcome`], complete or partial with the fault that stopped it.

use crate::error::Fault;
use crate::resource::{Record, ResourceKind, Shape};
use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use uuid::Uuid;

/// Result of one walk or one resource kind
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome<T> {
    Complete { items: T },
    Partial { items: T, reason: Fault },
}

/// Records gathered for one resource kind
pub type EnumerationOutcome = Outcome<Vec<Record>>;

/// Sub-outcomes keyed by parent (BigQuery dataset id → tables)
pub type GroupedOutcome = Outcome<Groups>;

impl<T> Outcome<T> {
    pub fn complete(items: T) -> Self {
        Outcome::Complete { items }
    }

    pub fn partial(items: T, reason: Fault) -> Self {
        Outcome::Partial { items, reason }
    }

    pub fn items(&self) -> &T {
        match self {
            Outcome::Complete { items } | Outcome::Partial { items, .. } => items,
        }
    }

    pub fn into_items(self) -> T {
        match self {
            Outcome::Complete { items } | Outcome::Partial { items, .. } => items,
        }
    }

    pub fn reason(&self) -> Option<&Fault> {
        match self {
            Outcome::Complete { .. } => None,
            Outcome::Partial { reason, .. } => Some(reason),
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Outcome::Complete { .. })
    }

    /// Transform the payload, keeping completeness and reason
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Complete { items } => Outcome::Complete { items: f(items) },
            Outcome::Partial { items, reason } => Outcome::Partial {
                items: f(items),
                reason,
            },
        }
    }

    /// Split into payload and optional fault
    pub fn into_parts(self) -> (T, Option<Fault>) {
        match self {
            Outcome::Complete { items } => (items, None),
            Outcome::Partial { items, reason } => (items, Some(reason)),
        }
    }

    /// Rebuild from payload and optional fault
    pub fn from_parts(items: T, reason: Option<Fault>) -> Self {
        match reason {
            None => Outcome::Complete { items },
            Some(reason) => Outcome::Partial { items, reason },
        }
    }
}

impl<T: Default> Outcome<T> {
    /// Nothing gathered at all
    pub fn failed(reason: Fault) -> Self {
        Outcome::Partial {
            items: T::default(),
            reason,
        }
    }
}

/// Ordered `key → outcome` pairs, serialized as a JSON object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Groups(pub Vec<(String, EnumerationOutcome)>);

impl Groups {
    pub fn get(&self, key: &str) -> Option<&EnumerationOutcome> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Groups {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, outcome) in &self.0 {
            map.serialize_entry(key, outcome)?;
        }
        map.end()
    }
}

/// Outcome of one resource kind, in the shape that kind produces
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum KindOutcome {
    Records(EnumerationOutcome),
    Grouped(GroupedOutcome),
    Document(Outcome<Record>),
}

impl KindOutcome {
    /// An empty partial outcome of the right shape for `kind`
    pub fn failed(kind: ResourceKind, reason: Fault) -> Self {
        match kind.shape() {
            Shape::Records => KindOutcome::Records(Outcome::failed(reason)),
            Shape::Grouped => KindOutcome::Grouped(Outcome::failed(reason)),
            Shape::Document => KindOutcome::Document(Outcome::failed(reason)),
        }
    }

    pub fn reason(&self) -> Option<&Fault> {
        match self {
            KindOutcome::Records(o) => o.reason(),
            KindOutcome::Grouped(o) => o.reason(),
            KindOutcome::Document(o) => o.reason(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.reason().is_none()
    }

    /// Number of top-level entries gathered
    pub fn len(&self) -> usize {
        match self {
            KindOutcome::Records(o) => o.items().len(),
            KindOutcome::Grouped(o) => o.items().len(),
            KindOutcome::Document(o) => o.items().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_records(&self) -> Option<&EnumerationOutcome> {
        match self {
            KindOutcome::Records(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_grouped(&self) -> Option<&GroupedOutcome> {
        match self {
            KindOutcome::Grouped(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Outcome<Record>> {
        match self {
            KindOutcome::Document(o) => Some(o),
            _ => None,
        }
    }
}

/// Everything one crawl found, one entry per enabled resource kind
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    crawl_id: Uuid,
    project: String,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    #[serde(serialize_with = "serialize_entries")]
    resources: Vec<(ResourceKind, KindOutcome)>,
}

fn serialize_entries<S: Serializer>(
    entries: &[(ResourceKind, KindOutcome)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(entries.len()))?;
    for (kind, outcome) in entries {
        map.serialize_entry(kind.as_str(), outcome)?;
    }
    map.end()
}

impl CrawlReport {
    pub(crate) fn new(
        project: &str,
        started_at: DateTime<Utc>,
        resources: Vec<(ResourceKind, KindOutcome)>,
    ) -> Self {
        Self {
            crawl_id: Uuid::new_v4(),
            project: project.to_string(),
            started_at,
            finished_at: Utc::now(),
            resources,
        }
    }

    pub fn crawl_id(&self) -> Uuid {
        self.crawl_id
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    pub fn get(&self, kind: ResourceKind) -> Option<&KindOutcome> {
        self.resources
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, outcome)| outcome)
    }

    pub fn contains(&self, kind: ResourceKind) -> bool {
        self.get(kind).is_some()
    }

    /// Kinds in the order their enumerators were started
    pub fn kinds(&self) -> impl Iterator<Item = ResourceKind> + '_ {
        self.resources.iter().map(|(k, _)| *k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceKind, &KindOutcome)> {
        self.resources.iter().map(|(k, o)| (*k, o))
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Count of kinds that did not complete
    pub fn partial_count(&self) -> usize {
        self.resources
            .iter()
            .filter(|(_, o)| !o.is_complete())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(name: &str) -> Record {
        let mut r = Record::new();
        r.insert("name".into(), json!(name));
        r
    }

    #[test]
    fn test_partial_keeps_items() {
        let outcome = Outcome::partial(vec![record("a")], Fault::Transient("503".into()));
        assert!(!outcome.is_complete());
        assert_eq!(outcome.items().len(), 1);
        assert_eq!(outcome.reason(), Some(&Fault::Transient("503".into())));
    }

    #[test]
    fn test_outcome_serialization() {
        let complete: EnumerationOutcome = Outcome::complete(vec![record("a")]);
        let value = serde_json::to_value(&complete).unwrap();
        assert_eq!(value, json!({"status": "complete", "items": [{"name": "a"}]}));

        let partial: EnumerationOutcome = Outcome::failed(Fault::Auth("denied".into()));
        let value = serde_json::to_value(&partial).unwrap();
        assert_eq!(value["status"], "partial");
        assert_eq!(value["reason"]["kind"], "auth");
        assert_eq!(value["items"], json!([]));
    }

    #[test]
    fn test_failed_kind_outcome_matches_shape() {
        let reason = Fault::Setup("boom".into());
        assert!(KindOutcome::failed(ResourceKind::Bigquery, reason.clone())
            .as_grouped()
            .is_some());
        assert!(KindOutcome::failed(ResourceKind::IamPolicy, reason.clone())
            .as_document()
            .is_some());
        assert!(KindOutcome::failed(ResourceKind::Buckets, reason)
            .as_records()
            .is_some());
    }

    #[test]
    fn test_report_serializes_in_insertion_order() {
        let report = CrawlReport::new(
            "my-project",
            Utc::now(),
            vec![
                (
                    ResourceKind::Spanner,
                    KindOutcome::Records(Outcome::complete(vec![])),
                ),
                (
                    ResourceKind::Buckets,
                    KindOutcome::Records(Outcome::complete(vec![record("b")])),
                ),
            ],
        );
        let value = serde_json::to_value(&report).unwrap();
        let keys: Vec<&String> = value["resources"].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["spanner", "buckets"]);
        assert_eq!(report.partial_count(), 0);
        assert!(report.contains(ResourceKind::Buckets));
        assert!(!report.contains(ResourceKind::Filestore));
    }
}
