//! Opaque resource records and the few field accessors the crawler needs
//!
//! Records are kept exactly as the API returned them (key order preserved).
//! Only the accessors below look inside, and only to name a resource or to
//! build the next request.

use crate::error::Fault;
use serde_json::{Map, Value};

/// One remote resource as returned by the provider
pub type Record = Map<String, Value>;

/// Convert an API array element into a record
pub fn into_record(value: Value) -> Result<Record, Fault> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(Fault::Malformed(format!(
            "expected resource object, got {}",
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Wrap an item as `{ scope: item }`
pub fn scoped_record(scope: &str, item: Record) -> Record {
    let mut wrapped = Record::new();
    wrapped.insert(scope.to_string(), Value::Object(item));
    wrapped
}

/// Look up a string by dot-notation path, e.g. `datasetReference.datasetId`
pub fn str_at<'a>(record: &'a Record, path: &str) -> Option<&'a str> {
    let mut parts = path.split('.');
    let mut current = record.get(parts.next()?)?;
    for part in parts {
        current = current.get(part)?;
    }
    current.as_str()
}

/// Like [`str_at`], but a missing field is a malformed response
pub fn require_str<'a>(record: &'a Record, path: &str) -> Result<&'a str, Fault> {
    str_at(record, path).ok_or_else(|| Fault::Malformed(format!("resource is missing `{}`", path)))
}

/// Full resource name (`projects/p/locations/l/keyRings/r`, bucket name, ...)
pub fn resource_name(record: &Record) -> Option<&str> {
    str_at(record, "name")
}

/// Firewall rule name
pub fn firewall_rule_name(record: &Record) -> Option<&str> {
    resource_name(record)
}

/// BigQuery dataset id from a datasets.list entry
pub fn dataset_id(record: &Record) -> Option<&str> {
    str_at(record, "datasetReference.datasetId")
}

/// KMS location id from a locations.list entry
pub fn location_id(record: &Record) -> Option<&str> {
    str_at(record, "locationId")
}

/// Build a record from `(key, value)` pairs, in order
pub fn record_of<I, K>(fields: I) -> Record
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    fields.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        into_record(value).unwrap()
    }

    #[test]
    fn test_into_record_rejects_non_objects() {
        assert!(matches!(into_record(json!("x")), Err(Fault::Malformed(_))));
        assert!(into_record(json!({"a": 1})).is_ok());
    }

    #[test]
    fn test_dataset_id_path() {
        let ds = record(json!({"datasetReference": {"projectId": "p", "datasetId": "sales"}}));
        assert_eq!(dataset_id(&ds), Some("sales"));
        assert_eq!(dataset_id(&record(json!({"id": "p:sales"}))), None);
    }

    #[test]
    fn test_require_str_reports_path() {
        let err = require_str(&record(json!({})), "locationId").unwrap_err();
        assert_eq!(err, Fault::Malformed("resource is missing `locationId`".into()));
    }

    #[test]
    fn test_record_preserves_key_order() {
        let r = record_of([("zeta", json!(1)), ("alpha", json!(2))]);
        let keys: Vec<&String> = r.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_scoped_record_shape() {
        let wrapped = scoped_record("regions/us-east1", record(json!({"name": "ip"})));
        assert_eq!(Value::Object(wrapped), json!({"regions/us-east1": {"name": "ip"}}));
    }
}
