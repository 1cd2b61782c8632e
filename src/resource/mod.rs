//! Resource abstraction layer
//!
//! # Architecture
//!
//! - [`kind`] - Resource kinds, their enumerator groups and config keys
//! - [`record`] - Opaque resource records and field accessors
//! - [`fetcher`] - Fetches single pages from GCP list APIs

pub mod fetcher;
pub mod kind;
pub mod record;

pub use fetcher::{child_lister, fetch_page, fetch_scoped_page, lister, scoped_lister, ListCall};
pub use kind::{EnumeratorGroup, ResourceKind, Shape};
pub use record::{
    dataset_id, firewall_rule_name, into_record, location_id, record_of, require_str,
    resource_name, scoped_record, str_at, Record,
};
