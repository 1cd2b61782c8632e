//! gcpcrawl - point-in-time inventory of a GCP project
//!
//! Walks every supported listing API for one project and assembles the
//! results into a [`CrawlReport`], one entry per enabled resource kind.
//! Failures stay local to the kind they hit: the crawl always finishes
//! with a report.
//!
//! ```ignore
//! use gcpcrawl::{run_crawl, CrawlOptions, GcpCredentials};
//!
//! let credentials = GcpCredentials::new().await?;
//! let report = run_crawl(None, "my-project", credentials, CrawlOptions::default()).await;
//! println!("{}", serde_json::to_string_pretty(&report)?);
//! ```

pub mod config;
pub mod enumerator;
pub mod error;
pub mod gcp;
pub mod orchestrator;
pub mod report;
pub mod resource;
pub mod sink;
pub mod walker;

pub use config::CrawlConfig;
pub use enumerator::derive_service_accounts;
pub use error::Fault;
pub use gcp::auth::GcpCredentials;
pub use orchestrator::{run_crawl, CrawlOptions, CrawlOrchestrator};
pub use report::{CrawlReport, EnumerationOutcome, KindOutcome, Outcome};
pub use resource::{EnumeratorGroup, Record, ResourceKind};
pub use walker::{PageWalker, RetryPolicy};
