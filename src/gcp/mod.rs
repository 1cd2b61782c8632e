//! GCP API interaction module
//!
//! Authentication, the HTTP client, URL building for each API, and project
//! listing. Everything above this layer sees [`Fault`](crate::error::Fault)
//! values, never HTTP details.
//!
//! # Module Structure
//!
//! - [`auth`] - Application Default Credentials or a fixed bearer token
//! - [`client`] - Project-scoped client and per-API URL builders
//! - [`http`] - HTTP transport and status classification
//! - [`projects`] - Project listing

pub mod auth;
pub mod client;
pub mod http;
pub mod projects;
