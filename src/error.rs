//! Fault taxonomy for remote listing calls
//!
//! Every paged fetch, walker, and enumerator reports failure as a [`Fault`].
//! Faults are values recorded in the crawl report, never errors that abort
//! the crawl.

use serde::Serialize;
use thiserror::Error;

/// Why a fetch (and therefore a walk or a whole resource kind) stopped early
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum Fault {
    /// Credential rejected, expired, or lacking permission (401/403)
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Resource or its parent does not exist (404)
    #[error("not found: {0}")]
    NotFound(String),

    /// Rate limited, server error, or network hiccup; eligible for retry
    #[error("transient failure: {0}")]
    Transient(String),

    /// Response did not have the expected shape
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Any other non-success status
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The enumerator for this kind could not be constructed or does not own it
    #[error("setup failed: {0}")]
    Setup(String),

    /// Writing to the local object sink failed
    #[error("object sink: {0}")]
    Sink(String),

    /// The crawl deadline passed before this kind finished
    #[error("cancelled: {0}")]
    Cancelled(String),
}

impl Fault {
    /// Classify an HTTP status from a Google API
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Fault::Auth(message),
            404 => Fault::NotFound(message),
            429 | 500..=599 => Fault::Transient(message),
            _ => Fault::Rejected(message),
        }
    }

    /// Whether a retry of the same request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Fault::Transient(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Fault::NotFound(_))
    }
}

impl From<reqwest::Error> for Fault {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            return Fault::Transient(err.to_string());
        }
        if err.is_decode() {
            return Fault::Malformed(err.to_string());
        }
        match err.status() {
            Some(status) => Fault::from_status(status.as_u16(), err.to_string()),
            None => Fault::Rejected(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for Fault {
    fn from(err: serde_json::Error) -> Self {
        Fault::Malformed(err.to_string())
    }
}
