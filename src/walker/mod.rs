//! Pagination walkers
//!
//! Every Google listing API hands back one page plus an optional
//! continuation token. The walkers here turn a single-page fetch closure
//! into a complete, flattened result:
//!
//! - [`PageWalker::walk`] - plain cursor loop
//! - [`PageWalker::walk_aggregated`] - pages shaped as `scope → items`
//! - [`PageWalker::walk_nested`] / [`PageWalker::walk_each`] - one full walk per parent item
//!
//! A fetch closure has the shape `FnMut(Option<String>) -> impl Future<Output =
//! Result<Page<T>, Fault>>`; it receives `None` for the first page.
//!
//! Walkers never return `Err`. A fault stops the walk and the items
//! collected so far come back as [`Outcome::Partial`](crate::report::Outcome).

mod aggregated;
mod nested;
mod page;

use std::time::Duration;

pub use aggregated::{flatten_scopes, ScopeMode, Scoped};
pub use nested::{Branch, Nested};
pub use page::PageWalker;

/// One page of a listing
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_cursor: Option<String>) -> Self {
        Self { items, next_cursor }
    }

    /// A page with no continuation
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_cursor: None,
        }
    }
}

/// Bounded exponential backoff for transient faults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; 0 disables retry
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// A single fault ends the walk
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(10), Duration::from_secs(8));
        assert_eq!(policy.delay_for(40), Duration::from_secs(8));
    }

    #[test]
    fn test_none_policy_has_no_delay() {
        assert_eq!(RetryPolicy::none().delay_for(5), Duration::ZERO);
    }
}
