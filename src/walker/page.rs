//! The plain cursor walk

use super::{Page, RetryPolicy};
use crate::error::Fault;
use crate::report::Outcome;
use std::collections::HashSet;
use std::future::Future;

/// Drives a single-page fetch closure until the listing is exhausted.
///
/// Holds no state between walks; the same walker can be shared by every
/// resource kind in a crawl.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageWalker {
    retry: RetryPolicy,
}

/// Cursor bookkeeping shared by every walk flavour.
///
/// An exhausted cursor is never sent again, and a cursor the server has
/// already handed out once is rejected instead of being followed in a loop.
#[derive(Default)]
pub(super) struct CursorState {
    current: Option<String>,
    seen: HashSet<String>,
}

impl CursorState {
    pub(super) fn current(&self) -> Option<String> {
        self.current.clone()
    }

    /// Record the next cursor; `Ok(false)` means the listing is done
    pub(super) fn advance(&mut self, next: Option<String>) -> Result<bool, Fault> {
        match next.filter(|c| !c.is_empty()) {
            None => {
                self.current = None;
                Ok(false)
            },
            Some(next) => {
                if !self.seen.insert(next.clone()) {
                    return Err(Fault::Malformed(format!(
                        "server returned page cursor {:?} twice",
                        next
                    )));
                }
                self.current = Some(next);
                Ok(true)
            },
        }
    }
}

impl PageWalker {
    pub fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }

    /// A walker that gives up on the first fault of any kind
    pub fn without_retry() -> Self {
        Self::new(RetryPolicy::none())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Fetch pages until the next cursor is absent, concatenating items in page order
    pub async fn walk<T, F, Fut>(&self, fetch: F) -> Outcome<Vec<T>>
    where
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = Result<Page<T>, Fault>>,
    {
        self.walk_map(fetch, Ok).await
    }

    /// Like [`walk`](Self::walk), passing each item through `project`.
    ///
    /// A page with items that fail to project still contributes the ones
    /// that succeed; the walk then ends with the first failure.
    pub async fn walk_map<T, U, F, Fut, P>(&self, mut fetch: F, mut project: P) -> Outcome<Vec<U>>
    where
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = Result<Page<T>, Fault>>,
        P: FnMut(T) -> Result<U, Fault>,
    {
        let mut items = Vec::new();
        let mut cursor = CursorState::default();
        let mut pages = 0usize;

        loop {
            let page = match self.fetch_page(&mut fetch, cursor.current()).await {
                Ok(page) => page,
                Err(fault) => {
                    tracing::warn!(
                        "Walk stopped after {} pages ({} items): {}",
                        pages,
                        items.len(),
                        fault
                    );
                    return Outcome::partial(items, fault);
                },
            };

            pages += 1;
            let mut rejected = None;
            for item in page.items {
                match project(item) {
                    Ok(item) => items.push(item),
                    Err(fault) => {
                        rejected.get_or_insert(fault);
                    },
                }
            }
            if let Some(fault) = rejected {
                tracing::warn!("Walk stopped at page {}: {}", pages, fault);
                return Outcome::partial(items, fault);
            }

            match cursor.advance(page.next_cursor) {
                Ok(true) => continue,
                Ok(false) => break,
                Err(fault) => {
                    tracing::warn!("Walk stopped after {} pages: {}", pages, fault);
                    return Outcome::partial(items, fault);
                },
            }
        }

        tracing::trace!("Walk finished: {} pages, {} items", pages, items.len());
        Outcome::complete(items)
    }

    /// One page, retrying transient faults for the same cursor per the retry policy
    pub(super) async fn fetch_page<T, F, Fut>(
        &self,
        fetch: &mut F,
        cursor: Option<String>,
    ) -> Result<Page<T>, Fault>
    where
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = Result<Page<T>, Fault>>,
    {
        let mut attempt = 0;
        loop {
            match fetch(cursor.clone()).await {
                Err(fault) if fault.is_transient() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for(attempt);
                    attempt += 1;
                    tracing::debug!(
                        "Transient fault ({}), retry {}/{} in {:?}",
                        fault,
                        attempt,
                        self.retry.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                },
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::time::Duration;

    /// Serves `pages` in order, each pointing at the next by index
    fn paged(pages: Vec<Vec<u32>>) -> impl FnMut(Option<String>) -> std::future::Ready<Result<Page<u32>, Fault>> {
        move |cursor| {
            let index: usize = cursor.map(|c| c.parse().unwrap()).unwrap_or(0);
            let next = (index + 1 < pages.len()).then(|| (index + 1).to_string());
            std::future::ready(Ok(Page::new(pages[index].clone(), next)))
        }
    }

    #[tokio::test]
    async fn test_walk_concatenates_pages_in_order() {
        let calls = RefCell::new(0);
        let mut inner = paged(vec![vec![1, 2], vec![], vec![3], vec![4, 5]]);
        let outcome = PageWalker::without_retry()
            .walk(|c| {
                *calls.borrow_mut() += 1;
                inner(c)
            })
            .await;

        assert_eq!(outcome, Outcome::complete(vec![1, 2, 3, 4, 5]));
        assert_eq!(*calls.borrow(), 4);
    }

    #[tokio::test]
    async fn test_first_request_has_no_cursor() {
        let seen = RefCell::new(Vec::new());
        let _ = PageWalker::without_retry()
            .walk(|c: Option<String>| {
                seen.borrow_mut().push(c.clone());
                let next = c.is_none().then(|| "p2".to_string());
                std::future::ready(Ok(Page::new(vec![0u8], next)))
            })
            .await;

        assert_eq!(*seen.borrow(), vec![None, Some("p2".to_string())]);
    }

    #[tokio::test]
    async fn test_fault_returns_partial_with_collected_items() {
        let outcome = PageWalker::without_retry()
            .walk(|c: Option<String>| {
                std::future::ready(match c {
                    None => Ok(Page::new(vec!["a", "b"], Some("2".into()))),
                    Some(_) => Err(Fault::Transient("503".into())),
                })
            })
            .await;

        assert_eq!(
            outcome,
            Outcome::partial(vec!["a", "b"], Fault::Transient("503".into()))
        );
    }

    #[tokio::test]
    async fn test_empty_string_cursor_ends_walk() {
        let outcome = PageWalker::without_retry()
            .walk(|_| std::future::ready(Ok(Page::new(vec![1], Some(String::new())))))
            .await;
        assert_eq!(outcome, Outcome::complete(vec![1]));
    }

    #[tokio::test]
    async fn test_cursor_cycle_is_rejected() {
        let outcome = PageWalker::without_retry()
            .walk(|c: Option<String>| {
                let next = match c.as_deref() {
                    None => "a",
                    Some("a") => "b",
                    _ => "a",
                };
                std::future::ready(Ok(Page::new(vec![1], Some(next.to_string()))))
            })
            .await;

        assert_eq!(outcome.items().len(), 3);
        assert!(matches!(outcome.reason(), Some(Fault::Malformed(_))));
    }

    #[tokio::test]
    async fn test_walk_is_idempotent() {
        let walker = PageWalker::without_retry();
        let first = walker.walk(paged(vec![vec![1], vec![2, 3]])).await;
        let second = walker.walk(paged(vec![vec![1], vec![2, 3]])).await;
        assert_eq!(first, second);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_fault_is_retried_for_same_cursor() {
        let attempts = RefCell::new(Vec::new());
        let walker = PageWalker::new(RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
        });

        let outcome = walker
            .walk(|c: Option<String>| {
                attempts.borrow_mut().push(c.clone());
                let n = attempts.borrow().len();
                std::future::ready(match (c.as_deref(), n) {
                    (None, _) => Ok(Page::new(vec![1], Some("next".into()))),
                    (Some("next"), 2) => Err(Fault::Transient("429".into())),
                    (Some("next"), _) => Ok(Page::last(vec![2])),
                    _ => unreachable!(),
                })
            })
            .await;

        assert_eq!(outcome, Outcome::complete(vec![1, 2]));
        assert_eq!(
            *attempts.borrow(),
            vec![None, Some("next".to_string()), Some("next".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_bounded() {
        let calls = RefCell::new(0);
        let walker = PageWalker::new(RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
        });

        let outcome = walker
            .walk(|_| {
                *calls.borrow_mut() += 1;
                std::future::ready(Err::<Page<u8>, _>(Fault::Transient("503".into())))
            })
            .await;

        assert!(matches!(outcome.reason(), Some(Fault::Transient(_))));
        assert_eq!(*calls.borrow(), 4);
    }

    #[tokio::test]
    async fn test_non_transient_fault_is_not_retried() {
        let calls = RefCell::new(0);
        let outcome = PageWalker::default()
            .walk(|_| {
                *calls.borrow_mut() += 1;
                std::future::ready(Err::<Page<u8>, _>(Fault::Auth("401".into())))
            })
            .await;

        assert_eq!(outcome, Outcome::failed(Fault::Auth("401".into())));
        assert_eq!(*calls.borrow(), 1);
    }

    #[tokio::test]
    async fn test_walk_map_keeps_well_formed_items_of_failing_page() {
        let calls = RefCell::new(0);
        let mut inner = paged(vec![vec![1], vec![2, 3, 0, 4], vec![5]]);
        let outcome = PageWalker::without_retry()
            .walk_map(
                |c| {
                    *calls.borrow_mut() += 1;
                    inner(c)
                },
                |n: u32| match n {
                    0 => Err(Fault::Malformed("zero".into())),
                    n => Ok(n * 10),
                },
            )
            .await;

        assert_eq!(
            outcome,
            Outcome::partial(vec![10, 20, 30, 40], Fault::Malformed("zero".into()))
        );
        assert_eq!(*calls.borrow(), 2);
    }
}
