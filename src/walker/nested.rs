//! Dependent listings: one full walk per parent item
//!
//! Used where the remote model only exposes children under a parent
//! (KMS key rings under locations, BigQuery tables under datasets).

use super::page::CursorState;
use super::{Page, PageWalker};
use crate::error::Fault;
use crate::report::Outcome;
use std::future::Future;

/// One parent and the outcome of walking its children
#[derive(Debug, Clone, PartialEq)]
pub struct Branch<P, T> {
    pub parent: P,
    pub outcome: Outcome<Vec<T>>,
}

/// Result of a nested walk: every visited branch, plus the fault (if any)
/// that stopped the parent listing itself
#[derive(Debug, Clone, PartialEq)]
pub struct Nested<P, T> {
    pub branches: Vec<Branch<P, T>>,
    pub parents_fault: Option<Fault>,
}

impl<P, T> Nested<P, T> {
    /// Concatenate every branch's items in parent order.
    ///
    /// Partial if any branch or the parent listing was partial; the reason
    /// is the first branch fault, else the parent fault.
    pub fn flatten(self) -> Outcome<Vec<T>> {
        let mut items = Vec::new();
        let mut reason = None;
        for branch in self.branches {
            let (children, fault) = branch.outcome.into_parts();
            items.extend(children);
            reason = reason.or(fault);
        }
        Outcome::from_parts(items, reason.or(self.parents_fault))
    }

    /// Keep each branch's outcome separate, keyed by `key(parent)`
    pub fn into_groups<K>(self, key: impl Fn(&P) -> K) -> Outcome<Vec<(K, Outcome<Vec<T>>)>> {
        let groups = self
            .branches
            .into_iter()
            .map(|branch| (key(&branch.parent), branch.outcome))
            .collect();
        Outcome::from_parts(groups, self.parents_fault)
    }
}

impl PageWalker {
    /// Walk the children of each parent in turn, depth-first.
    ///
    /// A fault inside one branch ends only that branch; the next parent is
    /// still visited.
    pub async fn walk_each<P, T, B, F, Fut>(&self, parents: Vec<P>, mut fetch_for: B) -> Vec<Branch<P, T>>
    where
        B: FnMut(&P) -> F,
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = Result<Page<T>, Fault>>,
    {
        let walker = *self;
        self.walk_each_with(parents, move |parent| {
            let fetch = fetch_for(parent);
            async move { walker.walk(fetch).await }
        })
        .await
    }

    /// [`walk_each`](Self::walk_each) with the whole branch supplied by
    /// `drain`, for children that are themselves nested listings
    pub async fn walk_each_with<P, T, D, DFut>(&self, parents: Vec<P>, mut drain: D) -> Vec<Branch<P, T>>
    where
        D: FnMut(&P) -> DFut,
        DFut: Future<Output = Outcome<Vec<T>>>,
    {
        let mut branches = Vec::with_capacity(parents.len());
        for parent in parents {
            let outcome = drain(&parent).await;
            if let Some(fault) = outcome.reason() {
                tracing::warn!(
                    "Branch stopped after {} items, continuing with siblings: {}",
                    outcome.items().len(),
                    fault
                );
            }
            branches.push(Branch { parent, outcome });
        }
        branches
    }

    /// Walk a paginated parent listing and, for each parent page, drain every
    /// parent's children before requesting the next parent page.
    pub async fn walk_nested<P, T, FP, FutP, B, F, Fut>(&self, fetch_parents: FP, mut fetch_for: B) -> Nested<P, T>
    where
        FP: FnMut(Option<String>) -> FutP,
        FutP: Future<Output = Result<Page<P>, Fault>>,
        B: FnMut(&P) -> F,
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = Result<Page<T>, Fault>>,
    {
        let walker = *self;
        self.walk_nested_with(fetch_parents, move |parent| {
            let fetch = fetch_for(parent);
            async move { walker.walk(fetch).await }
        })
        .await
    }

    /// [`walk_nested`](Self::walk_nested) with each branch drained by
    /// `drain`. Nesting these gives a depth-first walk of any depth.
    pub async fn walk_nested_with<P, T, FP, FutP, D, DFut>(
        &self,
        mut fetch_parents: FP,
        mut drain: D,
    ) -> Nested<P, T>
    where
        FP: FnMut(Option<String>) -> FutP,
        FutP: Future<Output = Result<Page<P>, Fault>>,
        D: FnMut(&P) -> DFut,
        DFut: Future<Output = Outcome<Vec<T>>>,
    {
        let mut branches = Vec::new();
        let mut cursor = CursorState::default();

        loop {
            let page = match self.fetch_page(&mut fetch_parents, cursor.current()).await {
                Ok(page) => page,
                Err(fault) => {
                    tracing::warn!("Parent listing stopped after {} parents: {}", branches.len(), fault);
                    return Nested {
                        branches,
                        parents_fault: Some(fault),
                    };
                },
            };

            branches.extend(self.walk_each_with(page.items, &mut drain).await);

            match cursor.advance(page.next_cursor) {
                Ok(true) => continue,
                Ok(false) => break,
                Err(fault) => {
                    return Nested {
                        branches,
                        parents_fault: Some(fault),
                    }
                },
            }
        }

        Nested {
            branches,
            parents_fault: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::future::{ready, Ready};

    type Fetch = Box<dyn FnMut(Option<String>) -> Ready<Result<Page<&'static str>, Fault>>>;

    fn children_of(parent: &&'static str) -> Fetch {
        match *parent {
            "P1" => Box::new(|c: Option<String>| {
                ready(match c {
                    None => Ok(Page::new(vec!["c1"], Some("more".into()))),
                    Some(_) => Err(Fault::Transient("503".into())),
                })
            }),
            "P2" => Box::new(|c: Option<String>| {
                ready(match c {
                    None => Ok(Page::new(vec!["c2"], Some("more".into()))),
                    Some(_) => Ok(Page::last(vec!["c3"])),
                })
            }),
            _ => Box::new(|_| ready(Ok(Page::last(vec![])))),
        }
    }

    #[tokio::test]
    async fn test_branch_fault_does_not_abort_siblings() {
        let branches = PageWalker::without_retry()
            .walk_each(vec!["P1", "P2"], children_of)
            .await;

        assert_eq!(branches.len(), 2);
        assert_eq!(
            branches[0].outcome,
            Outcome::partial(vec!["c1"], Fault::Transient("503".into()))
        );
        assert_eq!(branches[1].outcome, Outcome::complete(vec!["c2", "c3"]));
    }

    #[tokio::test]
    async fn test_flatten_keeps_all_items_and_first_fault() {
        let nested = PageWalker::without_retry()
            .walk_nested(|_| ready(Ok(Page::last(vec!["P1", "P2"]))), children_of)
            .await;

        assert_eq!(nested.parents_fault, None);
        assert_eq!(
            nested.flatten(),
            Outcome::partial(vec!["c1", "c2", "c3"], Fault::Transient("503".into()))
        );
    }

    #[tokio::test]
    async fn test_children_drained_before_next_parent_page() {
        let log = RefCell::new(Vec::new());
        let nested = PageWalker::without_retry()
            .walk_nested(
                |c: Option<String>| {
                    log.borrow_mut().push(format!("parents:{:?}", c));
                    ready(Ok(match c {
                        None => Page::new(vec!["P1"], Some("p2".into())),
                        Some(_) => Page::last(vec!["P2"]),
                    }))
                },
                |parent: &&'static str| {
                    let parent = *parent;
                    let log = &log;
                    move |_c: Option<String>| {
                        log.borrow_mut().push(format!("children:{}", parent));
                        ready(Ok::<_, Fault>(Page::last(vec![parent])))
                    }
                },
            )
            .await;

        assert_eq!(
            *log.borrow(),
            vec![
                "parents:None".to_string(),
                "children:P1".to_string(),
                "parents:Some(\"p2\")".to_string(),
                "children:P2".to_string(),
            ]
        );
        assert_eq!(nested.flatten(), Outcome::complete(vec!["P1", "P2"]));
    }

    #[tokio::test]
    async fn test_parent_fault_keeps_visited_branches() {
        let nested = PageWalker::without_retry()
            .walk_nested(
                |c: Option<String>| {
                    ready(match c {
                        None => Ok(Page::new(vec!["P2"], Some("next".into()))),
                        Some(_) => Err(Fault::Auth("expired".into())),
                    })
                },
                children_of,
            )
            .await;

        let groups = nested.into_groups(|p| p.to_string());
        assert_eq!(groups.reason(), Some(&Fault::Auth("expired".into())));
        assert_eq!(groups.items().len(), 1);
        assert_eq!(groups.items()[0].0, "P2");
        assert!(groups.items()[0].1.is_complete());
    }

    #[tokio::test]
    async fn test_nested_with_drains_grandchildren_before_next_parent_page() {
        let log = RefCell::new(Vec::new());
        let walker = PageWalker::without_retry();
        let nested = walker
            .walk_nested_with(
                |c: Option<String>| {
                    log.borrow_mut().push(format!("outer:{:?}", c));
                    ready(Ok(match c {
                        None => Page::new(vec!["L1"], Some("n".into())),
                        Some(_) => Page::last(vec!["L2"]),
                    }))
                },
                |outer: &&'static str| {
                    let outer = *outer;
                    let log = &log;
                    async move {
                        walker
                            .walk_nested(
                                move |_c: Option<String>| {
                                    log.borrow_mut().push(format!("middle:{}", outer));
                                    ready(Ok::<_, Fault>(Page::last(vec![outer])))
                                },
                                move |middle: &&'static str| {
                                    let middle = *middle;
                                    move |_c: Option<String>| {
                                        log.borrow_mut().push(format!("inner:{}", middle));
                                        ready(Ok::<_, Fault>(Page::last(vec![middle.to_lowercase()])))
                                    }
                                },
                            )
                            .await
                            .flatten()
                    }
                },
            )
            .await;

        assert_eq!(
            *log.borrow(),
            vec![
                "outer:None".to_string(),
                "middle:L1".to_string(),
                "inner:L1".to_string(),
                "outer:Some(\"n\")".to_string(),
                "middle:L2".to_string(),
                "inner:L2".to_string(),
            ]
        );
        assert_eq!(
            nested.flatten(),
            Outcome::complete(vec!["l1".to_string(), "l2".to_string()])
        );
    }
}
