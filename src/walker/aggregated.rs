//! Aggregated listings
//!
//! Compute Engine `aggregatedList` endpoints return one sub-list per zone or
//! region: `{ "items": { "zones/us-central1-a": { "instances": [...] }, ... } }`.

use super::{Page, PageWalker};
use crate::error::Fault;
use crate::report::Outcome;
use crate::resource::{scoped_record, Record};
use std::future::Future;

/// The items one scope (zone, region, `global`) contributed to a page
#[derive(Debug, Clone, PartialEq)]
pub struct Scoped<T> {
    pub scope: String,
    pub items: Vec<T>,
}

impl<T> Scoped<T> {
    pub fn new(scope: impl Into<String>, items: Vec<T>) -> Self {
        Self {
            scope: scope.into(),
            items,
        }
    }
}

/// Whether flattened items remember which scope they came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeMode {
    /// Bare items
    Drop,
    /// Each item wrapped as `{ scope: item }`
    Keep,
}

/// Flatten scopes in encounter order, then items in order within each scope
pub fn flatten_scopes(scopes: Vec<Scoped<Record>>, mode: ScopeMode) -> Vec<Record> {
    let mut flat = Vec::new();
    for Scoped { scope, items } in scopes {
        match mode {
            ScopeMode::Drop => flat.extend(items),
            ScopeMode::Keep => flat.extend(items.into_iter().map(|item| scoped_record(&scope, item))),
        }
    }
    flat
}

impl PageWalker {
    /// Walk a scope-keyed listing and flatten every scope of every page.
    ///
    /// A page with no scopes, or a scope with no items, contributes nothing.
    pub async fn walk_aggregated<F, Fut>(&self, mut fetch: F, mode: ScopeMode) -> Outcome<Vec<Record>>
    where
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = Result<Page<Scoped<Record>>, Fault>>,
    {
        self.walk(|cursor| {
            let page = fetch(cursor);
            async move {
                page.await
                    .map(|page| Page::new(flatten_scopes(page.items, mode), page.next_cursor))
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(id: &str) -> Record {
        let mut r = Record::new();
        r.insert("id".into(), json!(id));
        r
    }

    #[tokio::test]
    async fn test_flattens_scope_then_item_order() {
        let outcome = PageWalker::without_retry()
            .walk_aggregated(
                |_| {
                    std::future::ready(Ok(Page::last(vec![
                        Scoped::new("zoneA", vec![rec("i1")]),
                        Scoped::new("zoneB", vec![]),
                        Scoped::new("zoneC", vec![rec("i2"), rec("i3")]),
                    ])))
                },
                ScopeMode::Drop,
            )
            .await;

        assert_eq!(outcome, Outcome::complete(vec![rec("i1"), rec("i2"), rec("i3")]));
    }

    #[tokio::test]
    async fn test_keep_mode_wraps_items_with_scope() {
        let outcome = PageWalker::without_retry()
            .walk_aggregated(
                |_| {
                    std::future::ready(Ok(Page::last(vec![Scoped::new(
                        "regions/us-east1",
                        vec![rec("ip1"), rec("ip2")],
                    )])))
                },
                ScopeMode::Keep,
            )
            .await;

        let items = outcome.into_items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["regions/us-east1"]["id"], "ip1");
        assert_eq!(items[1]["regions/us-east1"]["id"], "ip2");
    }

    #[tokio::test]
    async fn test_every_page_contributes_and_empty_pages_are_valid() {
        let outcome = PageWalker::without_retry()
            .walk_aggregated(
                |cursor: Option<String>| {
                    std::future::ready(Ok(match cursor.as_deref() {
                        None => Page::new(vec![Scoped::new("zoneA", vec![rec("a")])], Some("2".into())),
                        Some("2") => Page::new(vec![], Some("3".into())),
                        _ => Page::last(vec![Scoped::new("zoneA", vec![rec("b")])]),
                    }))
                },
                ScopeMode::Drop,
            )
            .await;

        assert_eq!(outcome, Outcome::complete(vec![rec("a"), rec("b")]));
    }
}
