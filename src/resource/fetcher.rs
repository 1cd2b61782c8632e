//! Resource Fetcher
//!
//! The paged-fetch capability the walkers drive: one GET, one page of
//! records, one continuation token.

use super::record::{into_record, Record};
use crate::error::Fault;
use crate::gcp::client::GcpClient;
use crate::walker::{Page, Scoped};
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;

/// Field carrying the continuation token in every Google list response
const NEXT_PAGE_TOKEN: &str = "nextPageToken";

/// Query parameter the token goes back in
const PAGE_TOKEN_PARAM: &str = "pageToken";

/// Aggregated responses carry this alongside the item list for empty scopes
const WARNING_FIELD: &str = "warning";

/// A list request: URL, fixed query parameters, and where the items live
#[derive(Debug, Clone)]
pub struct ListCall {
    pub url: String,
    pub query: Vec<(String, String)>,
    /// Response field holding the item array (`items`, `instances`, ...).
    /// For aggregated calls, the field inside each scope.
    pub items_field: &'static str,
}

impl ListCall {
    pub fn new(url: impl Into<String>, items_field: &'static str) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
            items_field,
        }
    }

    pub fn param(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Full URL for the page at `cursor`
    pub fn url_for(&self, cursor: Option<&str>) -> String {
        let mut params: Vec<(&str, &str)> = self
            .query
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        if let Some(token) = cursor {
            params.push((PAGE_TOKEN_PARAM, token));
        }
        add_query_params(&self.url, &params)
    }
}

/// Fetch one page of a plain list
pub async fn fetch_page(
    client: &GcpClient,
    call: &ListCall,
    cursor: Option<&str>,
) -> Result<Page<Record>, Fault> {
    let response = client.get(&call.url_for(cursor)).await?;
    let items = extract_items(&response, call.items_field)?;
    Ok(Page::new(items, next_cursor(&response)))
}

/// Fetch one page of an aggregated (scope-keyed) list
pub async fn fetch_scoped_page(
    client: &GcpClient,
    call: &ListCall,
    cursor: Option<&str>,
) -> Result<Page<Scoped<Record>>, Fault> {
    let response = client.get(&call.url_for(cursor)).await?;
    let scopes = extract_scopes(&response, call.items_field)?;
    Ok(Page::new(scopes, next_cursor(&response)))
}

/// A fetch closure over a plain list, ready for [`PageWalker::walk`](crate::walker::PageWalker::walk)
pub fn lister<'a>(
    client: &'a GcpClient,
    call: ListCall,
) -> impl FnMut(Option<String>) -> BoxFuture<'a, Result<Page<Record>, Fault>> + 'a {
    move |cursor| {
        let call = call.clone();
        async move { fetch_page(client, &call, cursor.as_deref()).await }.boxed()
    }
}

/// A fetch closure for a child listing whose request depends on a parent field.
///
/// When the parent lacked the field, every page fails with that fault, so
/// the branch ends without touching the network.
pub fn child_lister<'a>(
    client: &'a GcpClient,
    call: Result<ListCall, Fault>,
) -> impl FnMut(Option<String>) -> BoxFuture<'a, Result<Page<Record>, Fault>> + 'a {
    move |cursor| {
        let call = call.clone();
        async move {
            let call = call?;
            fetch_page(client, &call, cursor.as_deref()).await
        }
        .boxed()
    }
}

/// A fetch closure over an aggregated list
pub fn scoped_lister<'a>(
    client: &'a GcpClient,
    call: ListCall,
) -> impl FnMut(Option<String>) -> BoxFuture<'a, Result<Page<Scoped<Record>>, Fault>> + 'a {
    move |cursor| {
        let call = call.clone();
        async move { fetch_scoped_page(client, &call, cursor.as_deref()).await }.boxed()
    }
}

/// Continuation token, absent when missing or empty
pub fn next_cursor(response: &Value) -> Option<String> {
    response
        .get(NEXT_PAGE_TOKEN)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Items of a plain list page. A missing field is an empty page.
pub fn extract_items(response: &Value, field: &str) -> Result<Vec<Record>, Fault> {
    match response.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(arr)) => records_of(arr),
        Some(_) => Err(Fault::Malformed(format!("`{}` is not an array", field))),
    }
}

fn records_of(values: &[Value]) -> Result<Vec<Record>, Fault> {
    values.iter().cloned().map(into_record).collect()
}

/// Scopes of an aggregated page, in response order.
///
/// `{ "items": { "zones/a": { "instances": [...] }, "zones/b": { "warning": {...} } } }`
/// yields one [`Scoped`] per key; a scope without the field has no items.
pub fn extract_scopes(response: &Value, field: &str) -> Result<Vec<Scoped<Record>>, Fault> {
    let scopes = match response.get("items") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Object(map)) => map,
        Some(_) => return Err(Fault::Malformed("aggregated `items` is not an object".into())),
    };

    let mut result = Vec::with_capacity(scopes.len());
    for (scope, scoped_list) in scopes {
        let items = match scoped_list.get(field) {
            Some(Value::Array(arr)) => records_of(arr)?,
            None | Some(Value::Null) => {
                if let Some(warning) = scoped_list.get(WARNING_FIELD) {
                    tracing::trace!("Scope {} has no {}: {}", scope, field, warning);
                }
                Vec::new()
            },
            Some(_) => {
                return Err(Fault::Malformed(format!(
                    "`{}` in scope {} is not an array",
                    field, scope
                )))
            },
        };
        result.push(Scoped::new(scope.clone(), items));
    }
    Ok(result)
}

/// Append query parameters to a URL, percent-encoding values
fn add_query_params(url: &str, params: &[(&str, &str)]) -> String {
    if params.is_empty() {
        return url.to_string();
    }

    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    if url.contains('?') {
        format!("{}&{}", url, query)
    } else {
        format!("{}?{}", url, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_url_for_appends_page_token() {
        let call = ListCall::new("https://x/services", "services")
            .param("filter", "state:ENABLED")
            .param("pageSize", "200");
        assert_eq!(
            call.url_for(None),
            "https://x/services?filter=state%3AENABLED&pageSize=200"
        );
        assert_eq!(
            call.url_for(Some("abc/=")),
            "https://x/services?filter=state%3AENABLED&pageSize=200&pageToken=abc%2F%3D"
        );
    }

    #[test]
    fn test_url_for_existing_query() {
        let call = ListCall::new("https://x/b?project=p", "items");
        assert_eq!(call.url_for(Some("t")), "https://x/b?project=p&pageToken=t");
    }

    #[test]
    fn test_extract_items_missing_field_is_empty() {
        assert!(extract_items(&json!({"kind": "compute#imageList"}), "items")
            .unwrap()
            .is_empty());
        assert!(extract_items(&json!({"items": "nope"}), "items").is_err());
    }

    #[test]
    fn test_next_cursor_ignores_empty() {
        assert_eq!(next_cursor(&json!({"nextPageToken": ""})), None);
        assert_eq!(
            next_cursor(&json!({"nextPageToken": "t2"})),
            Some("t2".to_string())
        );
    }

    #[test]
    fn test_extract_scopes_keeps_order_and_empty_scopes() {
        let response = json!({
            "items": {
                "zones/us-central1-a": {"instances": [{"name": "vm-1"}]},
                "zones/us-central1-b": {"warning": {"code": "NO_RESULTS_ON_PAGE"}},
                "zones/europe-west1-b": {"instances": [{"name": "vm-2"}, {"name": "vm-3"}]}
            }
        });

        let scopes = extract_scopes(&response, "instances").unwrap();
        let summary: Vec<(&str, usize)> = scopes
            .iter()
            .map(|s| (s.scope.as_str(), s.items.len()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("zones/us-central1-a", 1),
                ("zones/us-central1-b", 0),
                ("zones/europe-west1-b", 2)
            ]
        );
    }

    #[test]
    fn test_extract_scopes_without_items_is_empty_page() {
        assert!(extract_scopes(&json!({"kind": "compute#instanceAggregatedList"}), "instances")
            .unwrap()
            .is_empty());
    }
}
