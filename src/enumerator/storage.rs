//! Cloud Storage buckets and Filestore instances

use super::{not_owned, CrawlContext, ResourceEnumerator};
use crate::error::Fault;
use crate::gcp::client::GcpClient;
use crate::report::{EnumerationOutcome, KindOutcome, Outcome};
use crate::resource::{fetch_page, lister, resource_name, ListCall, Record};
use crate::resource::{EnumeratorGroup, ResourceKind};
use crate::sink::ObjectSink;
use crate::walker::{Branch, Page, PageWalker};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::sync::Arc;

/// Partial response for object listings; only these fields reach the sink
const OBJECT_FIELDS: &str = "nextPageToken,items(name,size,contentType,timeCreated)";

/// Added to each bucket record when objects were dumped
const OBJECTS_DUMPED: &str = "objectsDumped";

pub struct StorageEnumerator {
    client: GcpClient,
    walker: PageWalker,
    object_sink: Option<Arc<dyn ObjectSink>>,
}

impl StorageEnumerator {
    pub fn new(ctx: &CrawlContext) -> Self {
        Self {
            client: ctx.client.clone(),
            walker: ctx.walker,
            object_sink: ctx.object_sink.clone(),
        }
    }

    /// Buckets of the project.
    ///
    /// With an object sink configured, each bucket's objects are streamed to
    /// the sink as its page of buckets arrives. A failed object dump is
    /// logged and does not make the bucket listing partial.
    pub async fn buckets(&self) -> EnumerationOutcome {
        let call = ListCall::new(self.client.storage_url("b"), "items")
            .param("project", &self.client.project_id);

        let Some(sink) = &self.object_sink else {
            return self.walker.walk(lister(&self.client, call)).await;
        };

        let nested = self
            .walker
            .walk_nested(lister(&self.client, call), |bucket: &Record| {
                object_dumper(
                    &self.client,
                    resource_name(bucket).map(str::to_string),
                    sink.clone(),
                )
            })
            .await;

        let mut buckets = Vec::with_capacity(nested.branches.len());
        for Branch { mut parent, outcome } in nested.branches {
            let (pages, fault) = outcome.into_parts();
            let dumped: u64 = pages.iter().sum();
            if let Some(fault) = fault {
                tracing::warn!(
                    "Object dump for bucket {} stopped after {} objects: {}",
                    resource_name(&parent).unwrap_or("<unnamed>"),
                    dumped,
                    fault
                );
            }
            parent.insert(OBJECTS_DUMPED.into(), Value::from(dumped));
            buckets.push(parent);
        }

        let flush = sink.clone();
        match tokio::task::spawn_blocking(move || flush.flush()).await {
            Ok(Ok(())) => {},
            Ok(Err(e)) => tracing::warn!("Failed to flush object dump: {}", e),
            Err(e) => tracing::warn!("Object dump flush task failed: {}", e),
        }

        Outcome::from_parts(buckets, nested.parents_fault)
    }

    pub async fn filestore(&self) -> EnumerationOutcome {
        let url = self
            .client
            .project_api_url("file.googleapis.com", "v1", "locations/-/instances");
        self.walker
            .walk(lister(&self.client, ListCall::new(url, "instances")))
            .await
    }
}

/// A fetch closure that writes each page of a bucket's objects to the sink
/// and yields the number written
fn object_dumper<'a>(
    client: &'a GcpClient,
    bucket: Option<String>,
    sink: Arc<dyn ObjectSink>,
) -> impl FnMut(Option<String>) -> BoxFuture<'a, Result<Page<u64>, Fault>> + 'a {
    move |cursor| {
        let bucket = bucket.clone();
        let sink = sink.clone();
        async move {
            let bucket = bucket.ok_or_else(|| Fault::Malformed("bucket is missing `name`".into()))?;
            let call =
                ListCall::new(client.storage_objects_url(&bucket), "items").param("fields", OBJECT_FIELDS);
            let page = fetch_page(client, &call, cursor.as_deref()).await?;

            let written = page.items.len() as u64;
            write_page(sink, bucket, page.items).await?;
            Ok::<_, Fault>(Page::new(vec![written], page.next_cursor))
        }
        .boxed()
    }
}

/// Hand one page of objects to the sink off the async workers
async fn write_page(sink: Arc<dyn ObjectSink>, bucket: String, objects: Vec<Record>) -> Result<(), Fault> {
    tokio::task::spawn_blocking(move || {
        objects
            .iter()
            .try_for_each(|object| sink.write_object(&bucket, object))
    })
    .await
    .map_err(|e| Fault::Sink(format!("object writer task failed: {}", e)))?
    .map_err(|e| Fault::Sink(e.to_string()))
}

#[async_trait]
impl ResourceEnumerator for StorageEnumerator {
    fn group(&self) -> EnumeratorGroup {
        EnumeratorGroup::Storage
    }

    async fn enumerate(&self, kind: ResourceKind) -> KindOutcome {
        let outcome = match kind {
            ResourceKind::Buckets => self.buckets().await,
            ResourceKind::Filestore => self.filestore().await,
            other => return not_owned(self.group(), other),
        };
        KindOutcome::Records(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::into_record;
    use serde_json::json;
    use std::sync::Mutex;

    /// Accepts `limit` objects, then refuses
    struct LimitedSink {
        limit: usize,
        written: Mutex<Vec<String>>,
    }

    impl ObjectSink for LimitedSink {
        fn write_object(&self, bucket: &str, object: &Record) -> anyhow::Result<()> {
            let mut written = self.written.lock().unwrap();
            if written.len() == self.limit {
                anyhow::bail!("disk full");
            }
            written.push(format!("{}/{}", bucket, resource_name(object).unwrap_or("?")));
            Ok(())
        }
    }

    fn objects(names: &[&str]) -> Vec<Record> {
        names
            .iter()
            .map(|name| into_record(json!({"name": name})).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_write_page_hands_objects_to_sink_in_order() {
        let sink = Arc::new(LimitedSink {
            limit: 10,
            written: Mutex::new(Vec::new()),
        });
        write_page(sink.clone(), "logs".into(), objects(&["a", "b"]))
            .await
            .unwrap();
        assert_eq!(*sink.written.lock().unwrap(), vec!["logs/a", "logs/b"]);
    }

    #[tokio::test]
    async fn test_write_page_failure_is_a_sink_fault() {
        let sink = Arc::new(LimitedSink {
            limit: 1,
            written: Mutex::new(Vec::new()),
        });
        let result = write_page(sink.clone(), "logs".into(), objects(&["a", "b", "c"])).await;
        assert!(matches!(result, Err(Fault::Sink(msg)) if msg.contains("disk full")));
        assert_eq!(sink.written.lock().unwrap().len(), 1);
    }
}
