//! Crawl Orchestrator
//!
//! Builds one enumerator per enabled group and runs the groups as
//! concurrent tasks. Each task sends `(kind, outcome)` pairs back over a
//! channel as kinds finish; the orchestrator waits for every task, the
//! deadline, or a shutdown signal, whichever comes first.
//!
//! Nothing here returns an error. Construction faults, panics, and the
//! deadline all become per-kind faults in the report.

use crate::config::{enabled_groups, CrawlConfig};
use crate::enumerator::{
    CrawlContext, EnumeratorFactory, GcpEnumeratorFactory, ResourceEnumerator,
};
use crate::error::Fault;
use crate::gcp::auth::GcpCredentials;
use crate::gcp::client::GcpClient;
use crate::report::{CrawlReport, KindOutcome};
use crate::resource::{EnumeratorGroup, ResourceKind};
use crate::sink::ObjectSink;
use crate::walker::{PageWalker, RetryPolicy};
use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Tunables for one crawl
#[derive(Clone, Default)]
pub struct CrawlOptions {
    pub retry: RetryPolicy,
    /// Overall deadline; kinds unfinished at the deadline are reported as cancelled
    pub timeout: Option<Duration>,
    pub object_sink: Option<Arc<dyn ObjectSink>>,
    /// Base URL replacing `https://` for every API host
    pub endpoint: Option<String>,
}

impl CrawlOptions {
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_object_sink(mut self, sink: Arc<dyn ObjectSink>) -> Self {
        self.object_sink = Some(sink);
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

/// Runs enabled enumerator groups concurrently and assembles the report
pub struct CrawlOrchestrator {
    factory: Arc<dyn EnumeratorFactory>,
    options: CrawlOptions,
}

impl CrawlOrchestrator {
    pub fn new(options: CrawlOptions) -> Self {
        Self::with_factory(Arc::new(GcpEnumeratorFactory), options)
    }

    pub fn with_factory(factory: Arc<dyn EnumeratorFactory>, options: CrawlOptions) -> Self {
        Self { factory, options }
    }

    pub async fn run(&self, config: Option<&CrawlConfig>, client: &GcpClient) -> CrawlReport {
        self.run_until(config, client, std::future::pending()).await
    }

    /// Like [`run`](Self::run), but stops early when `shutdown` completes.
    /// Kinds that finished before the signal keep their outcomes.
    pub async fn run_until(
        &self,
        config: Option<&CrawlConfig>,
        client: &GcpClient,
        shutdown: impl Future<Output = ()>,
    ) -> CrawlReport {
        let started_at = Utc::now();
        let groups = enabled_groups(config);
        tracing::info!(
            "Crawling {} with {} enumerator groups",
            client.project_id,
            groups.len()
        );

        let mut ctx = CrawlContext::new(client.clone(), PageWalker::new(self.options.retry));
        if let Some(sink) = &self.options.object_sink {
            ctx = ctx.with_object_sink(sink.clone());
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tasks = JoinSet::new();
        let mut outcomes: HashMap<ResourceKind, KindOutcome> = HashMap::new();

        for group in &groups {
            match self.factory.build(*group, &ctx) {
                Ok(enumerator) => {
                    tasks.spawn(run_group(enumerator, tx.clone()));
                },
                Err(fault) => {
                    tracing::warn!("Failed to build {} enumerator: {}", group, fault);
                    for kind in group.kinds() {
                        outcomes.insert(*kind, KindOutcome::failed(*kind, fault.clone()));
                    }
                },
            }
        }
        // Tasks hold the only senders now, so the channel closes when the last one ends
        drop(tx);

        let deadline = async {
            match self.options.timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };

        let drained = {
            let collect = async {
                while let Some((kind, outcome)) = rx.recv().await {
                    outcomes.insert(kind, outcome);
                }
            };
            tokio::select! {
                _ = collect => true,
                _ = deadline => {
                    tracing::warn!("Crawl deadline reached, cancelling remaining enumerators");
                    false
                },
                _ = shutdown => {
                    tracing::warn!("Crawl interrupted, cancelling remaining enumerators");
                    false
                },
            }
        };

        if !drained {
            tasks.abort_all();
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    tracing::error!("Enumerator task panicked: {}", e);
                }
            }
        }
        // Outcomes sent between the deadline and the abort still count
        while let Ok((kind, outcome)) = rx.try_recv() {
            outcomes.entry(kind).or_insert(outcome);
        }

        let resources = assemble(&groups, outcomes, drained);
        let report = CrawlReport::new(&client.project_id, started_at, resources);
        tracing::info!(
            "Crawl {} finished: {} kinds, {} partial",
            report.crawl_id(),
            report.len(),
            report.partial_count()
        );
        report
    }
}

/// Enumerate every kind of one group in order, reporting each as it finishes
async fn run_group(
    enumerator: Box<dyn ResourceEnumerator>,
    tx: mpsc::UnboundedSender<(ResourceKind, KindOutcome)>,
) {
    let group = enumerator.group();
    for kind in group.kinds() {
        tracing::info!("Enumerating {}", kind);
        let outcome = enumerator.enumerate(*kind).await;
        match outcome.reason() {
            None => tracing::info!("Found {} {}", outcome.len(), kind),
            Some(fault) => tracing::warn!("{} incomplete after {} entries: {}", kind, outcome.len(), fault),
        }
        if tx.send((*kind, outcome)).is_err() {
            break;
        }
    }
}

/// One entry per kind of every enabled group, in start order
fn assemble(
    groups: &[EnumeratorGroup],
    mut outcomes: HashMap<ResourceKind, KindOutcome>,
    drained: bool,
) -> Vec<(ResourceKind, KindOutcome)> {
    groups
        .iter()
        .flat_map(|group| group.kinds().iter().copied())
        .map(|kind| {
            let outcome = outcomes.remove(&kind).unwrap_or_else(|| {
                let fault = if drained {
                    Fault::Setup("enumerator stopped before reporting".into())
                } else {
                    Fault::Cancelled("crawl stopped before this kind finished".into())
                };
                KindOutcome::failed(kind, fault)
            });
            (kind, outcome)
        })
        .collect()
}

/// Crawl `project` with `credentials`; the library entry point.
///
/// A client that cannot be built (bad endpoint, TLS setup) fails every
/// enabled kind with a setup fault rather than returning an error.
pub async fn run_crawl(
    config: Option<&CrawlConfig>,
    project: &str,
    credentials: GcpCredentials,
    options: CrawlOptions,
) -> CrawlReport {
    let client = GcpClient::with_credentials(project, credentials).and_then(|client| {
        match &options.endpoint {
            Some(endpoint) => client.with_endpoint(endpoint),
            None => Ok(client),
        }
    });

    match client {
        Ok(client) => CrawlOrchestrator::new(options).run(config, &client).await,
        Err(e) => {
            tracing::error!("Failed to create GCP client: {:#}", e);
            let fault = Fault::Setup(format!("{:#}", e));
            let resources = enabled_groups(config)
                .iter()
                .flat_map(|group| group.kinds().iter().copied())
                .map(|kind| (kind, KindOutcome::failed(kind, fault.clone())))
                .collect();
            CrawlReport::new(project, Utc::now(), resources)
        },
    }
}
