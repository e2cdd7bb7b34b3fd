//! Bounded fan-out of authorization probes.
//!
//! Each namespace is one batch: every (resource, verb) coordinate of the
//! namespace is spawned on a [JoinSet], at most `concurrency` at a time, and
//! the outcomes are funneled through a channel into a single
//! [ResultAggregator]. The next namespace does not start until the current
//! one has been drained and folded.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::aggregator::ResultAggregator;
use crate::constants;
use crate::error::ProbeError;
use crate::oracle::AuthorizationOracle;
use crate::types::{Coordinate, NamespaceReport, ProbeOutcome, ScanRequest};

pub struct ProbeScheduler {
    oracle: Arc<dyn AuthorizationOracle>,
    concurrency: usize,
    probe_timeout: Option<Duration>,
}

impl ProbeScheduler {
    pub fn new(oracle: Arc<dyn AuthorizationOracle>) -> Self {
        Self {
            oracle,
            concurrency: constants::DEFAULT_CONCURRENCY,
            probe_timeout: None,
        }
    }

    /// Maximum probes in flight. Values below one are raised to one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_probe_timeout(mut self, probe_timeout: Option<Duration>) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }

    /// Scan every namespace of `request` in order, handing each finished
    /// batch to `emit` before the next one starts.
    pub async fn scan<F, E>(&self, request: &ScanRequest, mut emit: F) -> Result<(), E>
    where
        F: FnMut(NamespaceReport) -> Result<(), E>,
    {
        let mut aggregator = ResultAggregator::new(None);
        for namespace in request.namespaces() {
            aggregator.begin(namespace.clone());
            let report = self.scan_namespace(request, namespace, &mut aggregator).await;
            emit(report)?;
        }
        Ok(())
    }

    async fn scan_namespace(
        &self,
        request: &ScanRequest,
        namespace: &Option<String>,
        aggregator: &mut ResultAggregator,
    ) -> NamespaceReport {
        info!(namespace = ?namespace, resources = request.resources().len(), "scanning namespace");
        let (tx, rx) = mpsc::channel(self.concurrency);
        let dispatch = self.dispatch(request.coordinates_for(namespace), tx);
        let (dispatched, report) = tokio::join!(dispatch, aggregator.consume(rx));

        if report.probes != dispatched {
            warn!(
                namespace = ?namespace,
                dispatched,
                folded = report.probes,
                "some probes never reported back, treating them as denied"
            );
        }
        if report.matrix.is_empty() {
            debug!(namespace = ?namespace, "namespace drained, nothing allowed");
        } else {
            debug!(namespace = ?namespace, granted = report.matrix.len(), "namespace drained");
        }
        if !report.failures.is_empty() {
            warn!(
                namespace = ?namespace,
                failed = report.failures.len(),
                "some probes failed and were counted as denied"
            );
        }
        report
    }

    /// Spawn one task per coordinate, never more than `concurrency` alive at
    /// once. Returns the number of probes dispatched.
    async fn dispatch(
        &self,
        coordinates: impl Iterator<Item = Coordinate>,
        completions: mpsc::Sender<(Coordinate, ProbeOutcome)>,
    ) -> usize {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut dispatched = 0;

        for coordinate in coordinates {
            // The semaphore is never closed.
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            let oracle = Arc::clone(&self.oracle);
            let completions = completions.clone();
            let probe_timeout = self.probe_timeout;
            tasks.spawn(async move {
                let result = probe(oracle.as_ref(), &coordinate, probe_timeout).await;
                // Hold the permit until the aggregator has the outcome.
                if completions
                    .send((coordinate, ProbeOutcome::from(result)))
                    .await
                    .is_err()
                {
                    debug!("aggregator gone, dropping probe outcome");
                }
                drop(permit);
            });
            dispatched += 1;
        }
        drop(completions);

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "probe task did not complete");
            }
        }
        dispatched
    }
}

/// Ask the oracle once. Timeouts and panics become errors.
async fn probe(
    oracle: &dyn AuthorizationOracle,
    coordinate: &Coordinate,
    probe_timeout: Option<Duration>,
) -> Result<bool, ProbeError> {
    let call = AssertUnwindSafe(oracle.can_perform(coordinate)).catch_unwind();
    let answered = match probe_timeout {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| ProbeError::Timeout(limit))?,
        None => call.await,
    };
    answered.unwrap_or(Err(ProbeError::Panicked))
}
