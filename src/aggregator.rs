//! Folds probe completions into a [`PermissionMatrix`], one namespace at a
//! time.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::types::{Coordinate, NamespaceReport, PermissionMatrix, ProbeFailure, ProbeOutcome};

/// Single consumer of probe completions for the current namespace batch.
#[derive(Debug)]
pub struct ResultAggregator {
    namespace: Option<String>,
    outcomes: HashMap<Coordinate, ProbeOutcome>,
}

impl ResultAggregator {
    pub fn new(namespace: Option<String>) -> Self {
        Self {
            namespace,
            outcomes: HashMap::new(),
        }
    }

    /// Point the aggregator at the next namespace, dropping anything left
    /// over from the previous one.
    pub fn begin(&mut self, namespace: Option<String>) {
        self.namespace = namespace;
        self.outcomes.clear();
    }

    /// Record one completion. Returns false when the coordinate belongs to
    /// another namespace and was ignored.
    ///
    /// A coordinate seen twice keeps a single entry; once any of its
    /// outcomes is not allowed it stays not allowed, and a recorded failure
    /// is not overwritten by a plain denial.
    pub fn fold(&mut self, coordinate: Coordinate, outcome: ProbeOutcome) -> bool {
        if coordinate.namespace != self.namespace {
            warn!(
                %coordinate,
                current = ?self.namespace,
                "dropping probe result for another namespace"
            );
            return false;
        }
        if let Some(error) = &outcome.error {
            debug!(%coordinate, %error, "probe failed, counting as denied");
        }
        match self.outcomes.entry(coordinate) {
            Entry::Vacant(slot) => {
                slot.insert(outcome);
            }
            Entry::Occupied(mut slot) => {
                if !outcome.allowed && (slot.get().allowed || outcome.is_failure()) {
                    slot.insert(outcome);
                }
            }
        }
        true
    }

    /// Fold everything arriving on `completions` until every sender is gone,
    /// then close the batch.
    pub async fn consume(
        &mut self,
        mut completions: mpsc::Receiver<(Coordinate, ProbeOutcome)>,
    ) -> NamespaceReport {
        while let Some((coordinate, outcome)) = completions.recv().await {
            self.fold(coordinate, outcome);
        }
        self.finish()
    }

    /// Build the report for the current namespace and reset the working set.
    pub fn finish(&mut self) -> NamespaceReport {
        let probes = self.outcomes.len();
        let mut matrix = PermissionMatrix::new();
        let mut failures = Vec::new();
        for (coordinate, outcome) in self.outcomes.drain() {
            if outcome.allowed {
                matrix.grant(&coordinate);
            } else if let Some(detail) = outcome.error {
                failures.push(ProbeFailure { coordinate, detail });
            }
        }
        failures.sort_by(|a, b| a.coordinate.cmp(&b.coordinate));

        NamespaceReport {
            namespace: self.namespace.clone(),
            matrix,
            probes,
            failures,
        }
    }
}
