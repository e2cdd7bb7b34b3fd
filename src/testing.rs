//! In-memory oracle and topology used by the unit tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

use crate::discovery::ClusterTopology;
use crate::error::{DiscoveryError, ProbeError, CLUSTER_ACCESS, NAMESPACE_LISTING};
use crate::oracle::AuthorizationOracle;
use crate::types::Coordinate;

/// Oracle answering from fixed sets, recording every call it receives.
#[derive(Default)]
pub struct FakeOracle {
    allowed: HashSet<Coordinate>,
    failing: HashSet<Coordinate>,
    panicking: HashSet<Coordinate>,
    latency: Option<Duration>,
    calls: Mutex<Vec<Coordinate>>,
    in_flight: Mutex<Vec<Option<String>>>,
    peak: AtomicUsize,
    mixed: AtomicBool,
}

impl FakeOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(mut self, namespace: Option<String>, resource: &str, verb: &'static str) -> Self {
        self.allowed
            .insert(Coordinate::new(namespace, resource, verb));
        self
    }

    pub fn fail(mut self, namespace: Option<String>, resource: &str, verb: &'static str) -> Self {
        self.failing
            .insert(Coordinate::new(namespace, resource, verb));
        self
    }

    pub fn panic_on(
        mut self,
        namespace: Option<String>,
        resource: &str,
        verb: &'static str,
    ) -> Self {
        self.panicking
            .insert(Coordinate::new(namespace, resource, verb));
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> Vec<Coordinate> {
        self.calls.lock().unwrap().clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Whether probes for two namespaces were ever in flight together.
    pub fn saw_mixed_namespaces(&self) -> bool {
        self.mixed.load(Ordering::SeqCst)
    }
}

struct InFlight<'a> {
    oracle: &'a FakeOracle,
    namespace: Option<String>,
}

impl<'a> InFlight<'a> {
    fn enter(oracle: &'a FakeOracle, namespace: &Option<String>) -> Self {
        let mut in_flight = oracle.in_flight.lock().unwrap();
        if in_flight.iter().any(|other| other != namespace) {
            oracle.mixed.store(true, Ordering::SeqCst);
        }
        in_flight.push(namespace.clone());
        oracle.peak.fetch_max(in_flight.len(), Ordering::SeqCst);
        Self {
            oracle,
            namespace: namespace.clone(),
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.oracle.in_flight.lock().unwrap();
        if let Some(pos) = in_flight.iter().position(|ns| *ns == self.namespace) {
            in_flight.swap_remove(pos);
        }
    }
}

#[async_trait]
impl AuthorizationOracle for FakeOracle {
    async fn can_perform(&self, coordinate: &Coordinate) -> Result<bool, ProbeError> {
        self.calls.lock().unwrap().push(coordinate.clone());
        let _in_flight = InFlight::enter(self, &coordinate.namespace);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        } else {
            tokio::task::yield_now().await;
        }
        if self.panicking.contains(coordinate) {
            panic!("oracle blew up on {coordinate}");
        }
        if self.failing.contains(coordinate) {
            return Err(ProbeError::EmptyStatus);
        }
        Ok(self.allowed.contains(coordinate))
    }
}

/// Topology with canned answers. Failures are given as the message the
/// cluster would print and classified like real client errors.
pub struct FakeTopology {
    resources: Result<Vec<String>, String>,
    identity: Result<String, String>,
    current_namespace: Result<String, String>,
    namespaces: Result<Vec<String>, String>,
    namespace_listings: AtomicUsize,
}

impl Default for FakeTopology {
    fn default() -> Self {
        Self {
            resources: Ok(vec!["pods".to_string(), "secrets".to_string()]),
            identity: Ok("jane".to_string()),
            current_namespace: Ok("team-a".to_string()),
            namespaces: Ok(vec!["default".to_string(), "kube-system".to_string()]),
            namespace_listings: AtomicUsize::new(0),
        }
    }
}

impl FakeTopology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resources(mut self, resources: Result<&[&str], &str>) -> Self {
        self.resources = resources
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .map_err(str::to_string);
        self
    }

    pub fn identity(mut self, identity: Result<&str, &str>) -> Self {
        self.identity = identity.map(str::to_string).map_err(str::to_string);
        self
    }

    pub fn current_namespace(mut self, namespace: Result<&str, &str>) -> Self {
        self.current_namespace = namespace.map(str::to_string).map_err(str::to_string);
        self
    }

    pub fn namespaces(mut self, namespaces: Result<&[&str], &str>) -> Self {
        self.namespaces = namespaces
            .map(|n| n.iter().map(|s| s.to_string()).collect())
            .map_err(str::to_string);
        self
    }

    pub fn namespace_listings(&self) -> usize {
        self.namespace_listings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClusterTopology for FakeTopology {
    async fn list_resource_types(&self) -> Result<Vec<String>, DiscoveryError> {
        self.resources
            .clone()
            .map_err(|e| DiscoveryError::from_message(CLUSTER_ACCESS, e))
    }

    async fn resolve_identity(&self) -> Result<String, DiscoveryError> {
        self.identity
            .clone()
            .map_err(|e| DiscoveryError::from_message(CLUSTER_ACCESS, e))
    }

    async fn resolve_current_namespace(&self) -> Result<String, DiscoveryError> {
        self.current_namespace
            .clone()
            .map_err(|e| DiscoveryError::from_message(CLUSTER_ACCESS, e))
    }

    async fn list_namespaces(&self) -> Result<Vec<String>, DiscoveryError> {
        self.namespace_listings.fetch_add(1, Ordering::SeqCst);
        self.namespaces
            .clone()
            .map_err(|e| DiscoveryError::from_message(NAMESPACE_LISTING, e))
    }
}

/// Collects `warn` and above from the current thread into memory.
#[derive(Clone, Default)]
pub struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub fn set_default(&self) -> DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        let buf = self.buf.lock().expect("log buffer");
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.lock().expect("log buffer").extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
