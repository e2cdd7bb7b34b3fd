use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use thiserror::Error;

use crate::constants;
use crate::error::ProbeError;

/// One unit of authorization inquiry.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coordinate {
    pub namespace: Option<String>,
    pub resource: String,
    pub verb: &'static str,
}

impl Coordinate {
    pub fn new(namespace: Option<String>, resource: impl Into<String>, verb: &'static str) -> Self {
        Self {
            namespace,
            resource: resource.into(),
            verb,
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {} in {}", self.verb, self.resource, ns),
            None => write!(f, "{} {} (cluster)", self.verb, self.resource),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub allowed: bool,
    /// Set when the oracle call itself failed, as opposed to a denial.
    pub error: Option<String>,
}

impl ProbeOutcome {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            error: None,
        }
    }

    pub fn denied() -> Self {
        Self {
            allowed: false,
            error: None,
        }
    }

    pub fn failed(error: &ProbeError) -> Self {
        Self {
            allowed: false,
            error: Some(error.to_string()),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

impl From<Result<bool, ProbeError>> for ProbeOutcome {
    fn from(result: Result<bool, ProbeError>) -> Self {
        match result {
            Ok(true) => Self::allowed(),
            Ok(false) => Self::denied(),
            Err(e) => Self::failed(&e),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("no namespace to scan")]
    NoNamespaces,
    #[error("no resource types to scan")]
    NoResources,
    #[error("resource names must not be empty")]
    EmptyResourceName,
}

/// Immutable input of a scan.
#[derive(Clone, Debug)]
pub struct ScanRequest {
    namespaces: Vec<Option<String>>,
    resources: Vec<String>,
}

impl ScanRequest {
    pub fn new(
        namespaces: Vec<Option<String>>,
        resources: Vec<String>,
    ) -> Result<Self, RequestError> {
        if namespaces.is_empty() {
            return Err(RequestError::NoNamespaces);
        }
        if resources.is_empty() {
            return Err(RequestError::NoResources);
        }
        if resources.iter().any(|r| r.is_empty()) {
            return Err(RequestError::EmptyResourceName);
        }
        Ok(Self {
            namespaces,
            resources,
        })
    }

    pub fn namespaces(&self) -> &[Option<String>] {
        &self.namespaces
    }

    pub fn resources(&self) -> &[String] {
        &self.resources
    }

    /// Every coordinate of one namespace batch: resources x verbs.
    pub fn coordinates_for<'a>(
        &'a self,
        namespace: &'a Option<String>,
    ) -> impl Iterator<Item = Coordinate> + 'a {
        self.resources.iter().flat_map(move |resource| {
            constants::ALL_VERBS
                .into_iter()
                .map(move |verb| Coordinate::new(namespace.clone(), resource.as_str(), verb))
        })
    }
}

/// Allowed verbs per (namespace, resource).
///
/// Entries only come into existence through [`PermissionMatrix::grant`],
/// so a key never maps to an empty set. Both keys and verbs iterate in
/// lexicographic order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PermissionMatrix {
    entries: BTreeMap<(Option<String>, String), BTreeSet<&'static str>>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct MatrixRow<'a> {
    pub namespace: Option<&'a str>,
    pub resource: &'a str,
    pub verbs: &'a BTreeSet<&'static str>,
}

impl PermissionMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the coordinate as allowed. Returns false if it already was.
    pub fn grant(&mut self, coordinate: &Coordinate) -> bool {
        self.entries
            .entry((coordinate.namespace.clone(), coordinate.resource.clone()))
            .or_default()
            .insert(coordinate.verb)
    }

    #[cfg(test)]
    pub fn verbs(&self, namespace: Option<&str>, resource: &str) -> Option<&BTreeSet<&'static str>> {
        self.entries
            .get(&(namespace.map(str::to_string), resource.to_string()))
    }

    pub fn rows(&self) -> impl Iterator<Item = MatrixRow<'_>> {
        self.entries
            .iter()
            .map(|((namespace, resource), verbs)| MatrixRow {
                namespace: namespace.as_deref(),
                resource,
                verbs,
            })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeFailure {
    pub coordinate: Coordinate,
    pub detail: String,
}

/// Everything learned about one namespace batch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NamespaceReport {
    pub namespace: Option<String>,
    pub matrix: PermissionMatrix,
    pub probes: usize,
    pub failures: Vec<ProbeFailure>,
}
