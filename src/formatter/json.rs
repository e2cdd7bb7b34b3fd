use std::io::{self, Write};

use serde::Serialize;

use crate::discovery::ResolvedScope;
use crate::types::NamespaceReport;

pub struct Json {
    result: JsonFullResult,
}

#[derive(Serialize)]
struct JsonResourceResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
    resource: String,
    verbs: Vec<&'static str>,
}

#[derive(Serialize)]
struct JsonFullResult {
    identity: String,
    scope: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
    items: Vec<JsonResourceResult>,
    /// Probes that errored and were reported as denied.
    failed_probes: usize,
}

fn resource_results(report: &NamespaceReport) -> impl Iterator<Item = JsonResourceResult> + '_ {
    report.matrix.rows().map(|row| JsonResourceResult {
        namespace: row.namespace.map(str::to_string),
        resource: row.resource.to_string(),
        verbs: row.verbs.iter().copied().collect(),
    })
}

impl Json {
    pub fn new(identity: String, scope: ResolvedScope) -> Self {
        let (scope, namespace) = match scope {
            ResolvedScope::Namespace(ns) => ("namespace", Some(ns)),
            ResolvedScope::AllNamespaces => ("all-namespaces", None),
            ResolvedScope::Cluster => ("cluster", None),
        };
        Self {
            result: JsonFullResult {
                identity,
                scope,
                namespace,
                items: Vec::new(),
                failed_probes: 0,
            },
        }
    }

    pub fn push(&mut self, report: &NamespaceReport) {
        self.result.items.extend(resource_results(report));
        self.result.failed_probes += report.failures.len();
    }

    pub fn write(&self, out: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer(&mut *out, &self.result)?;
        writeln!(out)
    }
}
