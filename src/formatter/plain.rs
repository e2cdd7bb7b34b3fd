use std::io::{self, Write};

use crate::discovery::ResolvedScope;
use crate::types::NamespaceReport;

const NAMESPACE_WIDTH: usize = 20;
const RESOURCE_WIDTH: usize = 40;

/// Fixed-width text, one row per resource, streamed per namespace.
pub struct Plain {
    identity: String,
    scope: ResolvedScope,
}

impl Plain {
    pub fn new(identity: String, scope: ResolvedScope) -> Self {
        Self { identity, scope }
    }

    fn with_namespace_column(&self) -> bool {
        self.scope == ResolvedScope::AllNamespaces
    }

    pub fn header(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "{}", super::heading(&self.identity, &self.scope))?;
        if self.with_namespace_column() {
            writeln!(
                out,
                "{:<nw$} {:<rw$} {}",
                "NAMESPACE",
                "RESOURCE",
                "VERBS",
                nw = NAMESPACE_WIDTH,
                rw = RESOURCE_WIDTH
            )
        } else {
            writeln!(out, "{:<rw$} {}", "RESOURCE", "VERBS", rw = RESOURCE_WIDTH)
        }
    }

    pub fn namespace(&self, out: &mut dyn Write, report: &NamespaceReport) -> io::Result<()> {
        let namespace = report.namespace.as_deref().unwrap_or("");
        for row in report.matrix.rows() {
            let verbs = super::verb_list(row.verbs);
            if self.with_namespace_column() {
                writeln!(
                    out,
                    "{:<nw$} {:<rw$} {}",
                    namespace,
                    row.resource,
                    verbs,
                    nw = NAMESPACE_WIDTH,
                    rw = RESOURCE_WIDTH
                )?;
            } else {
                writeln!(out, "{:<rw$} {}", row.resource, verbs, rw = RESOURCE_WIDTH)?;
            }
        }
        Ok(())
    }
}
