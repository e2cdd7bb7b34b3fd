use std::collections::BTreeSet;
use std::io::{self, Write};

use crate::config::OutputFormat;
use crate::discovery::{Preflight, ResolvedScope};
use crate::types::NamespaceReport;

mod json;
mod plain;
mod pretty;

/// Renders namespace reports as they come out of the scheduler.
///
/// Plain output is written as each namespace completes; the other formats
/// buffer rows and write everything in [Formatter::finish].
pub enum Formatter {
    Plain(plain::Plain),
    Pretty(pretty::Pretty),
    Json(json::Json),
}

impl Formatter {
    pub fn new(format: OutputFormat, preflight: &Preflight) -> Self {
        let identity = preflight.identity.clone();
        let scope = preflight.scope.clone();
        match format {
            OutputFormat::Plain => Formatter::Plain(plain::Plain::new(identity, scope)),
            OutputFormat::Pretty => Formatter::Pretty(pretty::Pretty::new(identity, scope)),
            OutputFormat::Json => Formatter::Json(json::Json::new(identity, scope)),
        }
    }

    pub fn header(&mut self, out: &mut dyn Write) -> io::Result<()> {
        match self {
            Formatter::Plain(p) => p.header(out),
            Formatter::Pretty(_) | Formatter::Json(_) => Ok(()),
        }
    }

    pub fn namespace(&mut self, out: &mut dyn Write, report: &NamespaceReport) -> io::Result<()> {
        match self {
            Formatter::Plain(p) => p.namespace(out, report),
            Formatter::Pretty(p) => {
                p.push(report);
                Ok(())
            }
            Formatter::Json(j) => {
                j.push(report);
                Ok(())
            }
        }
    }

    pub fn finish(&mut self, out: &mut dyn Write) -> io::Result<()> {
        match self {
            Formatter::Plain(_) => Ok(()),
            Formatter::Pretty(p) => writeln!(out, "{}", p),
            Formatter::Json(j) => j.write(out),
        }
    }
}

/// First line of the human readable formats.
fn heading(identity: &str, scope: &ResolvedScope) -> String {
    let place = match scope {
        ResolvedScope::Namespace(ns) => format!("in the {} namespace", ns),
        ResolvedScope::AllNamespaces => "across all namespaces".to_string(),
        ResolvedScope::Cluster => "at cluster scope".to_string(),
    };
    format!(
        "The {} user has the following permissions {}:",
        identity, place
    )
}

fn verb_list(verbs: &BTreeSet<&'static str>) -> String {
    format!("[{}]", verbs.iter().copied().collect::<Vec<_>>().join(", "))
}
