use std::time::Duration;

use clap::ValueEnum;

/// Which namespaces a scan covers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    /// The namespace of the active kubeconfig context.
    Current,
    Namespace(String),
    AllNamespaces,
    /// Probes carry no namespace at all.
    Cluster,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Plain,
    Pretty,
    Json,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub scope: Scope,
    pub token: Option<String>,
    pub impersonate: Option<String>,
    pub concurrency: usize,
    pub probe_timeout: Option<Duration>,
    pub output: OutputFormat,
    pub verbose: bool,
}
