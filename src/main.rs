//! Lists what an identity may do in a Kubernetes cluster by asking the API
//! server about every verb on every resource type.
//!
//! # Environment Variables
//!
//! - `KAN_I_TOKEN`: bearer token, same as `--token`
//! - `KAN_I_CONCURRENCY`: probes in flight, same as `--concurrency`
//! - `KAN_I_PROBE_TIMEOUT`: seconds per probe, same as `--probe-timeout`
//! - `RUST_LOG`: log filter, overrides `--verbose`

mod aggregator;
mod client;
mod config;
mod constants;
mod discovery;
mod error;
mod formatter;
mod oracle;
mod scheduler;
#[cfg(test)]
mod testing;
mod types;

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use config::{Config, OutputFormat, Scope};
use discovery::{ClusterTopology, KubeTopology};
use formatter::Formatter;
use oracle::KubeOracle;
use scheduler::ProbeScheduler;
use types::NamespaceReport;

/// Check which verbs you may use on every resource type of the cluster.
#[derive(Parser, Debug)]
#[command(name = "kan-i")]
#[command(version, about, long_about = None)]
struct Args {
    /// Bearer token for authentication to the API server
    #[arg(long, env = "KAN_I_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// List permissions for a specific namespace
    #[arg(short, long, conflicts_with_all = ["all_namespaces", "cluster_scoped"])]
    namespace: Option<String>,

    /// List permissions across all namespaces
    #[arg(short = 'A', long, conflicts_with = "cluster_scoped")]
    all_namespaces: bool,

    /// List permissions outside of any namespace
    #[arg(long)]
    cluster_scoped: bool,

    /// Username to impersonate
    #[arg(long = "as", value_name = "USER")]
    impersonate: Option<String>,

    /// Maximum number of probes in flight
    #[arg(
        long,
        env = "KAN_I_CONCURRENCY",
        default_value_t = constants::DEFAULT_CONCURRENCY,
        value_parser = parse_concurrency
    )]
    concurrency: usize,

    /// Give up on a single probe after this many seconds
    #[arg(
        long,
        env = "KAN_I_PROBE_TIMEOUT",
        value_name = "SECONDS",
        value_parser = parse_probe_timeout
    )]
    probe_timeout: Option<u64>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Plain)]
    output: OutputFormat,

    /// Log every failed probe
    #[arg(short, long)]
    verbose: bool,
}

fn parse_concurrency(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

fn parse_probe_timeout(value: &str) -> Result<u64, String> {
    match value.parse::<u64>() {
        Ok(0) => Err("must be at least 1 second".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        let scope = if args.all_namespaces {
            Scope::AllNamespaces
        } else if args.cluster_scoped {
            Scope::Cluster
        } else if let Some(namespace) = args.namespace {
            Scope::Namespace(namespace)
        } else {
            Scope::Current
        };
        Config {
            scope,
            token: args.token,
            impersonate: args.impersonate,
            concurrency: args.concurrency,
            probe_timeout: args.probe_timeout.map(Duration::from_secs),
            output: args.output,
            verbose: args.verbose,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "warn,kan_i=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);
    let config = Config::from(args);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<()> {
    let (client, default_namespace) = client::connect(&config).await?;
    let topology = KubeTopology::new(client.clone(), default_namespace);
    let scheduler = ProbeScheduler::new(Arc::new(KubeOracle::new(client)))
        .with_concurrency(config.concurrency)
        .with_probe_timeout(config.probe_timeout);

    let mut out = io::stdout();
    scan_and_render(&topology, &scheduler, &config, &mut out).await
}

/// Preflight, probe every namespace and render the results to `out`.
///
/// Nothing is probed when preflight fails.
async fn scan_and_render(
    topology: &dyn ClusterTopology,
    scheduler: &ProbeScheduler,
    config: &Config,
    out: &mut dyn Write,
) -> Result<()> {
    let preflight = discovery::preflight(topology, &config.scope)
        .await
        .map_err(|e| {
            debug!(detail = e.detail(), "preflight failed");
            e
        })?;

    let mut formatter = Formatter::new(config.output, &preflight);
    formatter.header(out)?;
    scheduler
        .scan(&preflight.request, |report| {
            log_failures(&report, config.verbose);
            formatter.namespace(out, &report)
        })
        .await?;
    formatter.finish(out)?;
    out.flush()?;
    Ok(())
}

fn log_failures(report: &NamespaceReport, verbose: bool) {
    if !verbose {
        return;
    }
    for failure in &report.failures {
        warn!(coordinate = %failure.coordinate, error = %failure.detail, "probe failed");
    }
}
