//! Control-plane provisioning CLI.
//!
//! One process per pipeline invocation: parse arguments, build the HTTP
//! gateway, run the selected pipeline, exit non-zero on any fatal error.
//! Reruns are safe; the pipelines replace what a previous run left behind.
use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

mod cli;
mod engine;
mod http_plane;
mod pipelines;
mod plane;

use cli::{BotArgs, Command, DashboardArgs, RootArgs};
use engine::{PollPolicy, RetryPolicy};
use http_plane::HttpControlPlane;
use pipelines::dashboard::DashboardSpec;

fn main() -> Result<()> {
    let args = RootArgs::parse();
    match args.command {
        Command::Bot(args) => cmd_bot(args),
        Command::Dashboard(args) => cmd_dashboard(args),
    }
}

fn cmd_bot(args: BotArgs) -> Result<()> {
    init_tracing(args.verbose);
    let client = build_client(args.endpoint.as_deref())?;
    let retry = retry_policy(args.retry_delay_ms, args.max_attempts);
    let poll = poll_policy(args.poll_interval_ms, args.max_polls);

    let definition = read_definition(&args.definition)?;
    let name = definition
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            anyhow!(
                "bot definition {} has no top-level name",
                args.definition.display()
            )
        })?;

    println!("Deploying bot {name}; builds can take several minutes.");
    let output = pipelines::bot::deploy(&client, &name, &definition, &args.alias, &retry, &poll)?;
    tracing::debug!(output = %output, "alias creation response");
    println!("Finished: alias {} now serves bot {name}.", args.alias);
    Ok(())
}

fn cmd_dashboard(args: DashboardArgs) -> Result<()> {
    init_tracing(args.verbose);
    let client = build_client(args.endpoint.as_deref())?;
    let retry = retry_policy(args.retry_delay_ms, args.max_attempts);
    let poll = poll_policy(args.poll_interval_ms, args.max_polls);

    let spec = DashboardSpec {
        prefix: args.prefix.clone(),
        catalog: args.catalog,
        database: args.database,
        table: args.table,
        template: args.template,
        placeholder: args.placeholder,
        principal: args.principal.clone(),
    };

    println!(
        "Deploying dashboard resources with prefix {}; this can take several minutes.",
        args.prefix
    );
    let output = pipelines::dashboard::deploy(&client, &spec, &retry, &poll)?;
    tracing::debug!(output = %output, "grant summary");
    println!(
        "Finished: dashboard {}Dashboard provisioned; permissions granted to {}.",
        args.prefix, args.principal
    );
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolve the control-plane endpoint: explicit flag > environment.
fn build_client(explicit: Option<&str>) -> Result<HttpControlPlane> {
    let endpoint = explicit
        .map(str::to_string)
        .or_else(|| std::env::var("PROV_ENDPOINT").ok())
        .ok_or_else(|| anyhow!("no control-plane endpoint; pass --endpoint or set PROV_ENDPOINT"))?;
    let token = std::env::var("PROV_TOKEN").ok();
    Ok(HttpControlPlane::new(&endpoint, token))
}

fn retry_policy(delay_ms: u64, max_attempts: Option<u32>) -> RetryPolicy {
    RetryPolicy::new(Duration::from_millis(delay_ms), max_attempts)
}

fn poll_policy(interval_ms: u64, max_polls: Option<u32>) -> PollPolicy {
    PollPolicy::new(Duration::from_millis(interval_ms), max_polls)
}

fn read_definition(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read bot definition {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("parse bot definition {}", path.display()))
}
