//! CLI argument parsing for the provisioning pipelines.
//!
//! The CLI is intentionally thin: it resolves inputs and policies, then
//! hands everything to the pipelines so the same engine can be reused
//! elsewhere.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Default pause between conflict retries and status polls, in
/// milliseconds. Matches the cadence the control plane needs to finish its
/// own background work.
pub const DEFAULT_STEP_DELAY_MS: u64 = 2000;

/// Root CLI entrypoint for the provisioning pipelines.
#[derive(Parser, Debug)]
#[command(
    name = "prov",
    version,
    about = "Idempotent provisioning pipelines for eventually consistent control planes",
    after_help = "Examples:\n  prov bot --definition bot.json --alias prod --endpoint http://plane.internal\n  prov dashboard --prefix Connect --catalog main --database contact_records \\\n      --table calls --template tmpl-1 --placeholder calls-placeholder \\\n      --principal user/admin\n\nThe endpoint can also come from PROV_ENDPOINT; a bearer token from PROV_TOKEN.",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level deployment commands, one per pipeline family.
#[derive(Subcommand, Debug)]
pub enum Command {
    Bot(BotArgs),
    Dashboard(DashboardArgs),
}

/// Bot deployment inputs.
#[derive(Parser, Debug)]
#[command(about = "Import, build, version, and alias a conversational bot")]
pub struct BotArgs {
    /// Bot definition JSON; its top-level name names the bot
    #[arg(long, value_name = "FILE")]
    pub definition: PathBuf,

    /// Alias pointed at the newly created version
    #[arg(long, value_name = "NAME", default_value = "prod")]
    pub alias: String,

    /// Control-plane base URL (falls back to PROV_ENDPOINT)
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Pause between conflict retries, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = DEFAULT_STEP_DELAY_MS)]
    pub retry_delay_ms: u64,

    /// Pause between status polls, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = DEFAULT_STEP_DELAY_MS)]
    pub poll_interval_ms: u64,

    /// Bound conflict retries instead of waiting out the control plane
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,

    /// Bound status polls instead of waiting out the control plane
    #[arg(long, value_name = "N")]
    pub max_polls: Option<u32>,

    /// Emit debug-level progress
    #[arg(long)]
    pub verbose: bool,
}

/// Dashboard deployment inputs.
#[derive(Parser, Debug)]
#[command(about = "Provision a data source, dataset, and dashboard, then grant permissions")]
pub struct DashboardArgs {
    /// Logical name prefix for the created resources
    #[arg(long, value_name = "NAME")]
    pub prefix: String,

    /// Catalog holding the upstream table
    #[arg(long, value_name = "CATALOG")]
    pub catalog: String,

    /// Database holding the upstream table
    #[arg(long, value_name = "DB")]
    pub database: String,

    /// Upstream table the dataset reads from
    #[arg(long, value_name = "TABLE")]
    pub table: String,

    /// Template the dashboard is instantiated from
    #[arg(long, value_name = "REF")]
    pub template: String,

    /// Dataset placeholder name inside the template
    #[arg(long, value_name = "NAME")]
    pub placeholder: String,

    /// Principal granted permissions on each created resource
    #[arg(long, value_name = "ID")]
    pub principal: String,

    /// Control-plane base URL (falls back to PROV_ENDPOINT)
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Pause between conflict retries, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = DEFAULT_STEP_DELAY_MS)]
    pub retry_delay_ms: u64,

    /// Pause between status polls, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = DEFAULT_STEP_DELAY_MS)]
    pub poll_interval_ms: u64,

    /// Bound conflict retries instead of waiting out the control plane
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,

    /// Bound status polls instead of waiting out the control plane
    #[arg(long, value_name = "N")]
    pub max_polls: Option<u32>,

    /// Emit debug-level progress
    #[arg(long)]
    pub verbose: bool,
}
