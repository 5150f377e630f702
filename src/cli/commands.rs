//! CLI commands and argument parsing

use crate::types::{ExportFormat, Region, ResourceKind};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Mailgun data exporter
#[derive(Parser, Debug)]
#[command(name = "mailgun-export")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (YAML or JSON)
    #[arg(short = 'C', long, global = true, env = "MAILGUN_EXPORT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Mailgun private API key
    #[arg(long, global = true, env = "MAILGUN_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Sending domain
    #[arg(long, global = true, env = "MAILGUN_DOMAIN")]
    pub domain: Option<String>,

    /// Hosting region
    #[arg(long, global = true, env = "MAILGUN_REGION", ignore_case = true)]
    pub region: Option<Region>,

    /// API host override, e.g. a proxy
    #[arg(long, global = true, env = "MAILGUN_API_HOST")]
    pub api_host: Option<String>,

    /// Requests per minute
    #[arg(long, global = true, env = "RATE_LIMIT")]
    pub rate_limit: Option<u32>,

    /// Requests in flight at once
    #[arg(long, global = true, env = "MAX_CONCURRENT")]
    pub max_concurrent: Option<usize>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export Mailgun data
    Export {
        #[command(flatten)]
        select: ResourceSelection,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Export email events only
    Events {
        /// Single event type (accepted, delivered, failed, ...)
        #[arg(long = "type")]
        event_type: Option<String>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Export statistics
    Stats {
        /// Include engagement and delivery breakdowns
        #[arg(long)]
        comprehensive: bool,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Show rate limit status and configuration
    Status,

    /// Test API connection and credentials
    Test,
}

/// Resource kinds to export; none selected means all
#[derive(Args, Debug, Clone, Default)]
pub struct ResourceSelection {
    /// Export all data types
    #[arg(long)]
    pub all: bool,

    /// Email events
    #[arg(long)]
    pub events: bool,

    /// Suppression lists
    #[arg(long)]
    pub suppressions: bool,

    /// Domain configurations
    #[arg(long)]
    pub domains: bool,

    /// Mailing lists and members
    #[arg(long)]
    pub lists: bool,

    /// Templates and versions
    #[arg(long)]
    pub templates: bool,

    /// Statistics
    #[arg(long)]
    pub stats: bool,
}

impl ResourceSelection {
    /// Selected kinds in export order
    pub fn kinds(&self) -> Vec<ResourceKind> {
        let flags = [
            (ResourceKind::Events, self.events),
            (ResourceKind::Suppressions, self.suppressions),
            (ResourceKind::Domains, self.domains),
            (ResourceKind::Lists, self.lists),
            (ResourceKind::Templates, self.templates),
            (ResourceKind::Stats, self.stats),
        ];
        let selected: Vec<ResourceKind> = flags
            .iter()
            .filter(|(_, on)| *on)
            .map(|(kind, _)| *kind)
            .collect();

        if self.all || selected.is_empty() {
            ResourceKind::ALL.to_vec()
        } else {
            selected
        }
    }
}

/// Output and range options shared by the export commands
#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Export format
    #[arg(long, env = "EXPORT_FORMAT", ignore_case = true)]
    pub format: Option<ExportFormat>,

    /// Output directory or cloud URL (s3://, r2://, gs://, az://)
    #[arg(short, long, env = "OUTPUT_DIR")]
    pub output: Option<String>,

    /// Start date (YYYY-MM-DD)
    #[arg(long, env = "DATE_FROM")]
    pub date_from: Option<String>,

    /// End date (YYYY-MM-DD)
    #[arg(long, env = "DATE_TO")]
    pub date_to: Option<String>,

    /// Include unsubscribed list members
    #[arg(long)]
    pub include_unsubscribed: bool,
}
