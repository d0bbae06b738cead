//! Outreach CLI
//!
//! Command-line interface for audience segments, the contact identity key
//! lifecycle and the duplicate resolution queue.
//!
//! # Usage
//!
//! ```bash
//! outreach segments create --name "US" --filter country=US
//! outreach segments preview --filter country=US,CA --filter plan=pro
//! outreach audience count <segment-id> <segment-id>
//! outreach identity set-primary customer_id
//! outreach identity finalize
//! outreach duplicates resolve 0 --keep new
//! outreach duplicates resolve-all --keep old --yes
//! ```

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod output;

#[derive(Parser)]
#[command(name = "outreach")]
#[command(author = "Outreach")]
#[command(version)]
#[command(about = "Outreach audience and contact identity CLI", long_about = None)]
struct Cli {
    /// API endpoint URL
    #[arg(long, env = "OUTREACH_API_URL")]
    api_url: Option<String>,

    /// API key for authentication
    #[arg(long, env = "OUTREACH_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Company whose identity keys are managed
    #[arg(long, env = "OUTREACH_COMPANY_ID")]
    company: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    format: output::OutputFormat,

    /// Profile name from config file
    #[arg(long, short)]
    profile: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage saved segments
    Segments {
        #[command(subcommand)]
        action: SegmentCommands,
    },
    /// Count campaign recipients
    Audience {
        #[command(subcommand)]
        action: AudienceCommands,
    },
    /// Manage the contact identity keys
    Identity {
        #[command(subcommand)]
        action: IdentityCommands,
    },
    /// Work through the duplicate contact queue
    Duplicates {
        #[command(subcommand)]
        action: DuplicateCommands,
    },
    /// Configure CLI
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum SegmentCommands {
    /// List all segments
    List,
    /// Get segment details
    Get { id: String },
    /// Create a new segment
    Create {
        #[arg(long)]
        name: String,
        /// field=value[,value...]; repeat for more fields
        #[arg(long = "filter", short = 'f', required = true)]
        filters: Vec<String>,
    },
    /// Delete a segment
    Delete { id: String },
    /// Count contacts matching a filter selection without saving it
    Preview {
        #[arg(long = "filter", short = 'f', required = true)]
        filters: Vec<String>,
    },
    /// Suggest values for a field
    Values {
        field: String,
        #[arg(long, short, default_value = "")]
        query: String,
    },
}

#[derive(Subcommand)]
enum AudienceCommands {
    /// Per-segment counts and the deduplicated total
    Count {
        #[arg(required = true)]
        segment_ids: Vec<String>,
    },
}

#[derive(Subcommand)]
enum IdentityCommands {
    /// Show the state of every key slot
    Show,
    /// Choose the primary key field
    SetPrimary { field: String },
    /// Choose the email key field
    SetEmail { field: String },
    /// Lock every configured slot
    Finalize,
    /// Ask for a locked slot to be reopened
    Revert {
        /// primary | email | filters
        slot: String,
    },
    /// Withdraw a pending revert request
    CancelRevert { slot: String },
    /// Show how contacts would be affected by a key change
    Preview { slot: String, field: String },
}

#[derive(Subcommand)]
enum DuplicateCommands {
    /// List pending duplicate pairs
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Resolve one pair by its position in the first page
    Resolve {
        index: usize,
        /// old | new
        #[arg(long)]
        keep: String,
    },
    /// Resolve every remaining pair the same way
    ResolveAll {
        #[arg(long)]
        keep: String,
        /// Skip the confirmation step
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Initialize configuration
    Init {
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Config { action } => commands::config::handle(action, cli.profile.as_deref(), cli.format),
        command => run(command, &cli.profile, cli.api_url, cli.api_key, cli.company, cli.format).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(
    command: Commands,
    profile: &Option<String>,
    api_url: Option<String>,
    api_key: Option<String>,
    company: Option<String>,
    format: output::OutputFormat,
) -> Result<(), String> {
    let mut config = config::load(profile.as_deref())?;
    config::apply_flags(&mut config, api_url, api_key, company)?;
    tracing::debug!(company = %config.company_id, api = %config.api.base_url, "configuration loaded");
    let ctx = commands::Context::new(config, format)?;

    match command {
        Commands::Segments { action } => commands::segments::handle(action, &ctx).await,
        Commands::Audience { action } => commands::audience::handle(action, &ctx).await,
        Commands::Identity { action } => commands::identity::handle(action, &ctx).await,
        Commands::Duplicates { action } => commands::duplicates::handle(action, &ctx).await,
        Commands::Config { .. } => Ok(()),
    }
}
