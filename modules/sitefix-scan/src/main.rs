use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use pagespeed_client::PageSpeedClient;
use sitefix_common::{normalize_url, Config, Plan};
use sitefix_scan::{load_view, ScanPipeline, ScanRunner, TemplateRegistry};
use sitefix_store::{PgScanStore, MAX_LIST_LIMIT};

#[derive(Parser)]
#[command(name = "sitefix")]
#[command(about = "Website audits turned into ranked, actionable issues")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run both audits for a URL and print the result (nothing is stored)
    Audit { url: String },

    /// Create a scan for a user and run it to completion
    Scan {
        url: String,

        #[arg(long)]
        user: Uuid,

        /// Plan used for the quota check
        #[arg(long, default_value = "free")]
        plan: Plan,
    },

    /// Show a stored scan as its owner sees it
    Show {
        scan_id: Uuid,

        #[arg(long)]
        user: Uuid,

        #[arg(long, default_value = "free")]
        plan: Plan,
    },

    /// List a user's scans, newest first
    List {
        #[arg(long)]
        user: Uuid,

        #[arg(long, default_value_t = MAX_LIST_LIMIT)]
        limit: u32,
    },

    /// Apply database migrations
    Migrate,
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("sitefix=info".parse()?);
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

fn build_pipeline(config: &Config) -> Result<ScanPipeline> {
    let client = PageSpeedClient::with_endpoint(
        &config.pagespeed_endpoint,
        config.pagespeed_api_key.as_deref(),
        config.pagespeed_timeout,
    )?;
    let templates = TemplateRegistry::load(config.issue_templates_path.as_deref())?;
    Ok(ScanPipeline::new(Arc::new(client), Arc::new(templates)))
}

async fn connect_store(config: &Config) -> Result<PgScanStore> {
    let store = PgScanStore::connect(config.require_database_url()?).await?;
    store.migrate().await?;
    Ok(store)
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;
    config.log_redacted();

    match cli.command {
        Commands::Audit { url } => {
            let url = normalize_url(&url)?;
            let outcome = build_pipeline(&config)?.run(&url).await?;
            print_json(&json!({
                "url": url,
                "summary": outcome.summary,
                "issues": outcome.issues,
            }))?;
        }
        Commands::Scan { url, user, plan } => {
            let store = connect_store(&config).await?;
            let runner = ScanRunner::new(build_pipeline(&config)?, Arc::new(store));
            let scan_id = runner.start(user, &url, plan).await?;
            let view = runner.view(scan_id, user, plan).await?;
            print_json(&view)?;
        }
        Commands::Show { scan_id, user, plan } => {
            let store = connect_store(&config).await?;
            match load_view(&store, scan_id, user, plan).await? {
                Some(view) => print_json(&view)?,
                None => anyhow::bail!("Scan {scan_id} not found"),
            }
        }
        Commands::List { user, limit } => {
            let store = connect_store(&config).await?;
            print_json(&store.list_scans(user, limit).await?)?;
        }
        Commands::Migrate => {
            connect_store(&config).await?;
            info!("Database is up to date");
        }
    }

    Ok(())
}
