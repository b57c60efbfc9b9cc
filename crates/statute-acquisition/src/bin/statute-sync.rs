//! Acquire the statute corpus for the configured jurisdictions.

use anyhow::{Context, Result};
use clap::Parser;
use statute_acquisition::{drivers, AcquisitionService, CategoryOutcome, DriverContext, RegistryClient};
use statute_core::{AppConfig, Category};
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "statute-sync", version, about = "Acquire constitutions, statutes, court rules and administrative codes", long_about = None)]
struct Cli {
    /// Jurisdictions to sync; defaults to the configured ones
    jurisdictions: Vec<String>,

    /// Category to sync besides the constitution (repeatable)
    #[arg(short, long = "category", value_parser = parse_category)]
    categories: Vec<Category>,

    /// Do not consult the remote jurisdiction registry
    #[arg(long)]
    offline: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

fn parse_category(name: &str) -> std::result::Result<Category, String> {
    Category::parse(name).map_err(|e| e.to_string())
}

/// Initialize tracing subscriber for logging
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,statute=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

fn describe(outcome: &CategoryOutcome) -> String {
    match outcome {
        CategoryOutcome::Completed => "ok".to_string(),
        CategoryOutcome::Unsupported => "not provided".to_string(),
        CategoryOutcome::NoDriver => "no driver".to_string(),
        CategoryOutcome::Failed(reason) => format!("FAILED: {reason}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    tracing::info!("Starting statute-sync v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load_with_env().context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;

    let jurisdictions = if cli.jurisdictions.is_empty() {
        config.acquisition.jurisdictions.clone()
    } else {
        cli.jurisdictions
    };
    let categories = if cli.categories.is_empty() {
        config
            .acquisition
            .categories
            .iter()
            .map(|name| Category::parse(name))
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("invalid category in configuration")?
    } else {
        cli.categories
    };

    let ctx = Arc::new(
        DriverContext::from_config(config.clone())
            .await
            .context("failed to open the corpus")?,
    );

    let mut service = AcquisitionService::new(Arc::clone(ctx.store()))
        .with_jurisdictions(jurisdictions)
        .with_categories(categories);
    for driver in drivers::builtin(&ctx) {
        service = service.with_driver(driver);
    }
    if let (false, Some(url)) = (cli.offline, &config.acquisition.registry_url) {
        service = service.with_registry(RegistryClient::new(Arc::clone(ctx.fetcher()), url.clone()));
    }

    let report = service.start().await;
    ctx.shutdown().await;
    ctx.store().close().await;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for entry in &report.entries {
            println!(
                "{:<16} {:<22} {}",
                entry.jurisdiction,
                entry.category.dir_name(),
                describe(&entry.outcome)
            );
        }
    }

    if !report.is_clean() {
        anyhow::bail!("{} category sync(s) failed", report.failures().count());
    }
    Ok(())
}
