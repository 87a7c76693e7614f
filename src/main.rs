#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use procaudit::cli::{self, CliCommand};
use procaudit::daemon::{self, config::resolve_configuration};
use procaudit::filter::FilterSet;
use procaudit::models::RawEventKind;
use procaudit::monitor::ProcessQuery;
use std::path::Path;

#[tokio::main]
async fn main() -> Result<()> {
    match cli::parse_args()? {
        CliCommand::Run { config_path } => daemon::run_agent(config_path).await,
        CliCommand::CheckConfig { config_path } => check_config(config_path.as_deref()),
        CliCommand::Query { config_path } => print_queries(config_path.as_deref()),
    }
}

fn check_config(config_path: Option<&Path>) -> Result<()> {
    let (config, path) = resolve_configuration(config_path).context("Invalid configuration")?;
    let monitor = config.monitor_config();

    match path {
        Some(path) => println!("Configuration OK: {}", path.display()),
        None => println!("Configuration OK: (built-in defaults)"),
    }
    println!("  Include filters: {}", describe_filters(&monitor.include_filters));
    println!("  Exclude filters: {}", describe_filters(&monitor.exclude_filters));
    println!("  Cache expiry: {} minutes", config.monitor.cache_expiry_minutes);
    println!("  Cleanup interval: {} minutes", config.monitor.cleanup_interval_minutes);
    println!("  Status interval: {} minutes", config.monitor.status_interval_minutes);
    println!("  Polling interval: {:.1}s", config.source.polling_interval);
    println!("  Event queue capacity: {}", config.source.event_queue_capacity);
    println!("  Max in-flight events: {}", config.source.max_in_flight_events);
    println!("  Log level: {}", config.logging.level);
    println!("  Stdout records: {}", config.logging.stdout);
    Ok(())
}

fn describe_filters(filters: &[String]) -> String {
    if filters.is_empty() {
        "(none)".to_string()
    } else {
        format!("{} ({})", filters.len(), filters.join(", "))
    }
}

fn print_queries(config_path: Option<&Path>) -> Result<()> {
    let (config, _) = resolve_configuration(config_path).context("Invalid configuration")?;
    let filters = FilterSet::new(&config.monitor.include_filters, &config.monitor.exclude_filters)?;
    let query = ProcessQuery::from_filters(&filters);

    println!("Creation query: {}", query.event_query(RawEventKind::Create));
    println!("Deletion query: {}", query.event_query(RawEventKind::Delete));
    Ok(())
}
