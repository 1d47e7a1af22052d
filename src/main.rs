mod catalog;
mod client;
mod config;
mod enrich;
mod error;
mod logging;
mod proxy;
mod scraper;
mod sink;

use crate::catalog::{alientech, autotuner};
use crate::config::Config;
use crate::enrich::{BrowserSession, EnrichOptions};
use crate::error::Result;
use crate::logging::{init_logging, LoggerConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(
    name = "vehicle-scraper",
    version,
    about = "Scrapes vehicle compatibility catalogs of tuning tool vendors into CSV files"
)]
struct Cli {
    /// JSON (or .toml) config file with proxies and run settings
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch the AlienTech vehicle list into alientech_vehicles.csv
    AlientechFetch {
        #[arg(long, default_value = alientech::BASE_URL)]
        base_url: String,
    },
    /// Visit every AlienTech vehicle page listed in alientech_vehicles.csv
    /// and write alientech_vehicles_details.csv
    AlientechDetails {
        /// Index of the first vehicle to visit; earlier rows are kept from
        /// the existing details file
        #[arg(long, value_name = "N", default_value_t = 0)]
        start_index: usize,
    },
    /// Fetch the AutoTuner compatibility list into autotuner_vehicles.csv
    AutotunerFetch {
        #[arg(long, default_value = autotuner::BASE_URL)]
        base_url: String,
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long = "type", default_value = "")]
        vehicle_type: String,
        #[arg(long, default_value = "")]
        ecu_type: String,
    },
}

impl Command {
    fn log_file(&self) -> &'static str {
        match self {
            Command::AlientechFetch { .. } | Command::AlientechDetails { .. } => {
                alientech::LOG_FILE
            }
            Command::AutotunerFetch { .. } => autotuner::LOG_FILE,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, config_found) = Config::load(&cli.config)?;
    let logger_config = LoggerConfig::for_run(&config.logging, cli.command.log_file())?;
    init_logging(logger_config)?;

    if config_found {
        log_info!("[main] Configuration loaded from {}", cli.config.display());
    } else {
        log_warn!(
            "[main] Config file not found: {}, running without proxies",
            cli.config.display()
        );
    }
    if config.proxies.is_empty() {
        log_info!("[main] No proxies configured, connecting directly");
    } else {
        log_info!("[main] {} proxy entries configured", config.proxies.len());
        for proxy in config.proxies.describe() {
            log_info!("[main] Using proxy {}", proxy);
        }
    }

    match cli.command {
        Command::AlientechFetch { base_url } => {
            let client = Arc::new(alientech::client(&config, &base_url)?);
            let output = config.output_path(alientech::VEHICLES_FILE);
            if let Some(count) = alientech::scrape_catalog(client, config.workers, &output).await? {
                log_info!("[main] Saved {} vehicles to {}", count, output.display());
            }
        }
        Command::AlientechDetails { start_index } => {
            let input = config.output_path(alientech::VEHICLES_FILE);
            let output = config.output_path(alientech::DETAILS_FILE);
            let options = EnrichOptions {
                start_index,
                checkpoint_every: config.browser.checkpoint_every,
            };

            let mut session = BrowserSession::launch(&config.browser).await?;
            let result = enrich::enrich_file(&mut session, &input, &output, &options).await;
            if let Err(e) = session.close().await {
                log_error!(e => "[main] Browser did not shut down cleanly");
            }

            let report = result?;
            log_info!(
                "[main] Scraping completed: {} rows in {}",
                report.written,
                output.display()
            );
        }
        Command::AutotunerFetch {
            base_url,
            search,
            vehicle_type,
            ecu_type,
        } => {
            let client = Arc::new(autotuner::client(&config, &base_url)?);
            let output = config.output_path(autotuner::VEHICLES_FILE);
            let filters = autotuner::SearchFilters {
                search,
                vehicle_type,
                ecu_type,
            };
            if let Some(count) =
                autotuner::scrape_catalog(client, filters, config.workers, &output).await?
            {
                log_info!("[main] Saved {} vehicles to {}", count, output.display());
            }
        }
    }

    Ok(())
}
