use std::io::{self, Write};
use std::time::Duration;

use crate::logging::app_config;
use clap::Parser;
use cli::{Cli, Command};
use hrmm::prom::{serializer, FilterConfig, MetricScraper, ScraperConfig};

mod cli;
mod logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // initialize the logger
    log4rs::init_config(app_config(cli.log_file.as_deref(), cli.loglevel)?)?;
    log::info!("Starting the application!");

    let filter = FilterConfig::new(cli.metrics.iter().cloned(), &cli.labels);
    let scraper = MetricScraper::new(&ScraperConfig {
        timeout: Duration::from_secs(cli.timeout),
        ..Default::default()
    })?;
    log::info!("Reading metrics from endpoints: {:?}", cli.urls);

    match cli.command {
        Command::Print { json } => print(&scraper, &cli.urls, &filter, json).await,
    }
}

async fn print(
    scraper: &MetricScraper,
    urls: &[String],
    filter: &FilterConfig,
    json: bool,
) -> anyhow::Result<()> {
    let results = scraper.fetch_all(urls, filter).await;

    let mut failures = 0;
    let mut stdout = io::stdout().lock();
    for (url, result) in results {
        match result {
            Ok(metrics) => {
                log::info!("{} samples from {url}", metrics.len());
                for metric in &metrics {
                    log::trace!("{url}: {}", metric.identifier());
                }
                if json {
                    writeln!(stdout, "{}", serializer::to_json(&metrics)?)?;
                } else {
                    serializer::write_text(&mut stdout, &metrics)?;
                }
            }
            Err(err) => {
                failures += 1;
                log::debug!("Fetch of {url} failed: {err:?}");
                eprintln!("Error: {err}");
            }
        }
    }
    stdout.flush()?;

    if failures > 0 {
        anyhow::bail!("{failures} of {} endpoints failed", urls.len());
    }
    Ok(())
}
