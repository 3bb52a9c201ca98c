use std::time::Duration;

use log::{debug, warn};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use tokio::task::JoinSet;

use super::error::FetchError;
use super::filter::{self, FilterConfig};
use super::model::Metric;
use super::parser;

const EXPOSITION_CONTENT_TYPE: &str = "text/plain";

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// Applies to the whole request, connect through body.
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        ScraperConfig {
            timeout: Duration::from_secs(10),
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Scrapes Prometheus endpoints. Holds only the HTTP client, so one scraper
/// can serve any number of concurrent fetches.
#[derive(Debug, Clone)]
pub struct MetricScraper {
    client: reqwest::Client,
}

impl MetricScraper {
    pub fn new(config: &ScraperConfig) -> Result<MetricScraper, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(MetricScraper { client })
    }

    /// Issue one GET against `url` and return the samples passing `filter`.
    /// No retries and no caching.
    pub async fn fetch(&self, url: &str, filter: &FilterConfig) -> Result<Vec<Metric>, FetchError> {
        debug!("Fetching metrics from {url}");
        let network = |source| FetchError::Network {
            url: url.to_string(),
            source,
        };

        let response = self
            .client
            .get(url)
            .header(ACCEPT, EXPOSITION_CONTENT_TYPE)
            .send()
            .await
            .map_err(network)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
        {
            if !content_type.starts_with(EXPOSITION_CONTENT_TYPE) {
                warn!("Unexpected content type '{content_type}' from {url}, parsing anyway");
            }
        }

        let body = response.text().await.map_err(network)?;
        let families = parser::parse(&body).map_err(|source| FetchError::Parse {
            url: url.to_string(),
            source,
        })?;
        for family in families.values() {
            family
                .check_invariants()
                .map_err(|source| FetchError::Invariant {
                    url: url.to_string(),
                    source,
                })?;
        }

        let metrics = filter::select(&families, filter);
        debug!(
            "Parsed {} families from {url}, {} samples selected",
            families.len(),
            metrics.len()
        );
        Ok(metrics)
    }

    /// Fetch every URL concurrently. Returns one result per URL, in the order
    /// given; a failing URL does not affect the others.
    pub async fn fetch_all(
        &self,
        urls: &[String],
        filter: &FilterConfig,
    ) -> Vec<(String, Result<Vec<Metric>, FetchError>)> {
        let mut tasks = JoinSet::new();
        for (index, url) in urls.iter().enumerate() {
            let scraper = self.clone();
            let filter = filter.clone();
            let url = url.clone();
            tasks.spawn(async move {
                let result = scraper.fetch(&url, &filter).await;
                (index, url, result)
            });
        }

        let mut results = Vec::with_capacity(urls.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => results.push(outcome),
                // tasks are never aborted, so this is a panic inside fetch
                Err(err) => std::panic::resume_unwind(err.into_panic()),
            }
        }
        results.sort_by_key(|(index, _, _)| *index);
        results
            .into_iter()
            .map(|(_, url, result)| (url, result))
            .collect()
    }
}
