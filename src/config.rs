//! Pipeline configuration, sourced from the environment (spec.md §6
//! "CLI surface"). Mirrors the teacher's `models::Config::from_env`
//! shape: a plain struct with a `from_env` constructor, `.ok()`/
//! `unwrap_or` defaults rather than a validation framework.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_DB_PATH: &str = "./fxsignal.db";
const DEFAULT_CATALOG_PATH: &str = "./catalog.json";
const DEFAULT_LEVER_API_BASE_URL: &str = "https://api.lever.co/v0";
const DEFAULT_GREENHOUSE_API_BASE_URL: &str = "https://boards-api.greenhouse.io/v1/boards";
const DEFAULT_LOCK_TTL_SECONDS: i64 = 600;
const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 20;
const DEFAULT_RECENT_RUNS_LIMIT: usize = 20;
const DEFAULT_USER_AGENT: &str = "fxsignal-pipeline/0.1";
const DEFAULT_DIRECTORY_COMPANY_CAP: usize = 200;
const DEFAULT_AGGREGATOR_API_BASE_URL: &str = "https://api.jobsaggregator.example/v1";
const DEFAULT_AGGREGATOR_MAX_PAGES: usize = 5;

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub catalog_path: String,
    pub lever_api_base_url: String,
    pub greenhouse_api_base_url: String,
    pub google_sheets_credentials_path: Option<String>,
    pub lock_ttl_seconds: i64,
    pub http_timeout: Duration,
    pub http_user_agent: String,
    pub live_smoke: bool,
    pub recent_runs_limit: usize,
    /// Single-page directory listing URLs to scrape for new company
    /// candidates (spec.md §6 "Directory sources"), comma-separated.
    /// Empty by default: directory scraping is opt-in per deployment.
    pub directory_urls: Vec<String>,
    pub directory_company_cap: usize,
    pub aggregator_api_base_url: String,
    pub aggregator_api_key: Option<String>,
    /// Keyword queries to run against the aggregator search API, one
    /// ingestion unit per query.
    pub aggregator_queries: Vec<String>,
    pub aggregator_max_pages: usize,
}

/// Parses a comma-separated env var into a trimmed, non-empty list.
/// Mirrors the teacher's `TWITTER_ACCOUNTS` parsing in the old
/// `models::Config::from_env`.
fn comma_list(var: &str) -> Vec<String> {
    env::var(var)
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let db_path = env::var("PIPELINE_DB_PATH").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());

        let catalog_path =
            env::var("PIPELINE_CATALOG_PATH").unwrap_or_else(|_| DEFAULT_CATALOG_PATH.to_string());

        let lever_api_base_url =
            env::var("LEVER_API_BASE_URL").unwrap_or_else(|_| DEFAULT_LEVER_API_BASE_URL.to_string());

        let greenhouse_api_base_url = env::var("GREENHOUSE_API_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_GREENHOUSE_API_BASE_URL.to_string());

        let google_sheets_credentials_path = env::var("GOOGLE_SHEETS_CREDENTIALS_PATH").ok();

        let lock_ttl_seconds = env::var("PIPELINE_LOCK_TTL_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_LOCK_TTL_SECONDS);

        let http_timeout_seconds = env::var("PIPELINE_HTTP_TIMEOUT_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECONDS);

        let http_user_agent =
            env::var("PIPELINE_HTTP_USER_AGENT").unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string());

        let live_smoke = env::var("PIPELINE_LIVE_SMOKE")
            .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "on" | "ON"))
            .unwrap_or(false);

        let recent_runs_limit = env::var("PIPELINE_RECENT_RUNS_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_RECENT_RUNS_LIMIT);

        let directory_urls = comma_list("PIPELINE_DIRECTORY_URLS");

        let directory_company_cap = env::var("PIPELINE_DIRECTORY_COMPANY_CAP")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_DIRECTORY_COMPANY_CAP);

        let aggregator_api_base_url =
            env::var("AGGREGATOR_API_BASE_URL").unwrap_or_else(|_| DEFAULT_AGGREGATOR_API_BASE_URL.to_string());

        let aggregator_api_key = env::var("AGGREGATOR_API_KEY").ok();

        let aggregator_queries = comma_list("PIPELINE_AGGREGATOR_QUERIES");

        let aggregator_max_pages = env::var("PIPELINE_AGGREGATOR_MAX_PAGES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_AGGREGATOR_MAX_PAGES);

        Ok(Self {
            db_path,
            catalog_path,
            lever_api_base_url,
            greenhouse_api_base_url,
            google_sheets_credentials_path,
            lock_ttl_seconds,
            http_timeout: Duration::from_secs(http_timeout_seconds),
            http_user_agent,
            live_smoke,
            recent_runs_limit,
            directory_urls,
            directory_company_cap,
            aggregator_api_base_url,
            aggregator_api_key,
            aggregator_queries,
            aggregator_max_pages,
        })
    }

    pub fn load_catalog(&self) -> Result<crate::catalog::CompiledCatalog> {
        crate::catalog::load_catalog(std::path::Path::new(&self.catalog_path))
            .with_context(|| format!("loading catalog from {}", self.catalog_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_smoke_parses_common_truthy_spellings() {
        for v in ["1", "true", "TRUE", "on", "ON"] {
            env::set_var("PIPELINE_LIVE_SMOKE", v);
            let cfg = Config::from_env().unwrap();
            assert!(cfg.live_smoke, "expected {v} to parse as true");
        }
        env::remove_var("PIPELINE_LIVE_SMOKE");
    }

    #[test]
    fn defaults_apply_when_unset() {
        env::remove_var("PIPELINE_DB_PATH");
        env::remove_var("PIPELINE_LOCK_TTL_SECONDS");
        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.db_path, DEFAULT_DB_PATH);
        assert_eq!(cfg.lock_ttl_seconds, DEFAULT_LOCK_TTL_SECONDS);
    }
}
