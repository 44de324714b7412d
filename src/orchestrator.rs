//! C11 runner (spec.md §2/§5/§9): the bounded stage sequence
//! (directory → discovery → ATS ingest → aggregation → export),
//! wrapped in advisory-lock acquire/refresh/release on every exit
//! path. Stages are a declarative list of named units, mirroring the
//! teacher's own preference for an array of named checks over ad hoc
//! sequential code (the old `DataSourceKillSwitch` array in
//! `main.rs`) rather than five hand-inlined `await` calls.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::aggregate::aggregate_company;
use crate::catalog::CompiledCatalog;
use crate::config::Config;
use crate::directory::single_page::SinglePageSource;
use crate::discovery::discover_and_persist_batch;
use crate::error::PipelineError;
use crate::http::HttpClient;
use crate::ingest::{run_provider, AggregatorUnitFetcher, AtsUnitFetcher, WorkUnit};
use crate::providers::aggregator_api::AggregatorApiProvider;
use crate::providers::greenhouse::GreenhouseProvider;
use crate::providers::lever::LeverProvider;
use crate::providers::{Provider, ProviderKind};
use crate::scorer::ScoringConfig;
use crate::sheet::SheetExporter;
use crate::store::{RunCounters, Store};

#[derive(Debug)]
pub struct StageOutcome {
    pub name: &'static str,
    pub counters: RunCounters,
    pub error: Option<String>,
}

async fn run_stage<F, Fut>(name: &'static str, f: F) -> StageOutcome
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<RunCounters, PipelineError>>,
{
    match f().await {
        Ok(counters) => {
            info!(stage = name, offers = counters.offers_fetched, errors = counters.errors_count, "stage complete");
            StageOutcome { name, counters, error: None }
        }
        Err(e) => {
            warn!(stage = name, error = %e, "stage failed");
            let mut counters = RunCounters::default();
            counters.errors_count = 1;
            StageOutcome { name, counters, error: Some(e.to_string()) }
        }
    }
}

async fn directory_stage(config: &Config, store: &dyn Store, client: &Arc<HttpClient>) -> Result<RunCounters, PipelineError> {
    let mut counters = RunCounters::default();
    for url in &config.directory_urls {
        let source = SinglePageSource {
            name: "directory",
            listing_url: url.clone(),
            company_cap: config.directory_company_cap,
        };
        let candidates = match source.fetch_companies(client).await {
            Ok(c) => c,
            Err(e) => {
                warn!(%url, error = %e, "directory fetch failed");
                counters.errors_count += 1;
                continue;
            }
        };
        counters.requests_count += 1;
        for evidence in candidates {
            if !evidence.has_identity() {
                continue;
            }
            if let Err(e) = store.upsert_company(&evidence).await {
                warn!(error = %e, "directory upsert_company failed");
                counters.errors_count += 1;
            }
        }
    }
    Ok(counters)
}

async fn discovery_stage(store: &dyn Store, client: &Arc<HttpClient>) -> Result<RunCounters, PipelineError> {
    // Only `.detect()` is exercised here (pure regex match, no network
    // call), so the tenant list/hydrate base URLs are irrelevant.
    let lever = LeverProvider::new(client.clone(), String::new());
    let greenhouse = GreenhouseProvider::new(client.clone(), String::new());
    let providers: Vec<&dyn Provider> = vec![&lever, &greenhouse];

    let mut total = RunCounters::default();
    for kind in [ProviderKind::Lever, ProviderKind::Greenhouse] {
        let counters = discover_and_persist_batch(store, client, &providers, kind).await;
        total.requests_count += counters.requests_count;
        total.errors_count += counters.errors_count;
    }
    Ok(total)
}

async fn ats_ingest_stage(
    config: &Config,
    store: &dyn Store,
    client: Arc<HttpClient>,
    catalog: &CompiledCatalog,
    scoring_cfg: &ScoringConfig,
) -> Result<RunCounters, PipelineError> {
    let lever = LeverProvider::new(client.clone(), config.lever_api_base_url.clone());
    let greenhouse = GreenhouseProvider::new(client, config.greenhouse_api_base_url.clone());

    let mut total = RunCounters::default();

    for (kind, provider): (ProviderKind, &dyn Provider) in [(ProviderKind::Lever, &lever as &dyn Provider), (ProviderKind::Greenhouse, &greenhouse as &dyn Provider)] {
        let tenants = store.list_tenants_for_provider(kind.as_str()).await?;
        if tenants.is_empty() {
            continue;
        }
        let units: Vec<WorkUnit> = tenants
            .into_iter()
            .map(|(company_id, tenant_key)| WorkUnit::AtsTenant { company_id, tenant_key })
            .collect();
        let fetcher = AtsUnitFetcher { provider };
        let outcome = run_provider(store, &fetcher, catalog, scoring_cfg, kind.as_str(), units, false).await?;
        total.pages_fetched += outcome.counters.pages_fetched;
        total.offers_fetched += outcome.counters.offers_fetched;
        total.errors_count += outcome.counters.errors_count;
    }

    Ok(total)
}

async fn aggregator_ingest_stage(
    config: &Config,
    store: &dyn Store,
    client: Arc<HttpClient>,
    catalog: &CompiledCatalog,
    scoring_cfg: &ScoringConfig,
) -> Result<RunCounters, PipelineError> {
    let mut total = RunCounters::default();
    let Some(api_key) = config.aggregator_api_key.clone() else {
        return Ok(total);
    };

    let aggregator = AggregatorApiProvider::new(client, config.aggregator_api_base_url.clone(), api_key);

    for query in &config.aggregator_queries {
        let unit = WorkUnit::AggregatorSearch { query_fingerprint: Some(query.clone()) };
        let fetcher = AggregatorUnitFetcher { provider: &aggregator, query, max_pages: config.aggregator_max_pages };
        let outcome = run_provider(store, &fetcher, catalog, scoring_cfg, "aggregator", vec![unit], true).await?;
        total.pages_fetched += outcome.counters.pages_fetched;
        total.offers_fetched += outcome.counters.offers_fetched;
        total.errors_count += outcome.counters.errors_count;
        if outcome.status == "failure" {
            break;
        }
    }

    Ok(total)
}

async fn aggregation_stage(store: &dyn Store, scoring_cfg: &ScoringConfig) -> Result<RunCounters, PipelineError> {
    let mut counters = RunCounters::default();
    for company_id in store.list_company_ids().await? {
        let offers = store.list_company_offers_for_aggregation(company_id).await?;
        let aggregate = aggregate_company(&offers, scoring_cfg.strong_threshold);
        store.persist_company_aggregates(company_id, &aggregate).await?;
        counters.requests_count += 1;
    }
    Ok(counters)
}

async fn export_stage(store: &dyn Store, exporter: &dyn SheetExporter) -> Result<RunCounters, PipelineError> {
    let rows = store.list_companies_for_export().await?;
    let mut counters = RunCounters::default();
    counters.offers_fetched = rows.len() as i64;
    exporter.export(&rows).await?;
    Ok(counters)
}

/// Run the full stage sequence once under the advisory lock, refreshing
/// it at `ttl/2` for the duration of the run via a background task
/// (grounded in the teacher's heartbeat-interval pattern in
/// `scrapers/binance_hardened_ingest.rs`), and releasing it on every
/// exit path including a panic-free early return on acquire failure.
#[instrument(skip(config, store, catalog, scoring_cfg, exporter, lock))]
pub async fn run_once(
    config: &Config,
    store: &dyn Store,
    catalog: &CompiledCatalog,
    scoring_cfg: &ScoringConfig,
    exporter: &dyn SheetExporter,
    lock: &crate::lock::RunLock,
) -> anyhow::Result<Vec<StageOutcome>> {
    lock.acquire()?;

    let heartbeat_lock = lock.clone();
    let half_ttl = Duration::from_secs((config.lock_ttl_seconds.max(2) as u64) / 2);
    let heartbeat = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(half_ttl);
        ticker.tick().await; // first tick fires immediately; skip it, the lock was just acquired
        loop {
            ticker.tick().await;
            match heartbeat_lock.refresh() {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    warn!(error = %e, "lock refresh failed");
                    break;
                }
            }
        }
    });

    let client = Arc::new(
        HttpClient::new(&config.http_user_agent, config.http_timeout)
            .map_err(|e| PipelineError::Config(e.to_string()))?,
    );

    let mut outcomes = Vec::new();
    outcomes.push(run_stage("directory", || directory_stage(config, store, &client)).await);
    outcomes.push(run_stage("discovery", || discovery_stage(store, &client)).await);
    outcomes.push(run_stage("ats_ingest", || ats_ingest_stage(config, store, client.clone(), catalog, scoring_cfg)).await);
    outcomes.push(run_stage("aggregator_ingest", || aggregator_ingest_stage(config, store, client.clone(), catalog, scoring_cfg)).await);
    outcomes.push(run_stage("aggregation", || aggregation_stage(store, scoring_cfg)).await);
    outcomes.push(run_stage("export", || export_stage(store, exporter)).await);

    heartbeat.abort();
    lock.release()?;

    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogDocument, Category, Keyword, Tier};
    use crate::sheet::NullExporter;
    use crate::store::SqliteStore;

    fn empty_catalog() -> CompiledCatalog {
        let doc = CatalogDocument {
            version: "v1".into(),
            categories: vec![Category { id: "cat_fx_direct".into(), name: "Direct FX".into(), tier: Tier::Three }],
            keywords: vec![Keyword {
                id: "kw_forex".into(),
                category_id: "cat_fx_direct".into(),
                canonical: "forex".into(),
                aliases: vec!["forex".into()],
            }],
            phrases: vec![],
        };
        crate::catalog::compile::compile(&doc).unwrap()
    }

    #[tokio::test]
    async fn run_once_acquires_and_releases_the_lock_with_no_configured_sources() {
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        crate::store::schema::migrate(&mut conn).unwrap();
        let conn = std::sync::Arc::new(parking_lot::Mutex::new(conn));
        let store = SqliteStore::open_in_memory().unwrap();
        let lock = crate::lock::RunLock::new(conn, "test-owner".into(), 60);

        let mut config = Config::from_env().unwrap();
        config.directory_urls.clear();
        config.aggregator_queries.clear();
        config.aggregator_api_key = None;

        let catalog = empty_catalog();
        let scoring_cfg = ScoringConfig::default();
        let exporter = NullExporter;

        let outcomes = run_once(&config, &store, &catalog, &scoring_cfg, &exporter, &lock).await.unwrap();
        assert_eq!(outcomes.len(), 6);
        assert!(lock.acquire().is_ok(), "lock should have been released on exit");
        lock.release().unwrap();
    }
}
