//! Ingestion pipeline (C8): provider-agnostic orchestration of the
//! 9-step sequence in spec.md §4.8.

use std::collections::HashSet;

use chrono::Utc;
use tracing::{info, warn};

use crate::aggregate::aggregate_company;
use crate::catalog::CompiledCatalog;
use crate::error::PipelineError;
use crate::identity::CompanyEvidence;
use crate::matcher::match_offer;
use crate::providers::aggregator_api::AggregatorApiProvider;
use crate::providers::Provider;
use crate::repost::{content_fingerprint, detect_repost_duplicate, RepostDecision};
use crate::scorer::{score_offer, ScoringConfig};
use crate::store::models::{MatchInput, OfferInput};
use crate::store::{CompanySourceLink, RunCounters, Store};

pub const MAX_OFFERS_PER_UNIT: usize = 500;
pub const MAX_PAGES_PER_UNIT: usize = 20;

/// One unit of ingestion work: an ATS tenant with a pre-known
/// `company_id`, or an aggregator search (no pre-known company).
#[derive(Debug, Clone)]
pub enum WorkUnit {
    AtsTenant { company_id: i64, tenant_key: String },
    AggregatorSearch { query_fingerprint: Option<String> },
}

/// A provider-independent summary-then-hydrate fetch. Concrete
/// providers (ATS or aggregator) implement this. ATS fetchers already
/// know the company (the unit carries `company_id`) and return `None`
/// for evidence; aggregator fetchers have no pre-known company and
/// must supply the evidence scraped from the search result itself.
#[async_trait::async_trait]
pub trait UnitFetcher: Send + Sync {
    async fn fetch_unit(
        &self,
        unit: &WorkUnit,
    ) -> Result<Vec<(Option<CompanyEvidence>, crate::store::models::OfferInput)>, PipelineError>;
}

pub struct RunOutcome {
    pub run_id: i64,
    pub status: &'static str,
    pub counters: RunCounters,
}

/// Adapts an ATS `Provider` (list + hydrate) to `UnitFetcher` for a
/// single known tenant. Individual hydration failures are logged and
/// dropped rather than failing the whole unit, per the `Provider`
/// trait's own contract.
pub struct AtsUnitFetcher<'a> {
    pub provider: &'a dyn Provider,
}

#[async_trait::async_trait]
impl<'a> UnitFetcher for AtsUnitFetcher<'a> {
    async fn fetch_unit(
        &self,
        unit: &WorkUnit,
    ) -> Result<Vec<(Option<CompanyEvidence>, OfferInput)>, PipelineError> {
        let WorkUnit::AtsTenant { tenant_key, .. } = unit else {
            return Err(PipelineError::Config("AtsUnitFetcher received a non-ATS work unit".into()));
        };

        let search = self.provider.list_offers_for_tenant(tenant_key).await?;
        let hydrated = self.provider.hydrate_offer_details(tenant_key, &search.offers).await;

        let mut offers = Vec::with_capacity(hydrated.len());
        for result in hydrated {
            match result {
                Ok(offer) => offers.push((None, offer)),
                Err(e) => warn!(tenant_key, error = %e, "dropping posting that failed to hydrate"),
            }
        }
        Ok(offers)
    }
}

/// Adapts the aggregator search API to `UnitFetcher` for a single
/// keyword query.
pub struct AggregatorUnitFetcher<'a> {
    pub provider: &'a AggregatorApiProvider,
    pub query: &'a str,
    pub max_pages: usize,
}

#[async_trait::async_trait]
impl<'a> UnitFetcher for AggregatorUnitFetcher<'a> {
    async fn fetch_unit(
        &self,
        _unit: &WorkUnit,
    ) -> Result<Vec<(Option<CompanyEvidence>, OfferInput)>, PipelineError> {
        self.provider.search(self.query, self.max_pages).await
    }
}

/// Run one provider's ingestion over a batch of work units. Per-unit
/// errors are logged and counted; they never abort the run. A 401/403
/// from an aggregator fetch halts the run immediately (spec.md §4.8
/// "Failure semantics").
pub async fn run_provider(
    store: &dyn Store,
    fetcher: &dyn UnitFetcher,
    catalog: &CompiledCatalog,
    scoring_cfg: &ScoringConfig,
    provider_name: &str,
    units: Vec<WorkUnit>,
    is_aggregator: bool,
) -> Result<RunOutcome, PipelineError> {
    let query_fingerprint = units.iter().find_map(|u| match u {
        WorkUnit::AggregatorSearch { query_fingerprint } => query_fingerprint.clone(),
        _ => None,
    });

    let run_id = store.start_ingestion_run(provider_name, query_fingerprint.as_deref()).await?;
    let mut counters = RunCounters::default();
    let mut affected_companies: HashSet<i64> = HashSet::new();
    let mut status = "success";

    'units: for unit in &units {
        counters.pages_fetched += 1;

        let offers = match fetcher.fetch_unit(unit).await {
            Ok(offers) => offers,
            Err(e) => {
                if is_aggregator {
                    if let PipelineError::Protocol { status: http_status, .. } = &e {
                        if crate::error::is_auth_failure(*http_status) {
                            warn!(provider_name, "aggregator auth failure, aborting run");
                            status = "failure";
                            break 'units;
                        }
                    }
                }
                warn!(provider_name, error = %e, "unit fetch failed");
                counters.errors_count += 1;
                continue;
            }
        };

        for (evidence, offer) in offers.into_iter().take(MAX_OFFERS_PER_UNIT) {
            counters.offers_fetched += 1;

            let known_company_id = match unit {
                WorkUnit::AtsTenant { company_id, .. } => Some(*company_id),
                WorkUnit::AggregatorSearch { .. } => None,
            };

            // A pre-known company_id always takes precedence over
            // derived evidence, per spec.md §4.8 step 4.
            let company_id = match known_company_id {
                Some(id) => id,
                None => {
                    let Some(evidence) = evidence else {
                        warn!(provider_name, offer_title = %offer.title, "no identity evidence supplied, skipping offer");
                        counters.errors_count += 1;
                        continue;
                    };
                    if !evidence.has_identity() {
                        warn!(provider_name, offer_title = %offer.title, "insufficient identity evidence, skipping offer");
                        counters.errors_count += 1;
                        continue;
                    }
                    match store.upsert_company(&evidence).await {
                        Ok(id) => id,
                        Err(e) => {
                            warn!(provider_name, error = %e, "upsert_company failed, skipping offer");
                            counters.errors_count += 1;
                            continue;
                        }
                    }
                }
            };

            if let WorkUnit::AtsTenant { tenant_key, .. } = unit {
                let link = CompanySourceLink {
                    company_id,
                    provider: provider_name.to_string(),
                    provider_company_id: Some(tenant_key.clone()),
                    provider_url: None,
                    hidden: false,
                };
                if let Err(e) = store.upsert_company_source(&link).await {
                    warn!(provider_name, %tenant_key, error = %e, "best-effort company_source upsert failed");
                }
            }

            let (offer_id, created) = match store.upsert_offer(&offer, company_id).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(provider_name, error = %e, "upsert_offer failed");
                    counters.errors_count += 1;
                    continue;
                }
            };

            if let Some(fingerprint) = content_fingerprint(&offer.title, &offer.description) {
                if created {
                    match store.find_canonical_offers_by_fingerprint(&fingerprint, company_id).await {
                        Ok(candidates) => {
                            let decision = detect_repost_duplicate(&offer.title, &offer.description, &candidates);
                            match decision {
                                RepostDecision::Duplicate { canonical_offer_id, .. } => {
                                    if let Err(e) = store.mark_duplicate(offer_id, canonical_offer_id).await {
                                        warn!(provider_name, error = %e, "mark_duplicate failed");
                                        counters.errors_count += 1;
                                    } else if let Err(e) = store.bump_canonical(canonical_offer_id, Utc::now()).await {
                                        warn!(provider_name, error = %e, "bump_canonical failed");
                                        counters.errors_count += 1;
                                    }
                                }
                                RepostDecision::NotDuplicate { .. } => {
                                    if let Err(e) = store.set_canonical_self(offer_id, Some(&fingerprint)).await {
                                        warn!(provider_name, error = %e, "set_canonical_self failed");
                                        counters.errors_count += 1;
                                    }
                                }
                            }
                        }
                        Err(e) => {
                            warn!(provider_name, error = %e, "find_canonical_offers_by_fingerprint failed");
                            counters.errors_count += 1;
                        }
                    }
                }
            }

            let match_result = match_offer(&offer.title, &offer.description, catalog);
            let score_output = score_offer(&match_result, catalog, scoring_cfg);
            let reasons_json = serde_json::to_string(&score_output.reasons).unwrap_or_default();
            let match_input = MatchInput {
                offer_id,
                score: score_output.score,
                top_category_id: score_output.top_category_id.clone(),
                reasons_json,
            };
            if let Err(e) = store.upsert_match(&match_input).await {
                warn!(provider_name, error = %e, "upsert_match failed");
                counters.errors_count += 1;
            }

            affected_companies.insert(company_id);
        }
    }

    for company_id in &affected_companies {
        match store.list_company_offers_for_aggregation(*company_id).await {
            Ok(offers) => {
                let aggregate = aggregate_company(&offers, scoring_cfg.strong_threshold);
                if let Err(e) = store.persist_company_aggregates(*company_id, &aggregate).await {
                    warn!(company_id, error = %e, "persist_company_aggregates failed");
                    counters.errors_count += 1;
                }
            }
            Err(e) => {
                warn!(company_id, error = %e, "list_company_offers_for_aggregation failed");
                counters.errors_count += 1;
            }
        }
    }

    store.close_ingestion_run(run_id, status, counters).await?;
    info!(provider_name, run_id, status, offers = counters.offers_fetched, "ingestion run complete");

    Ok(RunOutcome { run_id, status, counters })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::OfferInput;
    use crate::store::SqliteStore;
    use std::sync::Mutex as StdMutex;

    struct FixedFetcher {
        offers: StdMutex<Vec<Vec<OfferInput>>>,
    }

    #[async_trait::async_trait]
    impl UnitFetcher for FixedFetcher {
        async fn fetch_unit(
            &self,
            _unit: &WorkUnit,
        ) -> Result<Vec<(Option<CompanyEvidence>, OfferInput)>, PipelineError> {
            let mut guard = self.offers.lock().unwrap();
            Ok(guard.pop().unwrap_or_default().into_iter().map(|o| (None, o)).collect())
        }
    }

    fn sample_offer(id: &str, title: &str) -> OfferInput {
        OfferInput {
            provider: "lever".into(),
            provider_offer_id: id.into(),
            title: title.into(),
            description: "We need a forex trading analyst for USD exposure.".into(),
            min_requirements: None,
            desired_requirements: None,
            published_at: None,
            updated_at: None,
            application_count: None,
            location: None,
            category: None,
            subcategory: None,
            contract_type: None,
            workday: None,
            experience: None,
            salary: None,
        }
    }

    fn test_catalog() -> CompiledCatalog {
        use crate::catalog::{CatalogDocument, Category, Keyword, Tier};
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
    async fn ingest_known_company_offer_upserts_and_scores() {
        let store = SqliteStore::open_in_memory().unwrap();
        let evidence = build_evidence(Some("Acme".into()), None, Some("https://acme.com".into()));
        let company_id = store.upsert_company(&evidence).await.unwrap();

        let fetcher = FixedFetcher {
            offers: StdMutex::new(vec![vec![sample_offer("1", "Forex Analyst")]]),
        };
        let catalog = test_catalog();
        let cfg = ScoringConfig::default();
        let units = vec![WorkUnit::AtsTenant { company_id, tenant_key: "acme".into() }];

        let outcome = run_provider(&store, &fetcher, &catalog, &cfg, "lever", units, false)
            .await
            .unwrap();
        assert_eq!(outcome.status, "success");
        assert_eq!(outcome.counters.offers_fetched, 1);

        let offers = store.list_company_offers_for_aggregation(company_id).await.unwrap();
        assert_eq!(offers.len(), 1);
        assert!(offers[0].score > 0);
    }

    #[tokio::test]
    async fn rerunning_same_tenant_is_idempotent_for_canonicalization() {
        let store = SqliteStore::open_in_memory().unwrap();
        let evidence = build_evidence(Some("Acme".into()), None, Some("https://acme.com".into()));
        let company_id = store.upsert_company(&evidence).await.unwrap();
        let catalog = test_catalog();
        let cfg = ScoringConfig::default();

        for _ in 0..2 {
            let fetcher = FixedFetcher {
                offers: StdMutex::new(vec![vec![sample_offer("1", "Forex Analyst")]]),
            };
            let units = vec![WorkUnit::AtsTenant { company_id, tenant_key: "acme".into() }];
            run_provider(&store, &fetcher, &catalog, &cfg, "lever", units, false).await.unwrap();
        }

        let offers = store.list_company_offers_for_aggregation(company_id).await.unwrap();
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].canonical_offer_id, None);
    }
}
