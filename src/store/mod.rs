//! Offer store adapter (C10): the abstract contract the core ingestion
//! and aggregation logic is written against, plus the concrete
//! SQLite-backed implementation. See spec.md §4.7.

pub mod models;
pub mod schema;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

use crate::aggregate::{CompanyAggregate, OfferForAggregation};
use crate::error::PipelineError;
use crate::identity::CompanyEvidence;
use crate::repost::CandidateOffer;
use models::{CompanyExportRow, CompanyRow, FeedbackEventRow, IngestionRunRow, MatchInput, OfferInput};

#[derive(Debug, Clone)]
pub struct CompanySourceLink {
    pub company_id: i64,
    pub provider: String,
    pub provider_company_id: Option<String>,
    pub provider_url: Option<String>,
    pub hidden: bool,
}

/// The abstract store contract from spec.md §4.7. Any embedded
/// relational store satisfying these semantics is acceptable; the
/// core logic in `ingest`/`discovery` is written against this trait,
/// not against SQLite directly.
#[async_trait]
pub trait Store: Send + Sync {
    async fn upsert_company(&self, evidence: &CompanyEvidence) -> Result<i64, PipelineError>;

    async fn upsert_company_source(&self, link: &CompanySourceLink) -> Result<i64, PipelineError>;

    async fn upsert_company_source_by_company_provider(
        &self,
        company_id: i64,
        provider: &str,
        provider_company_id: &str,
        provider_url: &str,
    ) -> Result<i64, PipelineError>;

    async fn upsert_offer(&self, offer: &OfferInput, company_id: i64) -> Result<(i64, bool), PipelineError>;

    async fn mark_duplicate(&self, new_id: i64, canonical_id: i64) -> Result<(), PipelineError>;

    async fn bump_canonical(&self, canonical_id: i64, last_seen_at: DateTime<Utc>) -> Result<(), PipelineError>;

    async fn set_canonical_self(
        &self,
        offer_id: i64,
        fingerprint: Option<&str>,
    ) -> Result<(), PipelineError>;

    async fn find_canonical_offers_by_fingerprint(
        &self,
        fingerprint: &str,
        company_id: i64,
    ) -> Result<Vec<CandidateOffer>, PipelineError>;

    async fn upsert_match(&self, input: &MatchInput) -> Result<(), PipelineError>;

    async fn list_company_offers_for_aggregation(
        &self,
        company_id: i64,
    ) -> Result<Vec<OfferForAggregation>, PipelineError>;

    async fn persist_company_aggregates(
        &self,
        company_id: i64,
        aggregate: &CompanyAggregate,
    ) -> Result<(), PipelineError>;

    async fn start_ingestion_run(
        &self,
        provider: &str,
        query_fingerprint: Option<&str>,
    ) -> Result<i64, PipelineError>;

    async fn close_ingestion_run(
        &self,
        run_id: i64,
        status: &str,
        counters: RunCounters,
    ) -> Result<(), PipelineError>;

    async fn record_feedback_event(&self, company_id: i64, value: &str) -> Result<i64, PipelineError>;

    async fn list_feedback_events(&self, company_id: i64) -> Result<Vec<FeedbackEventRow>, PipelineError>;

    async fn list_recent_runs(&self, limit: usize) -> Result<Vec<IngestionRunRow>, PipelineError>;

    async fn companies_needing_discovery(&self, provider: &str) -> Result<Vec<(i64, String)>, PipelineError>;

    /// Companies already known to run `provider`, keyed by their tenant
    /// identifier — the work list for an ATS ingestion run.
    async fn list_tenants_for_provider(&self, provider: &str) -> Result<Vec<(i64, String)>, PipelineError>;

    /// The company-aggregate view consumed by the spreadsheet exporter
    /// (spec.md §6), restricted to companies with at least one offer.
    async fn list_companies_for_export(&self) -> Result<Vec<CompanyExportRow>, PipelineError>;

    /// Every known company id, for a full aggregation-recompute pass
    /// (catches companies whose aggregates are stale for reasons other
    /// than a just-completed ingestion run, e.g. a catalog reload).
    async fn list_company_ids(&self) -> Result<Vec<i64>, PipelineError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunCounters {
    pub pages_fetched: i64,
    pub offers_fetched: i64,
    pub requests_count: i64,
    pub http_429_count: i64,
    pub errors_count: i64,
}

/// SQLite-backed implementation, matching the teacher's
/// `rusqlite` + `parking_lot::Mutex` connection-sharing pattern
/// (`signals/db_storage.rs`, `vault/vault_db.rs`).
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &str) -> anyhow::Result<Self> {
        let mut conn = Connection::open(path)?;
        schema::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        schema::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Shared handle for modules (the advisory lock, feedback log)
    /// that need direct SQL access outside the `Store` trait surface.
    pub fn conn_handle(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }

    fn row_to_company(row: &rusqlite::Row) -> rusqlite::Result<CompanyRow> {
        Ok(CompanyRow {
            id: row.get("id")?,
            raw_name: row.get("raw_name")?,
            display_name: row.get("display_name")?,
            normalized_name: row.get("normalized_name")?,
            website_url: row.get("website_url")?,
            website_domain: row.get("website_domain")?,
            created_at: parse_ts(row.get::<_, String>("created_at")?),
            updated_at: parse_ts(row.get::<_, String>("updated_at")?),
        })
    }

}

fn parse_ts(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn fmt_ts(t: DateTime<Utc>) -> String {
    t.to_rfc3339()
}

fn store_err(e: rusqlite::Error) -> PipelineError {
    PipelineError::Store(e.to_string())
}

#[async_trait]
impl Store for SqliteStore {
    async fn upsert_company(&self, evidence: &CompanyEvidence) -> Result<i64, PipelineError> {
        if !evidence.has_identity() {
            return Err(PipelineError::Identity(
                "company evidence has neither website_domain nor normalized_name".into(),
            ));
        }
        let conn = self.conn.lock();
        let now = fmt_ts(Utc::now());

        let existing: Option<CompanyRow> = if let Some(domain) = &evidence.website_domain {
            conn.query_row(
                "SELECT * FROM companies WHERE website_domain = ?1",
                params![domain],
                Self::row_to_company,
            )
            .optional()
            .map_err(store_err)?
        } else {
            None
        };

        let existing = match existing {
            Some(row) => Some(row),
            None => {
                if let Some(name) = &evidence.normalized_name {
                    conn.query_row(
                        "SELECT * FROM companies WHERE normalized_name = ?1 AND website_domain IS NULL",
                        params![name],
                        Self::row_to_company,
                    )
                    .optional()
                    .map_err(store_err)?
                } else {
                    None
                }
            }
        };

        match existing {
            None => {
                conn.execute(
                    "INSERT INTO companies (raw_name, display_name, normalized_name, website_url, website_domain, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                    params![
                        evidence.raw_name,
                        evidence.display_name,
                        evidence.normalized_name,
                        evidence.website_url,
                        evidence.website_domain,
                        now,
                    ],
                )
                .map_err(store_err)?;
                Ok(conn.last_insert_rowid())
            }
            Some(row) => {
                // Monotone enrichment: a non-null incoming field may
                // fill a null existing field; a non-null existing
                // field is never overwritten with null (P2).
                let raw_name = row.raw_name.or_else(|| evidence.raw_name.clone());
                let display_name = row.display_name.or_else(|| evidence.display_name.clone());
                let normalized_name = row.normalized_name.or_else(|| evidence.normalized_name.clone());
                let website_url = row.website_url.or_else(|| evidence.website_url.clone());
                let website_domain = row.website_domain.or_else(|| evidence.website_domain.clone());

                conn.execute(
                    "UPDATE companies SET raw_name = ?1, display_name = ?2, normalized_name = ?3,
                        website_url = ?4, website_domain = ?5, updated_at = ?6 WHERE id = ?7",
                    params![raw_name, display_name, normalized_name, website_url, website_domain, now, row.id],
                )
                .map_err(store_err)?;
                Ok(row.id)
            }
        }
    }

    async fn upsert_company_source(&self, link: &CompanySourceLink) -> Result<i64, PipelineError> {
        let conn = self.conn.lock();
        if let Some(pid) = &link.provider_company_id {
            let existing: Option<i64> = conn
                .query_row(
                    "SELECT id FROM company_sources WHERE provider = ?1 AND provider_company_id = ?2",
                    params![link.provider, pid],
                    |r| r.get(0),
                )
                .optional()
                .map_err(store_err)?;
            if let Some(id) = existing {
                conn.execute(
                    "UPDATE company_sources SET provider_url = ?1, hidden = ?2 WHERE id = ?3",
                    params![link.provider_url, link.hidden as i64, id],
                )
                .map_err(store_err)?;
                return Ok(id);
            }
        }
        conn.execute(
            "INSERT INTO company_sources (company_id, provider, provider_company_id, provider_url, hidden)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![link.company_id, link.provider, link.provider_company_id, link.provider_url, link.hidden as i64],
        )
        .map_err(store_err)?;
        Ok(conn.last_insert_rowid())
    }

    async fn upsert_company_source_by_company_provider(
        &self,
        company_id: i64,
        provider: &str,
        provider_company_id: &str,
        provider_url: &str,
    ) -> Result<i64, PipelineError> {
        let conn = self.conn.lock();
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM company_sources WHERE provider = ?1 AND provider_company_id = ?2",
                params![provider, provider_company_id],
                |r| r.get(0),
            )
            .optional()
            .map_err(store_err)?;
        if let Some(id) = existing {
            let owner: i64 = conn
                .query_row("SELECT company_id FROM company_sources WHERE id = ?1", params![id], |r| r.get(0))
                .map_err(store_err)?;
            if owner != company_id {
                return Err(PipelineError::StoreConflict(format!(
                    "tenant '{provider_company_id}' already claimed by company {owner}"
                )));
            }
            conn.execute(
                "UPDATE company_sources SET provider_url = ?1 WHERE id = ?2",
                params![provider_url, id],
            )
            .map_err(store_err)?;
            return Ok(id);
        }
        conn.execute(
            "INSERT INTO company_sources (company_id, provider, provider_company_id, provider_url, hidden)
             VALUES (?1, ?2, ?3, ?4, 0)",
            params![company_id, provider, provider_company_id, provider_url],
        )
        .map_err(store_err)?;
        Ok(conn.last_insert_rowid())
    }

    async fn upsert_offer(&self, offer: &OfferInput, company_id: i64) -> Result<(i64, bool), PipelineError> {
        let conn = self.conn.lock();
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM offers WHERE provider = ?1 AND provider_offer_id = ?2",
                params![offer.provider, offer.provider_offer_id],
                |r| r.get(0),
            )
            .optional()
            .map_err(store_err)?;

        let now = fmt_ts(Utc::now());
        match existing {
            Some(id) => {
                // Overwrite scalar fields only; canonicalization fields untouched (P3).
                conn.execute(
                    "UPDATE offers SET company_id = ?1, title = ?2, description = ?3, min_requirements = ?4,
                        desired_requirements = ?5, published_at = ?6, updated_at = ?7, application_count = ?8,
                        location = ?9, category = ?10, subcategory = ?11, contract_type = ?12, workday = ?13,
                        experience = ?14, salary = ?15 WHERE id = ?16",
                    params![
                        company_id,
                        offer.title,
                        offer.description,
                        offer.min_requirements,
                        offer.desired_requirements,
                        offer.published_at.map(fmt_ts),
                        offer.updated_at.map(fmt_ts),
                        offer.application_count,
                        offer.location,
                        offer.category,
                        offer.subcategory,
                        offer.contract_type,
                        offer.workday,
                        offer.experience,
                        offer.salary,
                        id,
                    ],
                )
                .map_err(store_err)?;
                Ok((id, false))
            }
            None => {
                conn.execute(
                    "INSERT INTO offers (company_id, provider, provider_offer_id, title, description,
                        min_requirements, desired_requirements, published_at, updated_at, created_at,
                        application_count, location, category, subcategory, contract_type, workday,
                        experience, salary, repost_count)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, 0)",
                    params![
                        company_id,
                        offer.provider,
                        offer.provider_offer_id,
                        offer.title,
                        offer.description,
                        offer.min_requirements,
                        offer.desired_requirements,
                        offer.published_at.map(fmt_ts),
                        offer.updated_at.map(fmt_ts),
                        now,
                        offer.application_count,
                        offer.location,
                        offer.category,
                        offer.subcategory,
                        offer.contract_type,
                        offer.workday,
                        offer.experience,
                        offer.salary,
                    ],
                )
                .map_err(store_err)?;
                Ok((conn.last_insert_rowid(), true))
            }
        }
    }

    async fn mark_duplicate(&self, new_id: i64, canonical_id: i64) -> Result<(), PipelineError> {
        let conn = self.conn.lock();
        let affected = conn
            .execute(
                "UPDATE offers SET canonical_offer_id = ?1 WHERE id = ?2",
                params![canonical_id, new_id],
            )
            .map_err(store_err)?;
        if affected == 0 {
            return Err(PipelineError::Store(format!("offer {new_id} not found")));
        }
        Ok(())
    }

    async fn bump_canonical(&self, canonical_id: i64, last_seen_at: DateTime<Utc>) -> Result<(), PipelineError> {
        let conn = self.conn.lock();
        let affected = conn
            .execute(
                "UPDATE offers SET repost_count = repost_count + 1, last_seen_at = ?1 WHERE id = ?2",
                params![fmt_ts(last_seen_at), canonical_id],
            )
            .map_err(store_err)?;
        if affected == 0 {
            return Err(PipelineError::Store(format!("canonical offer {canonical_id} not found")));
        }
        Ok(())
    }

    async fn set_canonical_self(&self, offer_id: i64, fingerprint: Option<&str>) -> Result<(), PipelineError> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE offers SET canonical_offer_id = NULL, content_fingerprint = ?1, last_seen_at = ?2 WHERE id = ?3",
            params![fingerprint, fmt_ts(Utc::now()), offer_id],
        )
        .map_err(store_err)?;
        Ok(())
    }

    async fn find_canonical_offers_by_fingerprint(
        &self,
        fingerprint: &str,
        company_id: i64,
    ) -> Result<Vec<CandidateOffer>, PipelineError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, title, description, last_seen_at, published_at, updated_at FROM offers
                 WHERE company_id = ?1 AND content_fingerprint = ?2 AND canonical_offer_id IS NULL",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![company_id, fingerprint], |row| {
                Ok(CandidateOffer {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    description: row.get(2)?,
                    last_seen_at: row.get::<_, Option<String>>(3)?.map(parse_ts),
                    published_at: row.get::<_, Option<String>>(4)?.map(parse_ts),
                    updated_at: row.get::<_, Option<String>>(5)?.map(parse_ts),
                })
            })
            .map_err(store_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(store_err)
    }

    async fn upsert_match(&self, input: &MatchInput) -> Result<(), PipelineError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO matches (offer_id, score, top_category_id, reasons_json)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(offer_id) DO UPDATE SET score = excluded.score,
                top_category_id = excluded.top_category_id, reasons_json = excluded.reasons_json",
            params![input.offer_id, input.score, input.top_category_id, input.reasons_json],
        )
        .map_err(store_err)?;
        Ok(())
    }

    async fn list_company_offers_for_aggregation(
        &self,
        company_id: i64,
    ) -> Result<Vec<OfferForAggregation>, PipelineError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT o.id, COALESCE(m.score, 0), m.top_category_id, o.canonical_offer_id,
                        o.repost_count, o.published_at, o.updated_at
                 FROM offers o LEFT JOIN matches m ON m.offer_id = o.id
                 WHERE o.company_id = ?1",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![company_id], |row| {
                Ok(OfferForAggregation {
                    offer_id: row.get(0)?,
                    score: row.get(1)?,
                    top_category_id: row.get(2)?,
                    canonical_offer_id: row.get(3)?,
                    repost_count: row.get(4)?,
                    published_at: row.get::<_, Option<String>>(5)?.map(parse_ts),
                    updated_at: row.get::<_, Option<String>>(6)?.map(parse_ts),
                })
            })
            .map_err(store_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(store_err)
    }

    async fn persist_company_aggregates(
        &self,
        company_id: i64,
        aggregate: &CompanyAggregate,
    ) -> Result<(), PipelineError> {
        let conn = self.conn.lock();
        let category_max_scores_json =
            serde_json::to_string(&aggregate.category_max_scores).map_err(|e| PipelineError::Store(e.to_string()))?;
        conn.execute(
            "UPDATE companies SET unique_offer_count = ?1, offer_count = ?2, max_score = ?3, top_offer_id = ?4,
                top_category_id = ?5, strong_offer_count = ?6, avg_strong_score = ?7, category_max_scores_json = ?8,
                last_strong_at = ?9 WHERE id = ?10",
            params![
                aggregate.unique_offer_count,
                aggregate.offer_count,
                aggregate.max_score,
                aggregate.top_offer_id,
                aggregate.top_category_id,
                aggregate.strong_offer_count,
                aggregate.avg_strong_score,
                category_max_scores_json,
                aggregate.last_strong_at.map(fmt_ts),
                company_id,
            ],
        )
        .map_err(store_err)?;
        Ok(())
    }

    async fn start_ingestion_run(&self, provider: &str, query_fingerprint: Option<&str>) -> Result<i64, PipelineError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO ingestion_runs (provider, query_fingerprint, started_at) VALUES (?1, ?2, ?3)",
            params![provider, query_fingerprint, fmt_ts(Utc::now())],
        )
        .map_err(store_err)?;
        Ok(conn.last_insert_rowid())
    }

    async fn close_ingestion_run(&self, run_id: i64, status: &str, counters: RunCounters) -> Result<(), PipelineError> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE ingestion_runs SET ended_at = ?1, status = ?2, pages_fetched = ?3, offers_fetched = ?4,
                requests_count = ?5, http_429_count = ?6, errors_count = ?7 WHERE id = ?8",
            params![
                fmt_ts(Utc::now()),
                status,
                counters.pages_fetched,
                counters.offers_fetched,
                counters.requests_count,
                counters.http_429_count,
                counters.errors_count,
                run_id,
            ],
        )
        .map_err(store_err)?;
        Ok(())
    }

    async fn record_feedback_event(&self, company_id: i64, value: &str) -> Result<i64, PipelineError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO feedback_events (company_id, value, created_at) VALUES (?1, ?2, ?3)",
            params![company_id, value, fmt_ts(Utc::now())],
        )
        .map_err(store_err)?;
        Ok(conn.last_insert_rowid())
    }

    async fn list_feedback_events(&self, company_id: i64) -> Result<Vec<FeedbackEventRow>, PipelineError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT id, company_id, value, created_at FROM feedback_events WHERE company_id = ?1 ORDER BY created_at ASC")
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![company_id], |row| {
                Ok(FeedbackEventRow {
                    id: row.get(0)?,
                    company_id: row.get(1)?,
                    value: row.get(2)?,
                    created_at: parse_ts(row.get::<_, String>(3)?),
                })
            })
            .map_err(store_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(store_err)
    }

    async fn list_recent_runs(&self, limit: usize) -> Result<Vec<IngestionRunRow>, PipelineError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, provider, query_fingerprint, started_at, ended_at, pages_fetched, offers_fetched,
                        requests_count, http_429_count, errors_count, status
                 FROM ingestion_runs ORDER BY started_at DESC LIMIT ?1",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(IngestionRunRow {
                    id: row.get(0)?,
                    provider: row.get(1)?,
                    query_fingerprint: row.get(2)?,
                    started_at: parse_ts(row.get::<_, String>(3)?),
                    ended_at: row.get::<_, Option<String>>(4)?.map(parse_ts),
                    pages_fetched: row.get(5)?,
                    offers_fetched: row.get(6)?,
                    requests_count: row.get(7)?,
                    http_429_count: row.get(8)?,
                    errors_count: row.get(9)?,
                    status: row.get(10)?,
                })
            })
            .map_err(store_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(store_err)
    }

    async fn companies_needing_discovery(&self, provider: &str) -> Result<Vec<(i64, String)>, PipelineError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT c.id, c.website_url FROM companies c
                 WHERE c.website_url IS NOT NULL
                   AND NOT EXISTS (
                       SELECT 1 FROM company_sources cs WHERE cs.company_id = c.id AND cs.provider = ?1
                   )",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![provider], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(store_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(store_err)
    }

    async fn list_tenants_for_provider(&self, provider: &str) -> Result<Vec<(i64, String)>, PipelineError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT company_id, provider_company_id FROM company_sources
                 WHERE provider = ?1 AND provider_company_id IS NOT NULL AND NOT hidden",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![provider], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(store_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(store_err)
    }

    async fn list_companies_for_export(&self) -> Result<Vec<CompanyExportRow>, PipelineError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, display_name, website_url, unique_offer_count, offer_count, max_score,
                        top_category_id, strong_offer_count, avg_strong_score, last_strong_at
                 FROM companies WHERE offer_count > 0",
            )
            .map_err(store_err)?;
        let rows = stmt
            .query_map(params![], |row| {
                Ok(CompanyExportRow {
                    company_id: row.get(0)?,
                    display_name: row.get(1)?,
                    website_url: row.get(2)?,
                    unique_offer_count: row.get(3)?,
                    offer_count: row.get(4)?,
                    max_score: row.get(5)?,
                    top_category_id: row.get(6)?,
                    strong_offer_count: row.get(7)?,
                    avg_strong_score: row.get(8)?,
                    last_strong_at: row.get::<_, Option<String>>(9)?.map(parse_ts),
                })
            })
            .map_err(store_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(store_err)
    }

    async fn list_company_ids(&self) -> Result<Vec<i64>, PipelineError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id FROM companies").map_err(store_err)?;
        let rows = stmt.query_map(params![], |row| row.get(0)).map_err(store_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(store_err)
    }
}

/// Used by `ingest` to track which companies were touched so
/// aggregation runs exactly once per company per pipeline invocation.
#[derive(Debug, Default)]
pub struct AffectedCompanies {
    ids: std::collections::HashSet<i64>,
}

impl AffectedCompanies {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn record(&mut self, id: i64) {
        self.ids.insert(id);
    }
    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.ids.iter().copied()
    }
}
