//! Row-shaped structs for the embedded store. Mirrors the entities in
//! spec.md §3.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyRow {
    pub id: i64,
    pub raw_name: Option<String>,
    pub display_name: Option<String>,
    pub normalized_name: Option<String>,
    pub website_url: Option<String>,
    pub website_domain: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanySourceRow {
    pub id: i64,
    pub company_id: i64,
    pub provider: String,
    pub provider_company_id: Option<String>,
    pub provider_url: Option<String>,
    pub hidden: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferInput {
    pub provider: String,
    pub provider_offer_id: String,
    pub title: String,
    pub description: String,
    pub min_requirements: Option<String>,
    pub desired_requirements: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub application_count: Option<i64>,
    pub location: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub contract_type: Option<String>,
    pub workday: Option<String>,
    pub experience: Option<String>,
    pub salary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferRow {
    pub id: i64,
    pub company_id: i64,
    pub provider: String,
    pub provider_offer_id: String,
    pub title: String,
    pub description: String,
    pub published_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub content_fingerprint: Option<String>,
    pub canonical_offer_id: Option<i64>,
    pub repost_count: i64,
    pub last_seen_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchInput {
    pub offer_id: i64,
    pub score: i32,
    pub top_category_id: Option<String>,
    pub reasons_json: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionRunRow {
    pub id: i64,
    pub provider: String,
    pub query_fingerprint: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub pages_fetched: i64,
    pub offers_fetched: i64,
    pub requests_count: i64,
    pub http_429_count: i64,
    pub errors_count: i64,
    pub status: Option<String>,
}

/// One row of the company-aggregate view consumed by the spreadsheet
/// exporter: the subset of `companies` columns a reviewer needs,
/// without the raw offer/source detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyExportRow {
    pub company_id: i64,
    pub display_name: Option<String>,
    pub website_url: Option<String>,
    pub unique_offer_count: i64,
    pub offer_count: i64,
    pub max_score: i32,
    pub top_category_id: Option<String>,
    pub strong_offer_count: i64,
    pub avg_strong_score: Option<f64>,
    pub last_strong_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackEventRow {
    pub id: i64,
    pub company_id: i64,
    pub value: String,
    pub created_at: DateTime<Utc>,
}
