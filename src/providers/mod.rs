//! Provider polymorphism (spec.md §9 "Polymorphism over providers"):
//! each ATS/aggregator implements `list_offers_for_tenant` and
//! `hydrate_offer_details`; dispatch is a tagged enum, not an ambient
//! registry.

pub mod aggregator_api;
pub mod greenhouse;
pub mod lever;

use chrono::{DateTime, Utc};

use crate::error::PipelineError;
use crate::store::models::OfferInput;

pub const MAX_JOBS_PER_TENANT: usize = 500;
pub const MAX_DESCRIPTION_CHARS: usize = 20_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Lever,
    Greenhouse,
    /// Not an ATS tenant: a paginated job-search aggregator API. Never
    /// produced by `discover_ats` (aggregator search has no tenant
    /// detector), only used to tag ingestion runs and match results.
    Aggregator,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Lever => "lever",
            ProviderKind::Greenhouse => "greenhouse",
            ProviderKind::Aggregator => "aggregator",
        }
    }
}

/// A bare-bones offer summary as returned by a provider's list
/// endpoint, before detail hydration.
#[derive(Debug, Clone)]
pub struct OfferSummary {
    pub provider_offer_id: String,
    pub title: String,
    pub sort_key: i64,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub offers: Vec<OfferSummary>,
}

/// A detector's finding: the tenant this provider believes it found
/// evidence for in some crawled HTML.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorHit {
    pub tenant_key: String,
    pub evidence_url: String,
}

#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Fetch the tenant's full offer list (already sorted ascending by
    /// tenant-scoped id, capped to `MAX_JOBS_PER_TENANT`).
    async fn list_offers_for_tenant(&self, tenant_key: &str) -> Result<SearchResult, PipelineError>;

    /// Hydrate a batch of summaries to full canonical `OfferInput`s.
    /// Mapping errors for individual records are collected, not
    /// propagated — the caller counts and skips them.
    async fn hydrate_offer_details(
        &self,
        tenant_key: &str,
        offers: &[OfferSummary],
    ) -> Vec<Result<OfferInput, PipelineError>>;

    /// Inspect HTML for this provider's tenant-identifying URL
    /// pattern. Implementation-defined regex per spec.md §9.
    fn detect(&self, html: &str) -> Option<DetectorHit>;
}

pub fn truncate_description(s: &str) -> String {
    if s.chars().count() <= MAX_DESCRIPTION_CHARS {
        s.to_string()
    } else {
        s.chars().take(MAX_DESCRIPTION_CHARS).collect()
    }
}

pub fn epoch_ms_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    chrono::DateTime::from_timestamp_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_description_respects_cap() {
        let long = "x".repeat(MAX_DESCRIPTION_CHARS + 100);
        assert_eq!(truncate_description(&long).chars().count(), MAX_DESCRIPTION_CHARS);
    }

    #[test]
    fn truncate_description_leaves_short_text_untouched() {
        assert_eq!(truncate_description("short"), "short");
    }
}
