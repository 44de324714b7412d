//! Lever ATS provider (spec.md §6 "Provider list endpoints").

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde::Deserialize;

use crate::error::PipelineError;
use crate::http::{Body, HttpClient, RequestSpec};
use crate::store::models::OfferInput;

use super::{epoch_ms_to_datetime, truncate_description, DetectorHit, OfferSummary, Provider, ProviderKind, SearchResult, MAX_JOBS_PER_TENANT};

static TENANT_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://jobs\.lever\.co/([a-zA-Z0-9][a-zA-Z0-9\-]*)").unwrap());

#[derive(Debug, Clone, Deserialize)]
struct LeverCategories {
    location: Option<String>,
    department: Option<String>,
    #[allow(dead_code)]
    team: Option<String>,
    commitment: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct LeverListItem {
    #[allow(dead_code)]
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct LeverPosting {
    id: String,
    text: String,
    #[serde(rename = "hostedUrl")]
    hosted_url: Option<String>,
    #[serde(rename = "createdAt")]
    created_at: Option<i64>,
    categories: Option<LeverCategories>,
    description: Option<String>,
    #[serde(rename = "descriptionPlain")]
    description_plain: Option<String>,
    #[serde(default)]
    lists: Vec<LeverListItem>,
    additional: Option<String>,
    #[serde(rename = "additionalPlain")]
    additional_plain: Option<String>,
}

pub struct LeverProvider {
    client: Arc<HttpClient>,
    api_base_url: String,
    cache: Mutex<HashMap<String, Vec<LeverPosting>>>,
}

impl LeverProvider {
    pub fn new(client: Arc<HttpClient>, api_base_url: String) -> Self {
        Self {
            client,
            api_base_url,
            cache: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait::async_trait]
impl Provider for LeverProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Lever
    }

    async fn list_offers_for_tenant(&self, tenant_key: &str) -> Result<SearchResult, PipelineError> {
        let url = format!("{}/postings/{}", self.api_base_url, tenant_key);
        let spec = RequestSpec {
            query: &[("mode", "json")],
            ..Default::default()
        };
        let body = self
            .client
            .get(&url, &spec)
            .await
            .map_err(|e| PipelineError::Transport(e.to_string()))?;

        let mut postings: Vec<LeverPosting> = match body {
            Body::Json(v) => serde_json::from_value(v).map_err(|e| PipelineError::Mapping(e.to_string()))?,
            Body::Empty => Vec::new(),
            Body::Text(_) => return Err(PipelineError::Mapping("expected JSON posting list".into())),
        };

        postings.sort_by(|a, b| a.id.cmp(&b.id));
        postings.truncate(MAX_JOBS_PER_TENANT);

        let offers = postings
            .iter()
            .map(|p| OfferSummary {
                provider_offer_id: p.id.clone(),
                title: p.text.clone(),
                sort_key: p.id.parse::<i64>().unwrap_or(0),
            })
            .collect();

        self.cache.lock().insert(tenant_key.to_string(), postings);
        Ok(SearchResult { offers })
    }

    async fn hydrate_offer_details(
        &self,
        tenant_key: &str,
        offers: &[OfferSummary],
    ) -> Vec<Result<OfferInput, PipelineError>> {
        let cache = self.cache.lock();
        let Some(postings) = cache.get(tenant_key) else {
            return offers
                .iter()
                .map(|_| Err(PipelineError::Mapping("tenant not listed before hydrate".into())))
                .collect();
        };

        offers
            .iter()
            .map(|summary| {
                postings
                    .iter()
                    .find(|p| p.id == summary.provider_offer_id)
                    .ok_or_else(|| PipelineError::Mapping(format!("posting {} missing from cache", summary.provider_offer_id)))
                    .and_then(map_posting)
            })
            .collect()
    }

    fn detect(&self, html: &str) -> Option<DetectorHit> {
        let cap = html.len().min(crate::discovery::MAX_HTML_CHARS);
        let slice = &html[..cap];
        let caps = TENANT_URL_RE.captures(slice)?;
        let tenant_key = caps.get(1)?.as_str().to_string();
        let evidence_url = caps.get(0)?.as_str().to_string();
        Some(DetectorHit { tenant_key, evidence_url })
    }
}

fn map_posting(p: &LeverPosting) -> Result<OfferInput, PipelineError> {
    let description = p
        .description_plain
        .clone()
        .or_else(|| p.description.clone())
        .ok_or_else(|| PipelineError::Mapping(format!("lever posting {} missing description", p.id)))?;

    let mut full_description = description;
    for item in &p.lists {
        if let Some(content) = &item.text {
            full_description.push_str("\n\n");
            full_description.push_str(content);
        }
    }
    if let Some(additional) = p.additional_plain.clone().or_else(|| p.additional.clone()) {
        full_description.push_str("\n\n");
        full_description.push_str(&additional);
    }

    let published_at: Option<DateTime<Utc>> = p.created_at.and_then(epoch_ms_to_datetime);

    Ok(OfferInput {
        provider: "lever".into(),
        provider_offer_id: p.id.clone(),
        title: p.text.clone(),
        description: truncate_description(&full_description),
        min_requirements: None,
        desired_requirements: None,
        published_at,
        updated_at: None,
        application_count: None,
        location: p.categories.as_ref().and_then(|c| c.location.clone()),
        category: p.categories.as_ref().and_then(|c| c.department.clone()),
        subcategory: None,
        contract_type: p.categories.as_ref().and_then(|c| c.commitment.clone()),
        workday: None,
        experience: None,
        salary: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detector_extracts_tenant_slug() {
        let client = Arc::new(HttpClient::new("test", std::time::Duration::from_secs(5)).unwrap());
        let provider = LeverProvider::new(client, "https://api.lever.co/v0".into());
        let html = r#"<a href="https://jobs.lever.co/rackspace">Careers</a>"#;
        let hit = provider.detect(html).unwrap();
        assert_eq!(hit.tenant_key, "rackspace");
        assert_eq!(hit.evidence_url, "https://jobs.lever.co/rackspace");
    }

    #[test]
    fn detector_returns_none_without_match() {
        let client = Arc::new(HttpClient::new("test", std::time::Duration::from_secs(5)).unwrap());
        let provider = LeverProvider::new(client, "https://api.lever.co/v0".into());
        assert!(provider.detect("<a href=\"https://example.com\">hi</a>").is_none());
    }

    #[test]
    fn map_posting_concatenates_lists_and_additional() {
        let posting = LeverPosting {
            id: "1".into(),
            text: "Engineer".into(),
            hosted_url: None,
            created_at: Some(1_700_000_000_000),
            categories: Some(LeverCategories {
                location: Some("Remote".into()),
                department: Some("Engineering".into()),
                team: None,
                commitment: Some("Full-time".into()),
            }),
            description: None,
            description_plain: Some("Build things.".into()),
            lists: vec![LeverListItem { text: Some("Requirements: Rust".into()) }],
            additional: None,
            additional_plain: Some("Benefits included.".into()),
        };
        let offer = map_posting(&posting).unwrap();
        assert!(offer.description.contains("Build things."));
        assert!(offer.description.contains("Requirements: Rust"));
        assert!(offer.description.contains("Benefits included."));
        assert_eq!(offer.location, Some("Remote".into()));
    }

    #[test]
    fn map_posting_fails_without_any_description() {
        let posting = LeverPosting {
            id: "2".into(),
            text: "Engineer".into(),
            hosted_url: None,
            created_at: None,
            categories: None,
            description: None,
            description_plain: None,
            lists: vec![],
            additional: None,
            additional_plain: None,
        };
        assert!(map_posting(&posting).is_err());
    }
}
