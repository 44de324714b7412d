//! Greenhouse ATS provider (spec.md §6 "Provider list endpoints").

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::PipelineError;
use crate::http::{Body, HttpClient, RequestSpec};
use crate::store::models::OfferInput;

use super::{truncate_description, DetectorHit, OfferSummary, Provider, ProviderKind, SearchResult, MAX_JOBS_PER_TENANT};

static TENANT_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https?://(?:boards|boards-api)\.greenhouse\.io/(?:v1/boards/)?([a-zA-Z0-9][a-zA-Z0-9\-]*)").unwrap()
});

#[derive(Debug, Clone, Deserialize)]
struct GreenhouseLocation {
    name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct GreenhouseMetadata {
    name: String,
    value: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct GreenhouseJob {
    id: i64,
    title: String,
    #[allow(dead_code)]
    absolute_url: Option<String>,
    updated_at: Option<String>,
    location: Option<GreenhouseLocation>,
    content: Option<String>,
    #[serde(default)]
    metadata: Vec<GreenhouseMetadata>,
}

#[derive(Debug, Deserialize)]
struct GreenhouseJobsResponse {
    jobs: Vec<GreenhouseJob>,
}

pub struct GreenhouseProvider {
    client: Arc<HttpClient>,
    api_base_url: String,
    cache: Mutex<HashMap<String, Vec<GreenhouseJob>>>,
}

impl GreenhouseProvider {
    pub fn new(client: Arc<HttpClient>, api_base_url: String) -> Self {
        Self {
            client,
            api_base_url,
            cache: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait::async_trait]
impl Provider for GreenhouseProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Greenhouse
    }

    async fn list_offers_for_tenant(&self, tenant_key: &str) -> Result<SearchResult, PipelineError> {
        let url = format!("{}/boards/{}/jobs", self.api_base_url, tenant_key);
        let spec = RequestSpec {
            query: &[("content", "true")],
            ..Default::default()
        };
        let body = self
            .client
            .get(&url, &spec)
            .await
            .map_err(|e| PipelineError::Transport(e.to_string()))?;

        let mut response: GreenhouseJobsResponse = match body {
            Body::Json(v) => serde_json::from_value(v).map_err(|e| PipelineError::Mapping(e.to_string()))?,
            Body::Empty => GreenhouseJobsResponse { jobs: Vec::new() },
            Body::Text(_) => return Err(PipelineError::Mapping("expected JSON jobs response".into())),
        };

        response.jobs.sort_by_key(|j| j.id);
        response.jobs.truncate(MAX_JOBS_PER_TENANT);

        let offers = response
            .jobs
            .iter()
            .map(|j| OfferSummary {
                provider_offer_id: j.id.to_string(),
                title: j.title.clone(),
                sort_key: j.id,
            })
            .collect();

        self.cache.lock().insert(tenant_key.to_string(), response.jobs);
        Ok(SearchResult { offers })
    }

    async fn hydrate_offer_details(
        &self,
        tenant_key: &str,
        offers: &[OfferSummary],
    ) -> Vec<Result<OfferInput, PipelineError>> {
        let cache = self.cache.lock();
        let Some(jobs) = cache.get(tenant_key) else {
            return offers
                .iter()
                .map(|_| Err(PipelineError::Mapping("tenant not listed before hydrate".into())))
                .collect();
        };

        offers
            .iter()
            .map(|summary| {
                jobs.iter()
                    .find(|j| j.id.to_string() == summary.provider_offer_id)
                    .ok_or_else(|| PipelineError::Mapping(format!("job {} missing from cache", summary.provider_offer_id)))
                    .and_then(map_job)
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

fn metadata_str(metadata: &[GreenhouseMetadata], name: &str) -> Option<String> {
    metadata.iter().find(|m| m.name.eq_ignore_ascii_case(name)).and_then(|m| match &m.value {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Array(items)) => {
            let joined: Vec<String> = items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect();
            if joined.is_empty() {
                None
            } else {
                Some(joined.join(", "))
            }
        }
        _ => None,
    })
}

fn map_job(j: &GreenhouseJob) -> Result<OfferInput, PipelineError> {
    let content = j
        .content
        .clone()
        .ok_or_else(|| PipelineError::Mapping(format!("greenhouse job {} missing content", j.id)))?;
    let description = strip_html_tags(&content);

    let updated_at: Option<DateTime<Utc>> = j
        .updated_at
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Ok(OfferInput {
        provider: "greenhouse".into(),
        provider_offer_id: j.id.to_string(),
        title: j.title.clone(),
        description: truncate_description(&description),
        min_requirements: None,
        desired_requirements: None,
        published_at: None,
        updated_at,
        application_count: None,
        location: j.location.as_ref().and_then(|l| l.name.clone()),
        category: metadata_str(&j.metadata, "Department"),
        subcategory: None,
        contract_type: metadata_str(&j.metadata, "Employment Type"),
        workday: None,
        experience: metadata_str(&j.metadata, "Experience"),
        salary: None,
    })
}

/// Greenhouse `content` is HTML; strip tags for the plain-text
/// description the matcher/scorer consume.
fn strip_html_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detector_extracts_tenant_slug_for_boards_host() {
        let client = Arc::new(HttpClient::new("test", std::time::Duration::from_secs(5)).unwrap());
        let provider = GreenhouseProvider::new(client, "https://boards-api.greenhouse.io/v1".into());
        let html = r#"<a href="https://boards.greenhouse.io/acme">Careers</a>"#;
        let hit = provider.detect(html).unwrap();
        assert_eq!(hit.tenant_key, "acme");
    }

    #[test]
    fn detector_matches_api_subdomain_variant() {
        let client = Arc::new(HttpClient::new("test", std::time::Duration::from_secs(5)).unwrap());
        let provider = GreenhouseProvider::new(client, "https://boards-api.greenhouse.io/v1".into());
        let html = r#"https://boards-api.greenhouse.io/v1/boards/acme/jobs"#;
        let hit = provider.detect(html).unwrap();
        assert_eq!(hit.tenant_key, "acme");
    }

    #[test]
    fn strip_html_tags_removes_markup_only() {
        assert_eq!(strip_html_tags("<p>Hello <b>World</b></p>"), "Hello World");
    }

    #[test]
    fn map_job_requires_content() {
        let job = GreenhouseJob {
            id: 1,
            title: "Engineer".into(),
            absolute_url: None,
            updated_at: None,
            location: None,
            content: None,
            metadata: vec![],
        };
        assert!(map_job(&job).is_err());
    }

    #[test]
    fn metadata_str_joins_array_values() {
        let metadata = vec![GreenhouseMetadata {
            name: "Department".into(),
            value: Some(Value::Array(vec![Value::String("Engineering".into()), Value::String("Platform".into())])),
        }];
        assert_eq!(metadata_str(&metadata, "department"), Some("Engineering, Platform".into()));
    }
}
