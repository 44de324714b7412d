//! Generic aggregator-API provider: an external paginated job search
//! API, not tied to a specific company (unlike the ATS providers).
//! The wire shape is implementation-defined per spec.md §6 "Provider
//! list endpoints" (only Lever/Greenhouse are pinned); this mapper
//! targets a common shape seen across public job-search aggregators:
//! a flat array of postings carrying the employer's name and site.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;

use crate::error::PipelineError;
use crate::http::{Body, HttpClient, RequestSpec};
use crate::identity::{build_evidence, CompanyEvidence};
use crate::store::models::OfferInput;

use super::{truncate_description, MAX_JOBS_PER_TENANT};

#[derive(Debug, Clone, Deserialize)]
struct AggregatorPosting {
    id: String,
    title: String,
    description: Option<String>,
    company_name: Option<String>,
    company_website: Option<String>,
    location: Option<String>,
    posted_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AggregatorSearchResponse {
    #[serde(default)]
    results: Vec<AggregatorPosting>,
    #[serde(default)]
    next_page: Option<u32>,
}

pub struct AggregatorApiProvider {
    client: Arc<HttpClient>,
    api_base_url: String,
    api_key: String,
    cache: Mutex<HashMap<String, Vec<AggregatorPosting>>>,
}

impl AggregatorApiProvider {
    pub fn new(client: Arc<HttpClient>, api_base_url: String, api_key: String) -> Self {
        Self {
            client,
            api_base_url,
            api_key,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Run a single keyword search, paginating until the result cap or
    /// until the API stops returning a `next_page`.
    pub async fn search(&self, query: &str, max_pages: usize) -> Result<Vec<(Option<CompanyEvidence>, OfferInput)>, PipelineError> {
        let mut all_postings = Vec::new();
        let mut page: u32 = 1;

        for _ in 0..max_pages {
            let page_str = page.to_string();
            let spec = RequestSpec {
                query: &[("q", query), ("page", &page_str)],
                headers: &[("Authorization", &format!("Bearer {}", self.api_key))],
                ..Default::default()
            };
            let body = self
                .client
                .get(&format!("{}/search", self.api_base_url), &spec)
                .await
                .map_err(|e| {
                    if e.status == 401 || e.status == 403 {
                        PipelineError::Protocol { status: e.status, message: e.to_string() }
                    } else {
                        PipelineError::Transport(e.to_string())
                    }
                })?;

            let response: AggregatorSearchResponse = match body {
                Body::Json(v) => serde_json::from_value(v).map_err(|e| PipelineError::Mapping(e.to_string()))?,
                Body::Empty => break,
                Body::Text(_) => return Err(PipelineError::Mapping("expected JSON search response".into())),
            };

            let has_more = response.next_page.is_some();
            all_postings.extend(response.results);
            if all_postings.len() >= MAX_JOBS_PER_TENANT || !has_more {
                break;
            }
            page += 1;
        }

        all_postings.truncate(MAX_JOBS_PER_TENANT);
        self.cache.lock().insert(query.to_string(), all_postings.clone());

        Ok(all_postings
            .iter()
            .filter_map(|p| map_posting(p).ok())
            .collect())
    }
}

fn map_posting(p: &AggregatorPosting) -> Result<(Option<CompanyEvidence>, OfferInput), PipelineError> {
    let description = p
        .description
        .clone()
        .ok_or_else(|| PipelineError::Mapping(format!("aggregator posting {} missing description", p.id)))?;

    let evidence = build_evidence(p.company_name.clone(), p.company_name.clone(), p.company_website.clone());

    let published_at = p
        .posted_at
        .as_deref()
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc));

    let offer = OfferInput {
        provider: "aggregator".into(),
        provider_offer_id: p.id.clone(),
        title: p.title.clone(),
        description: truncate_description(&description),
        min_requirements: None,
        desired_requirements: None,
        published_at,
        updated_at: None,
        application_count: None,
        location: p.location.clone(),
        category: None,
        subcategory: None,
        contract_type: None,
        workday: None,
        experience: None,
        salary: None,
    };

    Ok((Some(evidence), offer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_posting_requires_description() {
        let posting = AggregatorPosting {
            id: "1".into(),
            title: "Engineer".into(),
            description: None,
            company_name: Some("Acme".into()),
            company_website: Some("https://acme.com".into()),
            location: None,
            posted_at: None,
        };
        assert!(map_posting(&posting).is_err());
    }

    #[test]
    fn map_posting_derives_company_evidence() {
        let posting = AggregatorPosting {
            id: "1".into(),
            title: "Engineer".into(),
            description: Some("Build things.".into()),
            company_name: Some("Acme Inc".into()),
            company_website: Some("https://acme.com".into()),
            location: None,
            posted_at: None,
        };
        let (evidence, offer) = map_posting(&posting).unwrap();
        let evidence = evidence.unwrap();
        assert_eq!(evidence.website_domain.as_deref(), Some("acme.com"));
        assert_eq!(offer.provider, "aggregator");
    }
}
