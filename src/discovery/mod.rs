//! ATS discovery (C9): given a company's website URL, find whether it
//! runs an ATS we recognize, and which tenant. Pure async pipeline —
//! no shared mutable state beyond local accumulators (spec.md §4.9).

pub mod candidates;
pub mod links;

use std::collections::HashSet;

use tracing::{info, warn};
use url::Url;

use crate::http::{Body, HttpClient, RequestSpec};
use crate::providers::{DetectorHit, Provider, ProviderKind};
use crate::store::{RunCounters, Store};

/// Primary-sweep and follow-page HTML is truncated to this many
/// characters before being handed to a detector.
pub const MAX_HTML_CHARS: usize = 200_000;

#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryResult {
    Found {
        provider: ProviderKind,
        tenant_key: String,
        evidence_url: String,
    },
    NotFound,
    Error(String),
}

fn normalize_base_url(website_url: &str) -> Result<(Url, String), String> {
    let parsed = Url::parse(website_url)
        .or_else(|_| Url::parse(&format!("https://{website_url}")))
        .map_err(|e| format!("unparseable website_url '{website_url}': {e}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| format!("website_url '{website_url}' has no host"))?;
    if !host.contains('.') {
        return Err(format!("host '{host}' lacks a dot"));
    }
    let base = format!("{}://{}", parsed.scheme(), host);
    let base_url = Url::parse(&base).map_err(|e| format!("failed to build base url: {e}"))?;
    Ok((base_url, base))
}

async fn fetch_html(client: &HttpClient, url: &str) -> Option<String> {
    let spec = RequestSpec::default();
    match client.get(url, &spec).await {
        Ok(Body::Text(t)) => Some(t),
        Ok(Body::Json(v)) => Some(v.to_string()),
        Ok(Body::Empty) => None,
        Err(e) => {
            warn!(%url, error = %e, "discovery fetch failed");
            None
        }
    }
}

fn run_detectors(providers: &[&dyn Provider], html: &str) -> Option<(ProviderKind, DetectorHit)> {
    let cap = html.len().min(MAX_HTML_CHARS);
    let slice = &html[..cap];
    for provider in providers {
        if let Some(hit) = provider.detect(slice) {
            return Some((provider.kind(), hit));
        }
    }
    None
}

/// Run the full discovery pipeline for one company's website URL.
pub async fn discover_ats(client: &HttpClient, providers: &[&dyn Provider], website_url: &str) -> DiscoveryResult {
    let (base_url, base) = match normalize_base_url(website_url) {
        Ok(v) => v,
        Err(e) => return DiscoveryResult::Error(e),
    };

    let candidate_list = candidates::candidate_urls(&base);
    let mut already_checked: HashSet<String> = candidate_list.iter().cloned().collect();
    let mut fetched_pages: Vec<(String, String)> = Vec::new();

    for candidate in &candidate_list {
        let Some(html) = fetch_html(client, candidate).await else {
            continue;
        };
        if let Some((provider, hit)) = run_detectors(providers, &html) {
            info!(%candidate, provider = provider.as_str(), tenant = %hit.tenant_key, "ats discovery hit on primary sweep");
            return DiscoveryResult::Found {
                provider,
                tenant_key: hit.tenant_key,
                evidence_url: hit.evidence_url,
            };
        }
        fetched_pages.push((candidate.clone(), html));
    }

    let mut follow_urls: Vec<Url> = Vec::new();
    let mut follow_seen: HashSet<String> = HashSet::new();
    for (_, html) in &fetched_pages {
        for url in links::gather_follow_candidates(&base_url, html, &already_checked) {
            let key = url.as_str().to_string();
            if follow_seen.insert(key.clone()) {
                already_checked.insert(key);
                follow_urls.push(url);
                if follow_urls.len() >= links::MAX_LINKS_TO_FOLLOW {
                    break;
                }
            }
        }
        if follow_urls.len() >= links::MAX_LINKS_TO_FOLLOW {
            break;
        }
    }

    for url in follow_urls {
        let Some(html) = fetch_html(client, url.as_str()).await else {
            continue;
        };
        if let Some((provider, hit)) = run_detectors(providers, &html) {
            info!(url = %url, provider = provider.as_str(), tenant = %hit.tenant_key, "ats discovery hit on 1-hop follow");
            return DiscoveryResult::Found {
                provider,
                tenant_key: hit.tenant_key,
                evidence_url: hit.evidence_url,
            };
        }
    }

    DiscoveryResult::NotFound
}

/// Batch runner: discover ATS for every company needing it, and
/// persist `found` results. Spec.md §4.9 "Persistence".
pub async fn discover_and_persist_batch(
    store: &dyn Store,
    client: &HttpClient,
    providers: &[&dyn Provider],
    provider_filter: ProviderKind,
) -> RunCounters {
    let mut counters = RunCounters::default();
    let companies = match store.companies_needing_discovery(provider_filter.as_str()).await {
        Ok(rows) => rows,
        Err(e) => {
            warn!(error = %e, "failed listing companies needing discovery");
            counters.errors_count += 1;
            return counters;
        }
    };

    for (company_id, website_url) in companies {
        counters.requests_count += 1;
        match discover_ats(client, providers, &website_url).await {
            DiscoveryResult::Found {
                provider,
                tenant_key,
                evidence_url,
            } => {
                let result = store
                    .upsert_company_source_by_company_provider(company_id, provider.as_str(), &tenant_key, &evidence_url)
                    .await;
                match result {
                    Ok(_) => {}
                    Err(e) if e.is_store_conflict() => {
                        warn!(company_id, tenant = %tenant_key, "discovery persistConflict: tenant already claimed");
                    }
                    Err(e) => {
                        warn!(company_id, error = %e, "failed persisting discovery result");
                        counters.errors_count += 1;
                    }
                }
            }
            DiscoveryResult::NotFound => {}
            DiscoveryResult::Error(msg) => {
                warn!(company_id, %msg, "discovery error for company");
                counters.errors_count += 1;
            }
        }
    }

    counters
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_rejects_unparseable_url() {
        assert!(normalize_base_url("").is_err());
    }

    #[test]
    fn normalize_rejects_host_without_dot() {
        assert!(normalize_base_url("https://localhost").is_err());
    }

    #[test]
    fn normalize_strips_path_and_keeps_scheme_host() {
        let (_, base) = normalize_base_url("https://www.acme.com/careers?x=1").unwrap();
        assert_eq!(base, "https://www.acme.com");
    }
}
