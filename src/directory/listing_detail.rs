//! Pattern (b): listing + detail pages. An anchor filter on the
//! listing page identifies detail-page URLs; each detail page is
//! fetched and its external website links extracted.

use regex::Regex;
use url::Url;

use crate::http::{Body, HttpClient, RequestSpec};
use crate::identity::CompanyEvidence;

use super::{cap_and_dedupe, company_from_link, extract_anchors, is_external_company_link};

pub struct ListingDetailSource {
    pub name: &'static str,
    pub listing_url: String,
    /// Matches the path of a detail-page anchor on the listing page.
    pub detail_path_pattern: Regex,
    pub company_cap: usize,
    pub per_detail_page_website_cap: usize,
    pub max_detail_pages: usize,
}

impl ListingDetailSource {
    pub async fn fetch_companies(&self, client: &HttpClient) -> anyhow::Result<Vec<CompanyEvidence>> {
        let base = Url::parse(&self.listing_url)?;
        let source_host = base.host_str().unwrap_or_default().to_lowercase();

        let listing_html = match client.get(&self.listing_url, &RequestSpec::default()).await {
            Ok(Body::Text(t)) => t,
            Ok(Body::Json(v)) => v.to_string(),
            Ok(Body::Empty) => return Ok(Vec::new()),
            Err(e) => anyhow::bail!("failed to fetch listing {}: {e}", self.listing_url),
        };

        let mut detail_urls: Vec<Url> = Vec::new();
        for link in extract_anchors(&listing_html) {
            if !self.detail_path_pattern.is_match(&link.href) {
                continue;
            }
            let Ok(resolved) = base.join(&link.href) else { continue };
            if detail_urls.iter().any(|u| u.as_str() == resolved.as_str()) {
                continue;
            }
            detail_urls.push(resolved);
            if detail_urls.len() >= self.max_detail_pages {
                break;
            }
        }

        let mut candidates: Vec<CompanyEvidence> = Vec::new();
        for detail_url in detail_urls {
            let html = match client.get(detail_url.as_str(), &RequestSpec::default()).await {
                Ok(Body::Text(t)) => t,
                Ok(Body::Json(v)) => v.to_string(),
                Ok(Body::Empty) => continue,
                Err(_) => continue,
            };

            let per_page: Vec<CompanyEvidence> = extract_anchors(&html)
                .into_iter()
                .filter_map(|link| {
                    let resolved = is_external_company_link(&detail_url, &link.href, &source_host)?;
                    Some(company_from_link(&link.anchor_text, &resolved))
                })
                .take(self.per_detail_page_website_cap)
                .collect();
            candidates.extend(per_page);
        }

        Ok(cap_and_dedupe(candidates, self.company_cap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_path_pattern_filters_listing_anchors() {
        let pattern = Regex::new(r"^/companies/[a-z0-9\-]+$").unwrap();
        assert!(pattern.is_match("/companies/acme-inc"));
        assert!(!pattern.is_match("/about"));
    }

    #[test]
    fn per_detail_page_cap_limits_extracted_links() {
        let html = r#"<a href="https://a.com">A</a><a href="https://b.com">B</a><a href="https://c.com">C</a>"#;
        let base = Url::parse("https://directory.example/companies/acme").unwrap();
        let links: Vec<_> = extract_anchors(html)
            .into_iter()
            .filter_map(|link| is_external_company_link(&base, &link.href, "directory.example"))
            .take(2)
            .collect();
        assert_eq!(links.len(), 2);
    }
}
