//! Pattern (a): single-page extraction. Anchor tags on one listing
//! page are filtered down to external company links directly.

use url::Url;

use crate::http::{Body, HttpClient, RequestSpec};
use crate::identity::CompanyEvidence;

use super::{cap_and_dedupe, company_from_link, extract_anchors, is_external_company_link};

pub struct SinglePageSource {
    pub name: &'static str,
    pub listing_url: String,
    pub company_cap: usize,
}

impl SinglePageSource {
    pub async fn fetch_companies(&self, client: &HttpClient) -> anyhow::Result<Vec<CompanyEvidence>> {
        let base = Url::parse(&self.listing_url)?;
        let source_host = base.host_str().unwrap_or_default().to_lowercase();

        let spec = RequestSpec::default();
        let html = match client.get(&self.listing_url, &spec).await {
            Ok(Body::Text(t)) => t,
            Ok(Body::Json(v)) => v.to_string(),
            Ok(Body::Empty) => return Ok(Vec::new()),
            Err(e) => anyhow::bail!("failed to fetch {}: {e}", self.listing_url),
        };

        let candidates: Vec<CompanyEvidence> = extract_anchors(&html)
            .into_iter()
            .filter_map(|link| {
                let resolved = is_external_company_link(&base, &link.href, &source_host)?;
                Some(company_from_link(&link.anchor_text, &resolved))
            })
            .collect();

        Ok(cap_and_dedupe(candidates, self.company_cap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetch_companies_extracts_and_caps_external_links() {
        // No network call needed for the parsing logic; exercised via directory::tests.
        let html = r#"<a href="https://acme.com">Acme</a><a href="https://directory.example/about">About</a>"#;
        let base = Url::parse("https://directory.example").unwrap();
        let source_host = "directory.example";
        let candidates: Vec<CompanyEvidence> = extract_anchors(html)
            .into_iter()
            .filter_map(|link| {
                let resolved = is_external_company_link(&base, &link.href, source_host)?;
                Some(company_from_link(&link.anchor_text, &resolved))
            })
            .collect();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].website_domain.as_deref(), Some("acme.com"));
    }
}
