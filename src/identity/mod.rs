//! Identity resolver (C7): company name normalization, domain
//! extraction, and URL picking. Pure — used by both the directory
//! scrapers and the ingestion pipeline to derive `CompanyEvidence`.

use url::Url;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompanyEvidence {
    pub raw_name: Option<String>,
    pub display_name: Option<String>,
    pub normalized_name: Option<String>,
    pub website_url: Option<String>,
    pub website_domain: Option<String>,
}

impl CompanyEvidence {
    pub fn has_identity(&self) -> bool {
        self.website_domain.is_some() || self.normalized_name.is_some()
    }
}

/// Normalize a company's display name to the fallback identity key:
/// lowercase, collapse whitespace, strip a small set of common
/// corporate suffixes.
pub fn normalize_company_name(name: &str) -> Option<String> {
    const SUFFIXES: &[&str] = &[
        "inc", "inc.", "llc", "llc.", "ltd", "ltd.", "corp", "corp.", "co", "co.", "sa", "s.a.",
        "gmbh", "plc", "limited", "corporation", "company",
    ];
    let lowered = name.trim().to_lowercase();
    if lowered.is_empty() {
        return None;
    }
    let mut words: Vec<&str> = lowered.split_whitespace().collect();
    while let Some(last) = words.last() {
        let stripped = last.trim_end_matches(',');
        if SUFFIXES.contains(&stripped) {
            words.pop();
        } else {
            break;
        }
    }
    let normalized = words.join(" ");
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

/// Extract the strong identity key from a website URL: lowercase host,
/// leading "www." stripped, must contain a dot.
pub fn extract_domain(website_url: &str) -> Option<String> {
    let url = Url::parse(website_url)
        .or_else(|_| Url::parse(&format!("https://{website_url}")))
        .ok()?;
    let host = url.host_str()?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    if host.contains('.') {
        Some(host.to_string())
    } else {
        None
    }
}

/// Build `CompanyEvidence` from whatever a scraper/provider happened to
/// capture, computing both identity keys from the raw inputs.
pub fn build_evidence(
    raw_name: Option<String>,
    display_name: Option<String>,
    website_url: Option<String>,
) -> CompanyEvidence {
    let website_domain = website_url.as_deref().and_then(extract_domain);
    let normalized_name = display_name
        .as_deref()
        .or(raw_name.as_deref())
        .and_then(normalize_company_name);

    CompanyEvidence {
        raw_name,
        display_name,
        normalized_name,
        website_url,
        website_domain,
    }
}

/// Pick the "best" website URL among several candidates scraped from a
/// page: prefer https over http, prefer shorter paths (closer to the
/// site root), and otherwise keep input order.
pub fn pick_website_url(candidates: &[String]) -> Option<&str> {
    let parsed: Vec<(&str, Url)> = candidates
        .iter()
        .filter_map(|c| Url::parse(c).ok().map(|u| (c.as_str(), u)))
        .collect();

    parsed
        .iter()
        .fold(None::<&(&str, Url)>, |acc, candidate| match acc {
            None => Some(candidate),
            Some(best) => {
                let score = |u: &Url| (u.scheme() == "https", -(u.path().len() as i64));
                if score(&candidate.1) > score(&best.1) {
                    Some(candidate)
                } else {
                    Some(best)
                }
            }
        })
        .map(|(raw, _)| *raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_domain_stripping_www_and_lowercasing() {
        assert_eq!(extract_domain("https://WWW.Example.com/careers").unwrap(), "example.com");
        assert_eq!(extract_domain("https://example.com").unwrap(), "example.com");
    }

    #[test]
    fn rejects_host_without_dot() {
        assert_eq!(extract_domain("https://localhost"), None);
    }

    #[test]
    fn normalizes_name_strips_corporate_suffix() {
        assert_eq!(normalize_company_name("Acme Corp."), Some("acme".to_string()));
        assert_eq!(normalize_company_name("Acme Inc"), Some("acme".to_string()));
        assert_eq!(normalize_company_name("  "), None);
    }

    #[test]
    fn evidence_has_identity_requires_one_key() {
        let none = CompanyEvidence::default();
        assert!(!none.has_identity());
        let with_domain = build_evidence(None, None, Some("https://acme.com".into()));
        assert!(with_domain.has_identity());
    }

    #[test]
    fn pick_website_url_prefers_https_then_shorter_path() {
        let candidates = vec![
            "http://acme.com/about".to_string(),
            "https://acme.com".to_string(),
            "https://acme.com/long/path/here".to_string(),
        ];
        assert_eq!(pick_website_url(&candidates), Some("https://acme.com"));
    }
}
