//! Directory sources (spec.md §6 "Directory sources"): scraping
//! company candidates out of public directory pages. Two ready-to-use
//! patterns are provided; a concrete directory is a thin config over
//! one of them.

pub mod listing_detail;
pub mod single_page;

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::identity::{build_evidence, CompanyEvidence};

/// Hosts never treated as a company's own website, regardless of
/// source: social platforms and the directory sources themselves.
pub const EXCLUDED_DOMAINS: &[&str] = &[
    "linkedin.com",
    "twitter.com",
    "x.com",
    "facebook.com",
    "instagram.com",
    "youtube.com",
    "github.com",
];

pub const MAX_URL_LENGTH: usize = 2048;
const IGNORED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "svg", "webp", "pdf", "zip"];

static ANCHOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<a\b[^>]*\bhref\s*=\s*["']([^"']+)["'][^>]*>(.*?)</a>"#).unwrap());

#[derive(Debug, Clone)]
pub struct ExtractedLink {
    pub href: String,
    pub anchor_text: String,
}

pub fn extract_anchors(html: &str) -> Vec<ExtractedLink> {
    ANCHOR_RE
        .captures_iter(html)
        .filter_map(|c| {
            let href = c.get(1)?.as_str().to_string();
            let anchor_text = strip_tags(c.get(2)?.as_str());
            Some(ExtractedLink { href, anchor_text })
        })
        .collect()
}

fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.trim().to_string()
}

fn has_ignored_extension(path: &str) -> bool {
    let lower = path.to_lowercase();
    IGNORED_EXTENSIONS.iter().any(|ext| lower.ends_with(&format!(".{ext}")))
}

/// Is `href`, resolved against `base`, an external website candidate
/// (i.e. not the source host itself, and not an excluded social host)?
pub fn is_external_company_link(base: &Url, href: &str, source_host: &str) -> Option<Url> {
    if href.is_empty() {
        return None;
    }
    let lower = href.trim().to_lowercase();
    if lower.starts_with("mailto:") || lower.starts_with("tel:") || lower.starts_with("javascript:") || lower.starts_with('#') {
        return None;
    }
    let resolved = base.join(href).ok()?;
    if resolved.as_str().len() > MAX_URL_LENGTH {
        return None;
    }
    if has_ignored_extension(resolved.path()) {
        return None;
    }
    let host = resolved.host_str()?.to_lowercase();
    if host == source_host {
        return None;
    }
    if EXCLUDED_DOMAINS.iter().any(|d| host == *d || host.ends_with(&format!(".{d}"))) {
        return None;
    }
    Some(resolved)
}

/// Build a `CompanyEvidence` candidate from an anchor's visible text
/// (raw name) and its resolved external URL.
pub fn company_from_link(anchor_text: &str, url: &Url) -> CompanyEvidence {
    let raw_name = if anchor_text.trim().is_empty() {
        None
    } else {
        Some(anchor_text.trim().to_string())
    };
    build_evidence(raw_name, None, Some(url.to_string()))
}

/// Deduplicate candidates by website domain (falling back to
/// normalized name), preserving first-seen order, and cap the count.
pub fn cap_and_dedupe(candidates: Vec<CompanyEvidence>, cap: usize) -> Vec<CompanyEvidence> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for c in candidates {
        let key = c.website_domain.clone().or_else(|| c.normalized_name.clone());
        let Some(key) = key else { continue };
        if seen.insert(key) {
            out.push(c);
            if out.len() >= cap {
                break;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_anchors_pairs_href_and_text() {
        let html = r#"<a href="https://acme.com">Acme Inc</a>"#;
        let links = extract_anchors(html);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].href, "https://acme.com");
        assert_eq!(links[0].anchor_text, "Acme Inc");
    }

    #[test]
    fn excludes_source_host_and_social_domains() {
        let base = Url::parse("https://directory.example").unwrap();
        assert!(is_external_company_link(&base, "https://directory.example/about", "directory.example").is_none());
        assert!(is_external_company_link(&base, "https://www.linkedin.com/company/acme", "directory.example").is_none());
    }

    #[test]
    fn accepts_genuine_external_company_site() {
        let base = Url::parse("https://directory.example").unwrap();
        let url = is_external_company_link(&base, "https://acme.com", "directory.example").unwrap();
        assert_eq!(url.host_str(), Some("acme.com"));
    }

    #[test]
    fn cap_and_dedupe_respects_cap_and_domain_uniqueness() {
        let a = build_evidence(Some("Acme".into()), None, Some("https://acme.com".into()));
        let dup = build_evidence(Some("Acme Again".into()), None, Some("https://acme.com/careers".into()));
        let b = build_evidence(Some("Beta".into()), None, Some("https://beta.com".into()));
        let result = cap_and_dedupe(vec![a, dup, b], 5);
        assert_eq!(result.len(), 2);
    }
}
