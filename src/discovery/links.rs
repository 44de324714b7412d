//! Anchor extraction and 1-hop follow-candidate filtering (spec.md
//! §4.9 step 4).

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

pub const MAX_URL_LENGTH: usize = 2048;
pub const MAX_LINKS_TO_FOLLOW: usize = 10;

pub const DISCOVERY_LINK_KEYWORDS: &[&str] =
    &["career", "careers", "jobs", "job", "join-us", "join_us", "hiring", "opportunities"];

const IGNORED_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "svg", "webp", "ico", "zip", "tar", "gz", "rar", "7z", "pdf", "doc", "docx", "xls",
    "xlsx", "ppt", "pptx",
];

/// Additional ATS hosts that are acceptable follow targets even though
/// they aren't the company's own domain.
pub const ATS_ALLOWED_EXTERNAL_HOSTS: &[&str] =
    &["jobs.lever.co", "boards.greenhouse.io", "boards-api.greenhouse.io"];

pub static ANCHOR_HREF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<a\b[^>]*\bhref\s*=\s*["']([^"']+)["']"#).unwrap());

pub fn extract_hrefs(html: &str) -> Vec<String> {
    ANCHOR_HREF_RE
        .captures_iter(html)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

fn has_ignored_extension(path: &str) -> bool {
    let lower = path.to_lowercase();
    IGNORED_EXTENSIONS.iter().any(|ext| lower.ends_with(&format!(".{ext}")))
}

fn contains_discovery_keyword(url: &str) -> bool {
    let lower = url.to_lowercase();
    DISCOVERY_LINK_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// Resolve `href` against `base`, then decide if it's a valid follow
/// candidate per spec.md §4.9 step 4. Returns the absolute URL if so.
pub fn follow_candidate(base: &Url, href: &str, base_host: &str) -> Option<Url> {
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
    let host_ok = host == base_host || ATS_ALLOWED_EXTERNAL_HOSTS.contains(&host.as_str());
    if !host_ok {
        return None;
    }

    if !contains_discovery_keyword(resolved.as_str()) {
        return None;
    }

    Some(resolved)
}

/// Extract, resolve, filter, dedupe, and cap follow candidates from a
/// page's HTML, excluding URLs already present in `already_checked`.
pub fn gather_follow_candidates(base: &Url, html: &str, already_checked: &HashSet<String>) -> Vec<Url> {
    let base_host = match base.host_str() {
        Some(h) => h.to_lowercase(),
        None => return Vec::new(),
    };

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for href in extract_hrefs(html) {
        if out.len() >= MAX_LINKS_TO_FOLLOW {
            break;
        }
        let Some(resolved) = follow_candidate(base, &href, &base_host) else {
            continue;
        };
        let key = resolved.as_str().to_string();
        if already_checked.contains(&key) || !seen.insert(key) {
            continue;
        }
        out.push(resolved);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://acme.com").unwrap()
    }

    #[test]
    fn extracts_multiple_anchor_hrefs() {
        let html = r#"<a href="/careers">Careers</a><a href='/about'>About</a>"#;
        let hrefs = extract_hrefs(html);
        assert_eq!(hrefs, vec!["/careers", "/about"]);
    }

    #[test]
    fn rejects_mailto_and_fragment_links() {
        assert!(follow_candidate(&base(), "mailto:hr@acme.com", "acme.com").is_none());
        assert!(follow_candidate(&base(), "#careers-section", "acme.com").is_none());
    }

    #[test]
    fn rejects_ignored_extensions() {
        assert!(follow_candidate(&base(), "/careers/handbook.pdf", "acme.com").is_none());
    }

    #[test]
    fn rejects_links_without_a_discovery_keyword() {
        assert!(follow_candidate(&base(), "/about-us", "acme.com").is_none());
    }

    #[test]
    fn accepts_allowed_external_ats_host() {
        let resolved = follow_candidate(&base(), "https://jobs.lever.co/acme", "acme.com");
        assert!(resolved.is_some());
    }

    #[test]
    fn rejects_disallowed_external_host() {
        assert!(follow_candidate(&base(), "https://unrelated.example/careers", "acme.com").is_none());
    }

    #[test]
    fn gather_dedupes_and_excludes_already_checked() {
        let html = r#"<a href="/careers">A</a><a href="/careers">B</a><a href="/jobs">C</a>"#;
        let mut checked = HashSet::new();
        checked.insert("https://acme.com/jobs".to_string());
        let candidates = gather_follow_candidates(&base(), html, &checked);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].as_str(), "https://acme.com/careers");
    }

    #[test]
    fn gather_caps_at_max_links_to_follow() {
        let mut html = String::new();
        for i in 0..(MAX_LINKS_TO_FOLLOW + 5) {
            html.push_str(&format!(r#"<a href="/careers/{i}">job</a>"#));
        }
        let candidates = gather_follow_candidates(&base(), &html, &HashSet::new());
        assert_eq!(candidates.len(), MAX_LINKS_TO_FOLLOW);
    }
}
