//! Career-page candidate URL generation (spec.md §4.9 step 2).

/// Fixed, ordered list of career-page paths tried against every
/// company's normalized base URL before falling back to link-following.
pub const CAREER_PATHS: &[&str] = &[
    "/careers",
    "/careers/",
    "/jobs",
    "/jobs/",
    "/join-us",
    "/company/careers",
    "/about/careers",
    "/company/jobs",
    "/about/jobs",
    "/careers.html",
    "/en/careers",
];

pub fn candidate_urls(base_url: &str) -> Vec<String> {
    let trimmed = base_url.trim_end_matches('/');
    CAREER_PATHS.iter().map(|path| format!("{trimmed}{path}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_one_candidate_per_path_in_order() {
        let urls = candidate_urls("https://acme.com");
        assert_eq!(urls.len(), CAREER_PATHS.len());
        assert_eq!(urls[0], "https://acme.com/careers");
    }

    #[test]
    fn strips_trailing_slash_from_base_before_joining() {
        let urls = candidate_urls("https://acme.com/");
        assert_eq!(urls[0], "https://acme.com/careers");
    }
}
