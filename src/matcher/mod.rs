//! Matcher (C3): consecutive-token matching of keyword aliases and
//! phrases over an offer's (title, description), with negation
//! annotation. Pure — no IO, no store, no clock.

pub mod negation;

use std::collections::HashSet;

use crate::catalog::CompiledCatalog;
use crate::text::normalize_to_tokens;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Title,
    Description,
}

#[derive(Debug, Clone)]
pub struct KeywordHit {
    pub keyword_id: String,
    pub category_id: String,
    pub field: Field,
    pub token_index: usize,
    pub matched_tokens: Vec<String>,
    pub is_negated: bool,
}

#[derive(Debug, Clone)]
pub struct PhraseHit {
    pub phrase_id: String,
    pub field: Field,
    pub token_index: usize,
    pub matched_tokens: Vec<String>,
    pub is_negated: bool,
}

#[derive(Debug, Clone)]
pub struct MatchResult {
    pub keyword_hits: Vec<KeywordHit>,
    pub phrase_hits: Vec<PhraseHit>,
    /// Computed before negation filtering, per spec.md §4.3.
    pub unique_categories: usize,
    pub unique_keywords: usize,
}

/// Fixed negation window size (positive, both directions). Typical 3
/// per spec.md §4.3.
pub const NEGATION_WINDOW_BEFORE: usize = 3;
pub const NEGATION_WINDOW_AFTER: usize = 3;

/// Anchored-by-first-token scan: for every position `i` where
/// `tokens[i]` equals the candidate's first token, check whether the
/// remaining tokens line up exactly.
fn scan_for_sequence(tokens: &[String], needle: &[String]) -> Vec<(usize, usize)> {
    // Returns (start, end) index pairs (end exclusive).
    let mut hits = Vec::new();
    if needle.is_empty() || tokens.len() < needle.len() {
        return hits;
    }
    for i in 0..=(tokens.len() - needle.len()) {
        if tokens[i] == needle[0] && tokens[i..i + needle.len()] == *needle {
            hits.push((i, i + needle.len()));
        }
    }
    hits
}

fn match_field(
    field: Field,
    tokens: &[String],
    catalog: &CompiledCatalog,
    keyword_hits: &mut Vec<KeywordHit>,
    phrase_hits: &mut Vec<PhraseHit>,
) {
    for kw in &catalog.keywords {
        for alias in &kw.alias_tokens {
            for (start, end) in scan_for_sequence(tokens, alias) {
                let is_negated = negation::window_is_negated(
                    tokens,
                    start,
                    end,
                    NEGATION_WINDOW_BEFORE,
                    NEGATION_WINDOW_AFTER,
                );
                keyword_hits.push(KeywordHit {
                    keyword_id: kw.id.clone(),
                    category_id: kw.category_id.clone(),
                    field,
                    token_index: start,
                    matched_tokens: tokens[start..end].to_vec(),
                    is_negated,
                });
            }
        }
    }

    for phrase in &catalog.phrases {
        for (start, end) in scan_for_sequence(tokens, &phrase.tokens) {
            let is_negated = negation::window_is_negated(
                tokens,
                start,
                end,
                NEGATION_WINDOW_BEFORE,
                NEGATION_WINDOW_AFTER,
            );
            phrase_hits.push(PhraseHit {
                phrase_id: phrase.id.clone(),
                field,
                token_index: start,
                matched_tokens: tokens[start..end].to_vec(),
                is_negated,
            });
        }
    }
}

/// Run the matcher over an offer's title and description. No
/// intra-field deduplication — the scorer owns category-level dedup.
pub fn match_offer(title: &str, description: &str, catalog: &CompiledCatalog) -> MatchResult {
    let title_tokens = normalize_to_tokens(title);
    let desc_tokens = normalize_to_tokens(description);

    let mut keyword_hits = Vec::new();
    let mut phrase_hits = Vec::new();

    match_field(
        Field::Title,
        &title_tokens,
        catalog,
        &mut keyword_hits,
        &mut phrase_hits,
    );
    match_field(
        Field::Description,
        &desc_tokens,
        catalog,
        &mut keyword_hits,
        &mut phrase_hits,
    );

    let unique_categories: HashSet<&str> = keyword_hits.iter().map(|h| h.category_id.as_str()).collect();
    let unique_keywords: HashSet<&str> = keyword_hits.iter().map(|h| h.keyword_id.as_str()).collect();

    MatchResult {
        keyword_hits,
        phrase_hits,
        unique_categories: unique_categories.len(),
        unique_keywords: unique_keywords.len(),
    }
}
