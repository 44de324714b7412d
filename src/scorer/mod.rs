//! Scorer (C4): turns a matcher result into a bounded integer score,
//! a top category, and the full set of scoring reasons. Pure function
//! of (matcher output, compiled catalog, scoring config).

pub mod config;

use std::collections::HashMap;

use rayon::prelude::*;
use serde::Serialize;

use crate::catalog::CompiledCatalog;
use crate::matcher::MatchResult;
pub use config::ScoringConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Bucket {
    DirectFx,
    IntlFootprint,
    BusinessModel,
    TechProxy,
}

impl Bucket {
    fn classify(category_id: &str) -> Bucket {
        if category_id.starts_with("cat_fx_") {
            Bucket::DirectFx
        } else if category_id.starts_with("cat_intl_") {
            Bucket::IntlFootprint
        } else if category_id.starts_with("cat_biz_") {
            Bucket::BusinessModel
        } else {
            Bucket::TechProxy
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryContribution {
    pub category_id: String,
    pub hit_count: usize,
    pub points: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhraseContribution {
    pub phrase_id: String,
    pub hit_count: usize,
    pub points: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreReasons {
    pub raw_score: f64,
    pub final_score: i32,
    pub category_contributions: Vec<CategoryContribution>,
    pub phrase_contributions: Vec<PhraseContribution>,
    pub unique_categories: usize,
    pub unique_keywords: usize,
    pub negated_keyword_hits: usize,
    pub negated_phrase_hits: usize,
    pub bucket_scores: HashMap<String, f64>,
    pub fx_core: bool,
    pub no_fx_guard_fired: bool,
}

#[derive(Debug, Clone)]
pub struct ScoreOutput {
    pub score: i32,
    pub top_category_id: Option<String>,
    pub reasons: ScoreReasons,
}

fn bucket_key(b: Bucket) -> &'static str {
    match b {
        Bucket::DirectFx => "direct_fx",
        Bucket::IntlFootprint => "intl_footprint",
        Bucket::BusinessModel => "business_model",
        Bucket::TechProxy => "tech_proxy",
    }
}

pub fn score_offer(
    result: &MatchResult,
    catalog: &CompiledCatalog,
    cfg: &ScoringConfig,
) -> ScoreOutput {
    // Step 1: negation gating.
    let surviving_keyword_hits: Vec<_> = result.keyword_hits.iter().filter(|h| !h.is_negated).collect();
    let surviving_phrase_hits: Vec<_> = result.phrase_hits.iter().filter(|h| !h.is_negated).collect();
    let negated_keyword_hits = result.keyword_hits.len() - surviving_keyword_hits.len();
    let negated_phrase_hits = result.phrase_hits.len() - surviving_phrase_hits.len();

    // Step 2: per-category contribution (max per category, fields don't stack).
    // Categories are independent of each other, so this is computed in
    // parallel across the catalog's category set for large catalogs.
    let category_results: Vec<(String, usize, f64)> = catalog
        .category_order
        .par_iter()
        .filter_map(|cat_id| {
            let category = catalog.categories.get(cat_id)?;
            let hits: Vec<_> = surviving_keyword_hits
                .iter()
                .filter(|h| &h.category_id == cat_id)
                .collect();
            if hits.is_empty() {
                return None;
            }
            let points = hits
                .iter()
                .map(|h| cfg.tier_weight(category.tier) * cfg.field_weight(h.field))
                .fold(f64::MIN, f64::max);
            Some((cat_id.clone(), hits.len(), points))
        })
        .collect();

    let mut category_points: HashMap<String, f64> = HashMap::new();
    for (cat_id, _, points) in &category_results {
        category_points.insert(cat_id.clone(), *points);
    }

    // Step 3: bucket classification + sum.
    let mut bucket_sums_raw: HashMap<Bucket, f64> = HashMap::new();
    for (cat_id, _, points) in &category_results {
        let bucket = Bucket::classify(cat_id);
        *bucket_sums_raw.entry(bucket).or_insert(0.0) += points;
    }

    // Step 4: FX core detection, before caps.
    let direct_fx_before_caps = *bucket_sums_raw.get(&Bucket::DirectFx).unwrap_or(&0.0);
    let fx_core = direct_fx_before_caps >= cfg.fx_core_threshold;

    // Step 5: bucket caps.
    let cap_for = |b: Bucket| -> f64 {
        match b {
            Bucket::DirectFx => cfg.bucket_cap_direct_fx,
            Bucket::IntlFootprint => cfg.bucket_cap_intl_footprint,
            Bucket::BusinessModel => cfg.bucket_cap_business_model,
            Bucket::TechProxy => cfg.bucket_cap_tech_proxy,
        }
    };
    let mut bucket_sums_capped: HashMap<Bucket, f64> = HashMap::new();
    for b in [
        Bucket::DirectFx,
        Bucket::IntlFootprint,
        Bucket::BusinessModel,
        Bucket::TechProxy,
    ] {
        let raw = *bucket_sums_raw.get(&b).unwrap_or(&0.0);
        bucket_sums_capped.insert(b, raw.min(cap_for(b)));
    }

    // Step 6: phrase contribution (max per phrase).
    let mut phrase_points: HashMap<String, (usize, f64)> = HashMap::new();
    for phrase in &catalog.phrases {
        let hits: Vec<_> = surviving_phrase_hits
            .iter()
            .filter(|h| h.phrase_id == phrase.id)
            .collect();
        if hits.is_empty() {
            continue;
        }
        let points = hits
            .iter()
            .map(|h| cfg.phrase_tier_weight(phrase.tier) * cfg.field_weight(h.field))
            .fold(f64::MIN, f64::max);
        phrase_points.insert(phrase.id.clone(), (hits.len(), points));
    }
    let phrase_sum: f64 = phrase_points.values().map(|(_, p)| p).sum();

    // Step 7: raw score.
    let bucket_sum: f64 = bucket_sums_capped.values().sum();
    let raw_score = bucket_sum + phrase_sum;

    // Step 8: no-FX guard.
    let no_fx_guard_fired = !fx_core;
    let guarded = if no_fx_guard_fired {
        raw_score.min(cfg.no_fx_max_score)
    } else {
        raw_score
    };

    // Step 9: final score.
    let clamped = guarded.clamp(0.0, 10.0);
    let final_score = clamped.round() as i32;

    // Step 10: top category — highest contribution after step 2, ties
    // broken by category_order (stable insertion order).
    let top_category_id = catalog
        .category_order
        .iter()
        .filter_map(|cat_id| category_points.get(cat_id).map(|p| (cat_id.clone(), *p)))
        .fold(None::<(String, f64)>, |acc, (cat_id, points)| match acc {
            None => Some((cat_id, points)),
            Some((best_id, best_points)) => {
                if points > best_points {
                    Some((cat_id, points))
                } else {
                    Some((best_id, best_points))
                }
            }
        })
        .map(|(cat_id, _)| cat_id);

    let mut category_contributions: Vec<CategoryContribution> = category_results
        .into_iter()
        .map(|(category_id, hit_count, points)| CategoryContribution {
            category_id,
            hit_count,
            points,
        })
        .collect();
    category_contributions.sort_by(|a, b| b.points.partial_cmp(&a.points).unwrap());

    let mut phrase_contributions: Vec<PhraseContribution> = phrase_points
        .into_iter()
        .map(|(phrase_id, (hit_count, points))| PhraseContribution {
            phrase_id,
            hit_count,
            points,
        })
        .collect();
    phrase_contributions.sort_by(|a, b| b.points.partial_cmp(&a.points).unwrap());

    let bucket_scores: HashMap<String, f64> = bucket_sums_capped
        .into_iter()
        .map(|(b, v)| (bucket_key(b).to_string(), v))
        .collect();

    ScoreOutput {
        score: final_score,
        top_category_id,
        reasons: ScoreReasons {
            raw_score,
            final_score,
            category_contributions,
            phrase_contributions,
            unique_categories: result.unique_categories,
            unique_keywords: result.unique_keywords,
            negated_keyword_hits,
            negated_phrase_hits,
            bucket_scores,
            fx_core,
            no_fx_guard_fired,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogDocument, Category, Keyword, Phrase, Tier};
    use crate::matcher::{match_offer, Field, KeywordHit, PhraseHit};

    fn fx_heavy_catalog() -> CompiledCatalog {
        let doc = CatalogDocument {
            version: "v1".into(),
            categories: vec![
                Category {
                    id: "cat_fx_direct".into(),
                    name: "Direct FX".into(),
                    tier: Tier::Three,
                },
                Category {
                    id: "cat_proxy_tech".into(),
                    name: "Tech Proxy".into(),
                    tier: Tier::One,
                },
            ],
            keywords: vec![
                Keyword {
                    id: "kw_forex".into(),
                    category_id: "cat_fx_direct".into(),
                    canonical: "forex".into(),
                    aliases: vec!["forex trading".into()],
                },
                Keyword {
                    id: "kw_react".into(),
                    category_id: "cat_proxy_tech".into(),
                    canonical: "react".into(),
                    aliases: vec!["react".into()],
                },
            ],
            phrases: vec![Phrase {
                id: "ph_usd".into(),
                phrase: "exposure to usd".into(),
                tier: Tier::Two,
            }],
        };
        crate::catalog::compile::compile(&doc).unwrap()
    }

    #[test]
    fn score_bounds_are_zero_to_ten() {
        let catalog = fx_heavy_catalog();
        let cfg = ScoringConfig::default();
        let result = match_offer(
            "Forex Trading Lead",
            "Direct exposure to usd revenue across global markets.",
            &catalog,
        );
        let out = score_offer(&result, &catalog, &cfg);
        assert!(out.score >= 0 && out.score <= 10);
    }

    #[test]
    fn no_fx_guard_caps_score_when_fx_core_false() {
        let catalog = fx_heavy_catalog();
        let cfg = ScoringConfig::default();
        let result = match_offer("React Engineer", "Build UI in react.", &catalog);
        let out = score_offer(&result, &catalog, &cfg);
        assert!(!out.reasons.fx_core);
        assert!(out.reasons.no_fx_guard_fired);
        assert!((out.score as f64) <= cfg.no_fx_max_score);
    }

    #[test]
    fn negated_hit_excluded_from_category_contribution() {
        let catalog = fx_heavy_catalog();
        let cfg = ScoringConfig::default();
        let negated_result = match_offer("Analyst", "No forex trading required here.", &catalog);
        let out = score_offer(&negated_result, &catalog, &cfg);
        assert!(out
            .reasons
            .category_contributions
            .iter()
            .all(|c| c.category_id != "cat_fx_direct"));
        assert_eq!(out.reasons.negated_keyword_hits, 1);
    }

    #[test]
    fn categories_do_not_stack_within_same_category() {
        let catalog = fx_heavy_catalog();
        let cfg = ScoringConfig::default();
        let result = match_offer(
            "Forex Trading Analyst - Forex Trading Desk",
            "",
            &catalog,
        );
        let out = score_offer(&result, &catalog, &cfg);
        let fx_contribution = out
            .reasons
            .category_contributions
            .iter()
            .find(|c| c.category_id == "cat_fx_direct")
            .unwrap();
        // two hits, but only the max point value counts.
        assert_eq!(fx_contribution.hit_count, 2);
        assert_eq!(fx_contribution.points, cfg.tier_weight(Tier::Three) * cfg.field_weight_title);
    }

    #[test]
    fn top_category_tie_break_is_stable_insertion_order() {
        // Build a catalog where two categories get equal points.
        let doc = CatalogDocument {
            version: "v1".into(),
            categories: vec![
                Category { id: "cat_a".into(), name: "A".into(), tier: Tier::Two },
                Category { id: "cat_b".into(), name: "B".into(), tier: Tier::Two },
            ],
            keywords: vec![
                Keyword { id: "kw_a".into(), category_id: "cat_a".into(), canonical: "alpha".into(), aliases: vec!["alpha".into()] },
                Keyword { id: "kw_b".into(), category_id: "cat_b".into(), canonical: "beta".into(), aliases: vec!["beta".into()] },
            ],
            phrases: vec![],
        };
        let catalog = crate::catalog::compile::compile(&doc).unwrap();
        let cfg = ScoringConfig::default();
        let result = match_offer("alpha beta", "", &catalog);
        let out = score_offer(&result, &catalog, &cfg);
        assert_eq!(out.top_category_id, Some("cat_a".to_string()));
    }

    #[test]
    fn bucket_classification_by_id_prefix() {
        assert_eq!(Bucket::classify("cat_fx_direct"), Bucket::DirectFx);
        assert_eq!(Bucket::classify("cat_intl_remote"), Bucket::IntlFootprint);
        assert_eq!(Bucket::classify("cat_biz_saas"), Bucket::BusinessModel);
        assert_eq!(Bucket::classify("cat_proxy_anything"), Bucket::TechProxy);
        assert_eq!(Bucket::classify("cat_unlisted"), Bucket::TechProxy);
    }

    #[test]
    fn reasons_hit_count_includes_negated_hits() {
        let hits = vec![
            KeywordHit {
                keyword_id: "kw_forex".into(),
                category_id: "cat_fx_direct".into(),
                field: Field::Title,
                token_index: 0,
                matched_tokens: vec!["forex".into()],
                is_negated: true,
            },
        ];
        let phrase_hits: Vec<PhraseHit> = vec![];
        let result = MatchResult { keyword_hits: hits, phrase_hits, unique_categories: 1, unique_keywords: 1 };
        let catalog = fx_heavy_catalog();
        let cfg = ScoringConfig::default();
        let out = score_offer(&result, &catalog, &cfg);
        assert_eq!(out.reasons.negated_keyword_hits, 1);
    }
}
