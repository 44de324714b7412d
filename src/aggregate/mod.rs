//! Company aggregator (C6): a pure function over a company's offers
//! (canonical and duplicate) producing activity-weighted counts, the
//! top offer, a category profile, and freshness. Persistence is a
//! separate step (see `store::Store::persist_company_aggregates`).

use std::collections::HashMap;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct OfferForAggregation {
    pub offer_id: i64,
    pub score: i32,
    pub top_category_id: Option<String>,
    pub canonical_offer_id: Option<i64>,
    pub repost_count: i64,
    pub published_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl OfferForAggregation {
    fn is_canonical(&self) -> bool {
        self.canonical_offer_id.is_none()
    }

    fn is_strong(&self, strong_threshold: i32) -> bool {
        self.score >= strong_threshold
    }

    fn recency_key(&self) -> (i64, i64) {
        (
            self.published_at.map(|t| t.timestamp()).unwrap_or(i64::MIN),
            self.updated_at.map(|t| t.timestamp()).unwrap_or(i64::MIN),
        )
    }

    fn strong_at(&self) -> Option<DateTime<Utc>> {
        self.published_at.or(self.updated_at)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompanyAggregate {
    pub unique_offer_count: i64,
    pub offer_count: i64,
    pub max_score: i32,
    pub top_offer_id: Option<i64>,
    pub top_category_id: Option<String>,
    pub strong_offer_count: i64,
    pub avg_strong_score: Option<f64>,
    pub category_max_scores: HashMap<String, i32>,
    pub last_strong_at: Option<DateTime<Utc>>,
}

impl CompanyAggregate {
    fn empty() -> Self {
        Self {
            unique_offer_count: 0,
            offer_count: 0,
            max_score: 0,
            top_offer_id: None,
            top_category_id: None,
            strong_offer_count: 0,
            avg_strong_score: None,
            category_max_scores: HashMap::new(),
            last_strong_at: None,
        }
    }
}

/// Aggregate a company's offers. Pure — permutation of `offers` never
/// changes the result (P8), aside from ties broken by
/// timestamp/id, which are themselves stable.
pub fn aggregate_company(offers: &[OfferForAggregation], strong_threshold: i32) -> CompanyAggregate {
    let canonical: Vec<&OfferForAggregation> = offers.iter().filter(|o| o.is_canonical()).collect();

    if canonical.is_empty() {
        return CompanyAggregate::empty();
    }

    let unique_offer_count = canonical.len() as i64;
    let offer_count: i64 = canonical.iter().map(|o| 1 + o.repost_count).sum();

    let top = canonical
        .iter()
        .fold(None::<&&OfferForAggregation>, |acc, o| match acc {
            None => Some(o),
            Some(best) => {
                if o.score > best.score {
                    Some(o)
                } else if o.score == best.score && o.recency_key() > best.recency_key() {
                    Some(o)
                } else {
                    Some(best)
                }
            }
        })
        .expect("canonical is non-empty");

    let max_score = top.score;
    let top_offer_id = Some(top.offer_id);
    let top_category_id = top.top_category_id.clone();

    let strong: Vec<&&OfferForAggregation> = canonical.iter().filter(|o| o.is_strong(strong_threshold)).collect();
    let strong_offer_count = strong.len() as i64;
    let avg_strong_score = if strong.is_empty() {
        None
    } else {
        Some(strong.iter().map(|o| o.score as f64).sum::<f64>() / strong.len() as f64)
    };

    let mut category_max_scores: HashMap<String, i32> = HashMap::new();
    for o in &canonical {
        if let Some(cat) = &o.top_category_id {
            let entry = category_max_scores.entry(cat.clone()).or_insert(i32::MIN);
            if o.score > *entry {
                *entry = o.score;
            }
        }
    }

    let last_strong_at = strong
        .iter()
        .filter_map(|o| o.strong_at())
        .max();

    CompanyAggregate {
        unique_offer_count,
        offer_count,
        max_score,
        top_offer_id,
        top_category_id,
        strong_offer_count,
        avg_strong_score,
        category_max_scores,
        last_strong_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn offer(id: i64, score: i32, canonical: Option<i64>, repost: i64) -> OfferForAggregation {
        OfferForAggregation {
            offer_id: id,
            score,
            top_category_id: Some("cat_fx_direct".into()),
            canonical_offer_id: canonical,
            repost_count: repost,
            published_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn zero_canonical_offers_yields_empty_shape() {
        let offers = vec![offer(1, 8, Some(99), 0), offer(2, 9, Some(99), 0)];
        let agg = aggregate_company(&offers, 7);
        assert_eq!(agg, CompanyAggregate::empty());
    }

    #[test]
    fn activity_weighted_offer_count() {
        let offers = vec![
            offer(1, 5, None, 3),
            offer(2, 6, None, 0),
            offer(3, 7, None, 2),
        ];
        let agg = aggregate_company(&offers, 7);
        assert_eq!(agg.offer_count, 8);
        assert_eq!(agg.unique_offer_count, 3);
    }

    #[test]
    fn top_offer_tie_broken_by_recency() {
        let older = OfferForAggregation {
            published_at: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            ..offer(1, 8, None, 0)
        };
        let newer = OfferForAggregation {
            published_at: Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()),
            ..offer(2, 8, None, 0)
        };
        let agg = aggregate_company(&[older, newer], 7);
        assert_eq!(agg.top_offer_id, Some(2));
    }

    #[test]
    fn strong_offer_count_not_activity_weighted() {
        let offers = vec![offer(1, 9, None, 5), offer(2, 2, None, 0)];
        let agg = aggregate_company(&offers, 7);
        assert_eq!(agg.strong_offer_count, 1);
        assert_eq!(agg.avg_strong_score, Some(9.0));
    }

    #[test]
    fn permutation_invariance() {
        let offers = vec![offer(1, 5, None, 1), offer(2, 9, None, 0), offer(3, 3, None, 2)];
        let mut permuted = offers.clone();
        permuted.reverse();
        assert_eq!(
            aggregate_company(&offers, 7),
            aggregate_company(&permuted, 7)
        );
    }

    #[test]
    fn category_max_scores_ignore_uncategorized_offers() {
        let mut uncategorized = offer(1, 5, None, 0);
        uncategorized.top_category_id = None;
        let categorized = offer(2, 7, None, 0);
        let agg = aggregate_company(&[uncategorized, categorized], 7);
        assert_eq!(agg.category_max_scores.len(), 1);
        assert_eq!(agg.category_max_scores.get("cat_fx_direct"), Some(&7));
    }
}
