//! Concrete values for the scorer's Open Questions (spec.md §9): tier
//! weights, field weights, bucket caps, and thresholds. These are
//! catalog-scoring configuration, not algorithmic choices — see
//! DESIGN.md for the rationale behind each number.

use crate::catalog::Tier;
use crate::matcher::Field;

#[derive(Debug, Clone, Copy)]
pub struct ScoringConfig {
    pub tier_weight: [f64; 3],
    pub phrase_tier_weight: [f64; 3],
    pub field_weight_title: f64,
    pub field_weight_description: f64,
    pub bucket_cap_direct_fx: f64,
    pub bucket_cap_intl_footprint: f64,
    pub bucket_cap_business_model: f64,
    pub bucket_cap_tech_proxy: f64,
    pub fx_core_threshold: f64,
    pub no_fx_max_score: f64,
    pub strong_threshold: i32,
}

impl ScoringConfig {
    pub fn tier_weight(&self, tier: Tier) -> f64 {
        match tier {
            Tier::One => self.tier_weight[0],
            Tier::Two => self.tier_weight[1],
            Tier::Three => self.tier_weight[2],
        }
    }

    pub fn phrase_tier_weight(&self, tier: Tier) -> f64 {
        match tier {
            Tier::One => self.phrase_tier_weight[0],
            Tier::Two => self.phrase_tier_weight[1],
            Tier::Three => self.phrase_tier_weight[2],
        }
    }

    pub fn field_weight(&self, field: Field) -> f64 {
        match field {
            Field::Title => self.field_weight_title,
            Field::Description => self.field_weight_description,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            // Tier 3 > tier 2 > tier 1, per spec.md §4.4.
            tier_weight: [1.0, 1.6, 2.4],
            phrase_tier_weight: [1.2, 1.8, 2.6],
            // title weight > description weight, per spec.md §4.4.
            field_weight_title: 1.5,
            field_weight_description: 1.0,
            bucket_cap_direct_fx: 5.0,
            bucket_cap_intl_footprint: 2.5,
            bucket_cap_business_model: 2.0,
            bucket_cap_tech_proxy: 1.5,
            fx_core_threshold: 3.0,
            // Must stay below 10, per spec.md §4.4 step 8.
            no_fx_max_score: 4.0,
            strong_threshold: 7,
        }
    }
}
