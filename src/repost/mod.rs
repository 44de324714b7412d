//! Repost / duplicate detector (C5): exact-title fast path, multiset
//! overlap fallback, deterministic tie-break. Pure — candidates are
//! supplied by the caller (the store adapter pre-selects them by
//! fingerprint).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::text::normalize_to_tokens;

pub const DESC_SIM_THRESHOLD: f64 = 0.90;

#[derive(Debug, Clone)]
pub struct CandidateOffer {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RepostDecision {
    Duplicate {
        canonical_offer_id: i64,
        reason: DuplicateReason,
        similarity: Option<f64>,
    },
    NotDuplicate {
        reason: NotDuplicateReason,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DuplicateReason {
    ExactTitle,
    DescSimilarity,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NotDuplicateReason {
    NoCandidates,
    MissingDescription,
    DescBelowThreshold,
    TitleMismatch,
}

/// Compute the content fingerprint used by the store to preselect
/// duplicate candidates: normalize title and description separately,
/// join each with a single space, concatenate with a fixed separator,
/// SHA-256 hex. Absent (None) if either normalized component is empty.
pub fn content_fingerprint(title: &str, description: &str) -> Option<String> {
    let title_tokens = normalize_to_tokens(title);
    let desc_tokens = normalize_to_tokens(description);
    if title_tokens.is_empty() || desc_tokens.is_empty() {
        return None;
    }
    let joined_title = title_tokens.join(" ");
    let joined_desc = desc_tokens.join(" ");
    let mut hasher = Sha256::new();
    hasher.update(joined_title.as_bytes());
    hasher.update(b"\u{0}");
    hasher.update(joined_desc.as_bytes());
    Some(hex::encode(hasher.finalize()))
}

fn token_multiset(tokens: &[String]) -> HashMap<&str, usize> {
    let mut counts = HashMap::new();
    for t in tokens {
        *counts.entry(t.as_str()).or_insert(0) += 1;
    }
    counts
}

fn overlap_similarity(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let counts_a = token_multiset(a);
    let counts_b = token_multiset(b);
    let mut overlap = 0usize;
    for (tok, &count_a) in &counts_a {
        if let Some(&count_b) = counts_b.get(tok) {
            overlap += count_a.min(count_b);
        }
    }
    overlap as f64 / a.len().max(b.len()) as f64
}

fn most_recent_key(c: &CandidateOffer) -> (i64, i64, i64) {
    // Larger tuple = more recent. None sorts before Some by using i64::MIN.
    let ls = c.last_seen_at.map(|t| t.timestamp()).unwrap_or(i64::MIN);
    let pub_ts = c.published_at.map(|t| t.timestamp()).unwrap_or(i64::MIN);
    let upd = c.updated_at.map(|t| t.timestamp()).unwrap_or(i64::MIN);
    (ls, pub_ts, upd)
}

/// Decide whether `incoming` is a duplicate of any of `candidates`,
/// which must already be scoped to the same company.
pub fn detect_repost_duplicate(
    incoming_title: &str,
    incoming_description: &str,
    candidates: &[CandidateOffer],
) -> RepostDecision {
    if candidates.is_empty() {
        return RepostDecision::NotDuplicate {
            reason: NotDuplicateReason::NoCandidates,
        };
    }

    // Exact-title fast path.
    let incoming_title_tokens = normalize_to_tokens(incoming_title);
    for candidate in candidates {
        let candidate_title_tokens = normalize_to_tokens(&candidate.title);
        if candidate_title_tokens == incoming_title_tokens {
            return RepostDecision::Duplicate {
                canonical_offer_id: candidate.id,
                reason: DuplicateReason::ExactTitle,
                similarity: None,
            };
        }
    }

    if incoming_description.trim().is_empty() {
        return RepostDecision::NotDuplicate {
            reason: NotDuplicateReason::MissingDescription,
        };
    }

    let incoming_desc_tokens = normalize_to_tokens(incoming_description);

    let mut best: Option<(&CandidateOffer, f64)> = None;
    for candidate in candidates {
        if candidate.description.trim().is_empty() {
            continue;
        }
        let candidate_desc_tokens = normalize_to_tokens(&candidate.description);
        let similarity = overlap_similarity(&incoming_desc_tokens, &candidate_desc_tokens);
        best = match best {
            None => Some((candidate, similarity)),
            Some((best_candidate, best_sim)) => {
                if similarity > best_sim {
                    Some((candidate, similarity))
                } else if similarity == best_sim {
                    // Tie-break: most recent, then smallest id.
                    let a_key = most_recent_key(candidate);
                    let b_key = most_recent_key(best_candidate);
                    if a_key > b_key || (a_key == b_key && candidate.id < best_candidate.id) {
                        Some((candidate, similarity))
                    } else {
                        Some((best_candidate, best_sim))
                    }
                } else {
                    Some((best_candidate, best_sim))
                }
            }
        };
    }

    match best {
        Some((candidate, similarity)) if similarity >= DESC_SIM_THRESHOLD => RepostDecision::Duplicate {
            canonical_offer_id: candidate.id,
            reason: DuplicateReason::DescSimilarity,
            similarity: Some(similarity),
        },
        Some(_) => RepostDecision::NotDuplicate {
            reason: NotDuplicateReason::DescBelowThreshold,
        },
        None => RepostDecision::NotDuplicate {
            reason: NotDuplicateReason::TitleMismatch,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: i64, title: &str, description: &str) -> CandidateOffer {
        CandidateOffer {
            id,
            title: title.to_string(),
            description: description.to_string(),
            last_seen_at: None,
            published_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn empty_candidates_yields_no_candidates() {
        let decision = detect_repost_duplicate("Title", "Desc", &[]);
        assert_eq!(
            decision,
            RepostDecision::NotDuplicate {
                reason: NotDuplicateReason::NoCandidates
            }
        );
    }

    #[test]
    fn exact_title_fast_path() {
        let candidates = vec![candidate(42, "FULL-STACK Developer (React/Node)", "anything")];
        let decision = detect_repost_duplicate(
            "full stack developer react node",
            "completely different description",
            &candidates,
        );
        match decision {
            RepostDecision::Duplicate { canonical_offer_id, reason, .. } => {
                assert_eq!(canonical_offer_id, 42);
                assert_eq!(reason, DuplicateReason::ExactTitle);
            }
            _ => panic!("expected duplicate"),
        }
    }

    #[test]
    fn missing_description_short_circuits() {
        let candidates = vec![candidate(1, "Some Other Title", "desc")];
        let decision = detect_repost_duplicate("Different Title", "", &candidates);
        assert_eq!(
            decision,
            RepostDecision::NotDuplicate {
                reason: NotDuplicateReason::MissingDescription
            }
        );
    }

    #[test]
    fn description_similarity_exact_multiset_match() {
        let candidates = vec![candidate(
            7,
            "Unrelated Title",
            "python python python node node javascript",
        )];
        let decision = detect_repost_duplicate(
            "Another Title",
            "python python python node node javascript",
            &candidates,
        );
        match decision {
            RepostDecision::Duplicate { canonical_offer_id, reason, similarity } => {
                assert_eq!(canonical_offer_id, 7);
                assert_eq!(reason, DuplicateReason::DescSimilarity);
                assert_eq!(similarity, Some(1.0));
            }
            _ => panic!("expected duplicate"),
        }
    }

    #[test]
    fn below_threshold_is_not_duplicate() {
        let candidates = vec![candidate(7, "Unrelated", "python node")];
        let decision = detect_repost_duplicate("Another", "java ruby go rust swift", &candidates);
        assert_eq!(
            decision,
            RepostDecision::NotDuplicate {
                reason: NotDuplicateReason::DescBelowThreshold
            }
        );
    }

    #[test]
    fn tie_break_prefers_most_recent_then_smallest_id() {
        use chrono::TimeZone;
        let older = CandidateOffer {
            id: 5,
            title: "X".into(),
            description: "python node javascript".into(),
            last_seen_at: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            published_at: None,
            updated_at: None,
        };
        let newer = CandidateOffer {
            id: 9,
            title: "Y".into(),
            description: "python node javascript".into(),
            last_seen_at: Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()),
            published_at: None,
            updated_at: None,
        };
        let decision = detect_repost_duplicate("Z", "python node javascript", &[older, newer]);
        match decision {
            RepostDecision::Duplicate { canonical_offer_id, .. } => assert_eq!(canonical_offer_id, 9),
            _ => panic!("expected duplicate"),
        }
    }

    #[test]
    fn decision_stable_under_candidate_permutation() {
        let a = candidate(1, "Alpha", "python node javascript go");
        let b = candidate(2, "Beta", "python node javascript rust");
        let d1 = detect_repost_duplicate("Gamma", "python node javascript", &[a.clone(), b.clone()]);
        let d2 = detect_repost_duplicate("Gamma", "python node javascript", &[b, a]);
        assert_eq!(d1, d2);
    }

    #[test]
    fn fingerprint_absent_when_either_component_empty() {
        assert!(content_fingerprint("", "something").is_none());
        assert!(content_fingerprint("title", "").is_none());
        assert!(content_fingerprint("title", "desc").is_some());
    }

    #[test]
    fn fingerprint_is_64_char_hex() {
        let fp = content_fingerprint("Full Stack Developer", "Build great things.").unwrap();
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
