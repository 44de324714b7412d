//! Compile a validated `CatalogDocument` into the runtime form consumed
//! by the matcher and scorer: every alias/phrase run through the C1
//! normalizer once, up front, so the hot matching loop never
//! re-tokenizes catalog text.

use std::collections::{HashMap, HashSet};

use super::{CatalogDocument, CatalogError, Category, Tier};
use crate::text::normalize_to_tokens;

#[derive(Debug, Clone)]
pub struct CompiledKeyword {
    pub id: String,
    pub category_id: String,
    pub canonical: String,
    /// Deduplicated alias token sequences (aliases with identical
    /// token sequences collapse to one entry).
    pub alias_tokens: Vec<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct CompiledPhrase {
    pub id: String,
    pub phrase: String,
    pub tier: Tier,
    pub tokens: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CompiledCatalog {
    pub version: String,
    pub categories: HashMap<String, Category>,
    /// Categories in source (insertion) order — used for stable
    /// top-category tie-breaks (spec.md §4.4 step 10, §8 S7).
    pub category_order: Vec<String>,
    pub keywords: Vec<CompiledKeyword>,
    pub phrases: Vec<CompiledPhrase>,
}

pub fn compile(doc: &CatalogDocument) -> Result<CompiledCatalog, CatalogError> {
    let mut categories = HashMap::new();
    let mut category_order = Vec::new();
    for c in &doc.categories {
        category_order.push(c.id.clone());
        categories.insert(c.id.clone(), c.clone());
    }

    let mut keywords = Vec::with_capacity(doc.keywords.len());
    for k in &doc.keywords {
        let mut seen: HashSet<Vec<String>> = HashSet::new();
        let mut alias_tokens = Vec::new();
        for alias in &k.aliases {
            let tokens = normalize_to_tokens(alias);
            if tokens.is_empty() {
                return Err(CatalogError::Invalid(format!(
                    "keyword '{}' alias '{}' normalizes to zero tokens",
                    k.id, alias
                )));
            }
            if seen.insert(tokens.clone()) {
                alias_tokens.push(tokens);
            }
        }
        keywords.push(CompiledKeyword {
            id: k.id.clone(),
            category_id: k.category_id.clone(),
            canonical: k.canonical.clone(),
            alias_tokens,
        });
    }

    let mut phrases = Vec::with_capacity(doc.phrases.len());
    for p in &doc.phrases {
        let tokens = normalize_to_tokens(&p.phrase);
        if tokens.is_empty() {
            return Err(CatalogError::Invalid(format!(
                "phrase '{}' normalizes to zero tokens",
                p.id
            )));
        }
        phrases.push(CompiledPhrase {
            id: p.id.clone(),
            phrase: p.phrase.clone(),
            tier: p.tier,
            tokens,
        });
    }

    Ok(CompiledCatalog {
        version: doc.version.clone(),
        categories,
        category_order,
        keywords,
        phrases,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Keyword;

    #[test]
    fn zero_token_alias_is_a_compile_error() {
        let doc = CatalogDocument {
            version: "v1".into(),
            categories: vec![Category {
                id: "cat_a".into(),
                name: "A".into(),
                tier: Tier::One,
            }],
            keywords: vec![Keyword {
                id: "kw_a".into(),
                category_id: "cat_a".into(),
                canonical: "x".into(),
                aliases: vec!["---".into()],
            }],
            phrases: vec![],
        };
        let err = compile(&doc).unwrap_err();
        assert!(format!("{err}").contains("kw_a"));
    }

    #[test]
    fn dedups_aliases_with_identical_token_sequences() {
        let doc = CatalogDocument {
            version: "v1".into(),
            categories: vec![Category {
                id: "cat_a".into(),
                name: "A".into(),
                tier: Tier::One,
            }],
            keywords: vec![Keyword {
                id: "kw_a".into(),
                category_id: "cat_a".into(),
                canonical: "fx".into(),
                aliases: vec!["FX Trading".into(), "fx-trading".into()],
            }],
            phrases: vec![],
        };
        let compiled = compile(&doc).unwrap();
        assert_eq!(compiled.keywords[0].alias_tokens.len(), 1);
    }

    #[test]
    fn preserves_category_insertion_order() {
        let doc = CatalogDocument {
            version: "v1".into(),
            categories: vec![
                Category {
                    id: "cat_b".into(),
                    name: "B".into(),
                    tier: Tier::Two,
                },
                Category {
                    id: "cat_a".into(),
                    name: "A".into(),
                    tier: Tier::One,
                },
            ],
            keywords: vec![Keyword {
                id: "kw".into(),
                category_id: "cat_a".into(),
                canonical: "x".into(),
                aliases: vec!["x".into()],
            }],
            phrases: vec![],
        };
        let compiled = compile(&doc).unwrap();
        assert_eq!(compiled.category_order, vec!["cat_b", "cat_a"]);
    }
}
