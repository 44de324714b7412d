//! Catalog loader (C2): parses and validates the static keyword/phrase
//! document, then compiles it to runtime form for the matcher/scorer.

pub mod compile;

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use compile::{CompiledCatalog, CompiledKeyword, CompiledPhrase};

#[derive(Debug)]
pub enum CatalogError {
    Invalid(String),
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::Invalid(msg) => write!(f, "catalog error: {msg}"),
        }
    }
}

impl std::error::Error for CatalogError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Tier {
    One,
    Two,
    Three,
}

impl TryFrom<u8> for Tier {
    type Error = CatalogError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Tier::One),
            2 => Ok(Tier::Two),
            3 => Ok(Tier::Three),
            other => Err(CatalogError::Invalid(format!(
                "tier must be 1, 2, or 3, got {other}"
            ))),
        }
    }
}

impl From<Tier> for u8 {
    fn from(t: Tier) -> u8 {
        match t {
            Tier::One => 1,
            Tier::Two => 2,
            Tier::Three => 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub tier: Tier,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Keyword {
    pub id: String,
    #[serde(rename = "categoryId")]
    pub category_id: String,
    pub canonical: String,
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Phrase {
    pub id: String,
    pub phrase: String,
    pub tier: Tier,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogDocument {
    pub version: String,
    pub categories: Vec<Category>,
    pub keywords: Vec<Keyword>,
    #[serde(default)]
    pub phrases: Vec<Phrase>,
}

impl CatalogDocument {
    /// Fail-fast validation producing a single actionable error.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.version.trim().is_empty() {
            return Err(CatalogError::Invalid("version must be non-empty".into()));
        }
        if self.categories.is_empty() {
            return Err(CatalogError::Invalid("categories must be non-empty".into()));
        }
        if self.keywords.is_empty() {
            return Err(CatalogError::Invalid("keywords must be non-empty".into()));
        }

        let mut cat_ids = HashSet::new();
        for c in &self.categories {
            if c.id.trim().is_empty() || c.name.trim().is_empty() {
                return Err(CatalogError::Invalid(format!(
                    "category '{}' has an empty id or name",
                    c.id
                )));
            }
            if !cat_ids.insert(c.id.clone()) {
                return Err(CatalogError::Invalid(format!(
                    "duplicate category id: {}",
                    c.id
                )));
            }
        }

        let mut kw_ids = HashSet::new();
        for k in &self.keywords {
            if k.id.trim().is_empty() || k.canonical.trim().is_empty() {
                return Err(CatalogError::Invalid(format!(
                    "keyword '{}' has an empty id or canonical",
                    k.id
                )));
            }
            if !kw_ids.insert(k.id.clone()) {
                return Err(CatalogError::Invalid(format!(
                    "duplicate keyword id: {}",
                    k.id
                )));
            }
            if k.aliases.is_empty() {
                return Err(CatalogError::Invalid(format!(
                    "keyword '{}' must have at least one alias",
                    k.id
                )));
            }
            if !cat_ids.contains(&k.category_id) {
                return Err(CatalogError::Invalid(format!(
                    "keyword '{}' references unknown categoryId '{}'",
                    k.id, k.category_id
                )));
            }
        }

        let mut phrase_ids = HashSet::new();
        for p in &self.phrases {
            if p.id.trim().is_empty() || p.phrase.trim().is_empty() {
                return Err(CatalogError::Invalid(format!(
                    "phrase '{}' has an empty id or phrase text",
                    p.id
                )));
            }
            if !phrase_ids.insert(p.id.clone()) {
                return Err(CatalogError::Invalid(format!(
                    "duplicate phrase id: {}",
                    p.id
                )));
            }
        }

        Ok(())
    }
}

/// Load and validate a catalog document from a JSON file path, then
/// compile it into runtime form. The only IO in this module.
pub fn load_catalog(path: &std::path::Path) -> anyhow::Result<CompiledCatalog> {
    use anyhow::Context;
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog at {}", path.display()))?;
    let doc: CatalogDocument = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse catalog JSON at {}", path.display()))?;
    doc.validate()
        .with_context(|| format!("catalog at {} failed validation", path.display()))?;
    compile::compile(&doc).with_context(|| format!("failed to compile catalog at {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_doc() -> CatalogDocument {
        CatalogDocument {
            version: "v1".into(),
            categories: vec![Category {
                id: "cat_fx_direct".into(),
                name: "Direct FX".into(),
                tier: Tier::Three,
            }],
            keywords: vec![Keyword {
                id: "kw_fx".into(),
                category_id: "cat_fx_direct".into(),
                canonical: "forex".into(),
                aliases: vec!["forex".into(), "fx trading".into()],
            }],
            phrases: vec![],
        }
    }

    #[test]
    fn rejects_duplicate_category_ids() {
        let mut doc = valid_doc();
        doc.categories.push(doc.categories[0].clone());
        assert!(doc.validate().is_err());
    }

    #[test]
    fn rejects_unknown_category_reference() {
        let mut doc = valid_doc();
        doc.keywords[0].category_id = "does_not_exist".into();
        assert!(doc.validate().is_err());
    }

    #[test]
    fn rejects_empty_aliases() {
        let mut doc = valid_doc();
        doc.keywords[0].aliases.clear();
        assert!(doc.validate().is_err());
    }

    #[test]
    fn accepts_empty_phrases_array() {
        let doc = valid_doc();
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn tier_must_be_one_two_or_three() {
        let bad = serde_json::from_str::<Tier>("4");
        assert!(bad.is_err());
        let good = serde_json::from_str::<Tier>("2").unwrap();
        assert_eq!(good, Tier::Two);
    }
}
