//! Message records exchanged with the caller.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Deserializer, Serialize};

/// An existing or candidate message. Only referenced, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextUnit {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

impl TextUnit {
    pub fn new(id: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
        }
    }
}

/// A likely duplicate. `similarity` is the blended lexical/semantic score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub id: String,
    pub title: String,
    pub similarity: f64,
}

/// A topically related message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedCandidate {
    pub id: String,
    pub title: String,
    pub relevance: u8,
}

fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(i64),
        Uint(u64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Int(n) => n.to_string(),
        RawId::Uint(n) => n.to_string(),
    })
}

/// Load a candidate pool from a JSON array of `{id, title, content}` records.
pub fn load_candidates(path: &Path) -> anyhow::Result<Vec<TextUnit>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read candidates from {}", path.display()))?;
    let candidates: Vec<TextUnit> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of messages", path.display()))?;

    log::debug!("loaded {} candidates from {}", candidates.len(), path.display());
    Ok(candidates)
}
