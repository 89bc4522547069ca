//! Tag suggestion.

use crate::engine::classifier::{PromptKind, SemanticClassifier};
use crate::engine::errors::{require_text, EngineResult};
use crate::sanitize::sanitize_tags;

/// The template asks the model for "up to 5"; the cap is enforced here too.
pub const MAX_TAGS: usize = 5;

pub async fn suggest_tags(classifier: &SemanticClassifier, content: &str) -> EngineResult<Vec<String>> {
    let content = require_text("content", content)?;

    let raw = classifier
        .list(PromptKind::TagSuggestion { text: content })
        .await?;

    let mut tags = sanitize_tags(&raw);
    if tags.len() > MAX_TAGS {
        log::debug!("tags: model returned {} tags, keeping {MAX_TAGS}", tags.len());
        tags.truncate(MAX_TAGS);
    }

    Ok(tags)
}
