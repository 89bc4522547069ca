//! Topic-based related message ranking.
//!
//! Topics are extracted once from the source text, then every candidate is
//! scored against that topic set.

use crate::engine::classifier::{PromptKind, SemanticClassifier};
use crate::engine::errors::{require_text, EngineError, EngineResult};
use crate::engine::fanout::FanOut;
use crate::messages::{RelatedCandidate, TextUnit};

/// Related messages must score strictly above this.
pub const RELEVANCE_THRESHOLD: u8 = 60;
pub const MAX_RELATED: usize = 5;

/// Rank `candidates` by relevance to the topics of `content`.
///
/// An empty pool returns `[]` without calling the model. A topic reply with
/// no lines fails with a parse error rather than scoring candidates against
/// an empty topic string.
pub async fn find_related(
    classifier: &SemanticClassifier,
    fan_out: FanOut,
    content: &str,
    candidates: &[TextUnit],
) -> EngineResult<Vec<RelatedCandidate>> {
    let content = require_text("content", content)?;

    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let topics = classifier
        .list(PromptKind::TopicExtraction { text: content })
        .await?;
    if topics.is_empty() {
        return Err(EngineError::parse("a list of topics", ""));
    }

    let topics = topics.join(", ");
    log::debug!("related: topics=[{topics}] candidates={}", candidates.len());

    let scored = fan_out
        .run(candidates, |candidate| {
            classifier.score(PromptKind::TopicRelevance {
                topics: &topics,
                text: &candidate.content,
            })
        })
        .await?;

    let mut related: Vec<RelatedCandidate> = scored
        .into_iter()
        .filter(|(_, relevance)| *relevance > RELEVANCE_THRESHOLD)
        .map(|(candidate, relevance)| RelatedCandidate {
            id: candidate.id.clone(),
            title: candidate.title.clone(),
            relevance,
        })
        .collect();

    related.sort_by(|a, b| b.relevance.cmp(&a.relevance));
    related.truncate(MAX_RELATED);

    log::info!("related: {} found", related.len());
    Ok(related)
}
