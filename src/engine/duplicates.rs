//! Two-stage duplicate detection.
//!
//! The lexical scorer gates the pool; only survivors reach the semantic
//! classifier. Both scores are blended with an equal-weight mean.

use crate::engine::classifier::{PromptKind, SemanticClassifier};
use crate::engine::errors::{require_text, EngineResult};
use crate::engine::fanout::FanOut;
use crate::engine::lexical;
use crate::messages::{ScoredCandidate, TextUnit};

/// Survivors of the lexical stage must score strictly above this.
pub const LEXICAL_THRESHOLD: f64 = 50.0;
/// Reported duplicates must have a blended score strictly above this.
pub const COMBINED_THRESHOLD: f64 = 70.0;
pub const MAX_DUPLICATES: usize = 3;

pub async fn find_duplicates(
    classifier: &SemanticClassifier,
    fan_out: FanOut,
    content: &str,
    candidates: &[TextUnit],
) -> EngineResult<Vec<ScoredCandidate>> {
    let content = require_text("content", content)?;

    let survivors = lexical_survivors(content, candidates);
    log::debug!(
        "duplicates: {} of {} candidates passed the lexical stage",
        survivors.len(),
        candidates.len()
    );

    if survivors.is_empty() {
        return Ok(Vec::new());
    }

    let scored = fan_out
        .run(&survivors, |(candidate, _)| {
            classifier.score(PromptKind::DuplicateSimilarity {
                text_a: content,
                text_b: &candidate.content,
            })
        })
        .await?;

    let mut duplicates: Vec<ScoredCandidate> = scored
        .into_iter()
        .map(|((candidate, lexical), semantic)| ScoredCandidate {
            id: candidate.id.clone(),
            title: candidate.title.clone(),
            similarity: blend(*lexical, semantic),
        })
        .filter(|dup| dup.similarity > COMBINED_THRESHOLD)
        .collect();

    // stable: ties keep lexical order
    duplicates.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    duplicates.truncate(MAX_DUPLICATES);

    log::info!("duplicates: {} found", duplicates.len());
    Ok(duplicates)
}

/// Candidates above the lexical threshold, best first, ties in input order.
fn lexical_survivors<'a>(content: &str, candidates: &'a [TextUnit]) -> Vec<(&'a TextUnit, f64)> {
    let mut survivors: Vec<(&TextUnit, f64)> = candidates
        .iter()
        .map(|candidate| (candidate, lexical::score(content, &candidate.content)))
        .filter(|(_, score)| *score > LEXICAL_THRESHOLD)
        .collect();

    survivors.sort_by(|a, b| b.1.total_cmp(&a.1));
    survivors
}

fn blend(lexical: f64, semantic: u8) -> f64 {
    (lexical + semantic as f64) / 2.0
}
