//! Content similarity engine.
//!
//! Decides whether a new message duplicates existing ones, suggests tags for
//! it and ranks other messages by topical relevance.
//!
//! # Architecture
//!
//! - `lexical`: bigram Dice scorer, pure and synchronous
//! - `generator`: injectable client for the external generative model
//! - `classifier`: prompt templates and reply parsing over a generator
//! - `fanout`: bounded fan-out/fan-in with an explicit failure policy
//! - `duplicates`, `related`, `tags`: the three pipelines
//!
//! [`Engine`] wires one classifier and the operator settings together.

mod classifier;
mod duplicates;
mod errors;
mod fanout;
mod generator;
pub mod lexical;
mod related;
mod tags;

use std::sync::Arc;

pub use classifier::{parse_lines, PromptKind, SemanticClassifier};
pub use duplicates::{COMBINED_THRESHOLD, LEXICAL_THRESHOLD, MAX_DUPLICATES};
pub use errors::{EngineError, EngineResult, ErrorKind, TransportError};
pub use fanout::{FailurePolicy, FanOut};
pub use generator::{GeminiClient, TextGenerator};
pub use related::{MAX_RELATED, RELEVANCE_THRESHOLD};
pub use tags::MAX_TAGS;

use crate::config::ClassifierConfig;
use crate::messages::{RelatedCandidate, ScoredCandidate, TextUnit};

#[derive(Clone)]
pub struct Engine {
    classifier: SemanticClassifier,
    fan_out: FanOut,
}

impl Engine {
    pub fn new(generator: Arc<dyn TextGenerator>, fan_out: FanOut) -> Self {
        Self {
            classifier: SemanticClassifier::new(generator),
            fan_out,
        }
    }

    /// Engine backed by the Gemini client described in `config`.
    pub fn from_config(config: &ClassifierConfig) -> EngineResult<Self> {
        log::info!(
            "using model '{}' at {} (max_concurrency={}, failure_policy={:?})",
            config.model,
            config.endpoint,
            config.max_concurrency,
            config.failure_policy
        );

        let generator = GeminiClient::from_config(config)?;
        Ok(Self::new(Arc::new(generator), config.fan_out()))
    }

    pub async fn find_duplicates(
        &self,
        content: &str,
        candidates: &[TextUnit],
    ) -> EngineResult<Vec<ScoredCandidate>> {
        duplicates::find_duplicates(&self.classifier, self.fan_out, content, candidates).await
    }

    pub async fn find_related(
        &self,
        content: &str,
        candidates: &[TextUnit],
    ) -> EngineResult<Vec<RelatedCandidate>> {
        related::find_related(&self.classifier, self.fan_out, content, candidates).await
    }

    pub async fn suggest_tags(&self, content: &str) -> EngineResult<Vec<String>> {
        tags::suggest_tags(&self.classifier, content).await
    }
}
