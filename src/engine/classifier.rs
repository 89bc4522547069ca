//! Semantic classifier: fixed prompt templates over a [`TextGenerator`].
//!
//! Every call issues exactly one generation request and turns the free-form
//! reply into a [`ClassifierOutput`]. Numeric replies that carry no leading
//! integer fail with a parse error instead of being coerced to zero.

use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::engine::errors::{EngineError, EngineResult};
use crate::engine::generator::TextGenerator;

static LEADING_INT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([+-]?)(\d+)").expect("Failed to compile integer regex"));

/// Upper bound of every numeric answer.
pub const MAX_SCORE: u8 = 100;

/// Which template to use, with the caller's text to embed.
#[derive(Debug, Clone, Copy)]
pub enum PromptKind<'a> {
    DuplicateSimilarity { text_a: &'a str, text_b: &'a str },
    TopicRelevance { topics: &'a str, text: &'a str },
    TopicExtraction { text: &'a str },
    TagSuggestion { text: &'a str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AnswerShape {
    Number,
    Lines,
}

/// Parsed model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifierOutput {
    Score(u8),
    List(Vec<String>),
}

impl PromptKind<'_> {
    pub fn label(&self) -> &'static str {
        match self {
            Self::DuplicateSimilarity { .. } => "duplicate-similarity",
            Self::TopicRelevance { .. } => "topic-relevance",
            Self::TopicExtraction { .. } => "topic-extraction",
            Self::TagSuggestion { .. } => "tag-suggestion",
        }
    }

    fn shape(&self) -> AnswerShape {
        match self {
            Self::DuplicateSimilarity { .. } | Self::TopicRelevance { .. } => AnswerShape::Number,
            Self::TopicExtraction { .. } | Self::TagSuggestion { .. } => AnswerShape::Lines,
        }
    }

    pub fn prompt(&self) -> String {
        match self {
            Self::DuplicateSimilarity { text_a, text_b } => format!(
                "Compare the following texts and rate their semantic similarity as a percentage.\n\
                 Reply with the number only (0-100).\n\
                 \n\
                 Text 1: {text_a}\n\
                 Text 2: {text_b}\n"
            ),
            Self::TopicRelevance { topics, text } => format!(
                "Compare the following topics with this text and rate its relevance as a percentage.\n\
                 Reply with the number only (0-100).\n\
                 \n\
                 Topics: {topics}\n\
                 Text: {text}\n"
            ),
            Self::TopicExtraction { text } => format!(
                "Extract the main topics of this text as a short list.\n\
                 Reply with the topics only, one per line.\n\
                 \n\
                 Text: {text}\n"
            ),
            Self::TagSuggestion { text } => format!(
                "Analyse the following text and suggest up to 5 relevant tags describing its content.\n\
                 Reply with the tags only, one per line, without numbering or bullets.\n\
                 \n\
                 Text: {text}\n"
            ),
        }
    }
}

/// Parse a reply the way a leading-integer parser would: optional sign, then
/// digits, anything after is ignored. The value is clamped to `0..=100`.
pub fn parse_score(reply: &str) -> EngineResult<u8> {
    let trimmed = reply.trim();
    let caps = LEADING_INT
        .captures(trimmed)
        .ok_or_else(|| EngineError::parse("an integer score", reply))?;

    let negative = &caps[1] == "-";
    // digits only, so the parse can fail on overflow alone
    let value = caps[2].parse::<i64>().unwrap_or(i64::MAX);
    let value = if negative { -value } else { value };

    if !(0..=MAX_SCORE as i64).contains(&value) {
        log::debug!("classifier: clamping out-of-range score {value}");
    }

    Ok(value.clamp(0, MAX_SCORE as i64) as u8)
}

/// One entry per non-empty line, trimmed, in produced order.
pub fn parse_lines(reply: &str) -> Vec<String> {
    reply
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Clone)]
pub struct SemanticClassifier {
    generator: Arc<dyn TextGenerator>,
}

impl SemanticClassifier {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub async fn classify(&self, kind: PromptKind<'_>) -> EngineResult<ClassifierOutput> {
        let started = Instant::now();
        let reply = self.generator.generate(&kind.prompt()).await;

        log::debug!(
            "classifier: kind={} generator={} ok={} elapsed_ms={}",
            kind.label(),
            self.generator.name(),
            reply.is_ok(),
            started.elapsed().as_millis()
        );

        let reply = reply?;
        match kind.shape() {
            AnswerShape::Number => parse_score(&reply).map(ClassifierOutput::Score),
            AnswerShape::Lines => Ok(ClassifierOutput::List(parse_lines(&reply))),
        }
    }

    /// Classify with a numeric template.
    pub async fn score(&self, kind: PromptKind<'_>) -> EngineResult<u8> {
        match self.classify(kind).await? {
            ClassifierOutput::Score(score) => Ok(score),
            ClassifierOutput::List(_) => Err(EngineError::validation(format!(
                "{} prompts do not produce a score",
                kind.label()
            ))),
        }
    }

    /// Classify with a list template.
    pub async fn list(&self, kind: PromptKind<'_>) -> EngineResult<Vec<String>> {
        match self.classify(kind).await? {
            ClassifierOutput::List(items) => Ok(items),
            ClassifierOutput::Score(_) => Err(EngineError::validation(format!(
                "{} prompts do not produce a list",
                kind.label()
            ))),
        }
    }
}
