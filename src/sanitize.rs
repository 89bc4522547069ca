//! Markdown rendering and allow-list sanitization for the display and save
//! paths.

use std::collections::{HashMap, HashSet};

use ammonia::Builder;
use once_cell::sync::Lazy;
use pulldown_cmark::{html, Event, Options, Parser, Tag, TagEnd};
use serde::{Deserialize, Serialize};

use crate::engine::{EngineError, EngineResult};

pub const ALLOWED_TAGS: &[&str] = &[
    "p", "br", "b", "i", "em", "strong", "a", "ul", "ol", "li", "h1", "h2", "h3", "h4", "h5",
    "h6", "pre", "code", "blockquote", "del", "table", "thead", "tbody", "tr", "th", "td",
];

/// Allowed tags that open an HTML block when they start a line, so their
/// content is passed through raw when rendered again.
const BLOCK_TAGS: &[&str] = &[
    "p", "ul", "ol", "li", "h1", "h2", "h3", "h4", "h5", "h6", "pre", "blockquote", "table",
    "thead", "tbody", "tr", "th", "td",
];

/// Elements removed together with everything inside them.
const DROPPED_WITH_CONTENT: &[&str] = &["script", "style"];

const LINK_REL: &str = "noopener noreferrer";
const URL_SCHEMES: &[&str] = &["http", "https", "mailto"];

pub const MAX_TAG_LENGTH: usize = 50;

static HTML_POLICY: Lazy<Builder<'static>> = Lazy::new(|| {
    let mut builder = Builder::empty();
    builder
        .tags(ALLOWED_TAGS.iter().copied().collect())
        .clean_content_tags(DROPPED_WITH_CONTENT.iter().copied().collect())
        .generic_attributes(HashSet::from(["class"]))
        .tag_attributes(HashMap::from([("a", HashSet::from(["href"]))]))
        .url_schemes(URL_SCHEMES.iter().copied().collect())
        .link_rel(Some(LINK_REL))
        .set_tag_attribute_value("a", "target", "_blank")
        .strip_comments(true);
    builder
});

static TEXT_POLICY: Lazy<Builder<'static>> = Lazy::new(|| {
    let mut builder = Builder::empty();
    builder
        .clean_content_tags(DROPPED_WITH_CONTENT.iter().copied().collect())
        .strip_comments(true);
    builder
});

/// Convert markdown to HTML restricted to [`ALLOWED_TAGS`].
///
/// Links always open in a new tab with `rel="noopener noreferrer"`.
pub fn render(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut unsafe_html = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(
        &mut unsafe_html,
        settle_html_blocks(Parser::new_ext(markdown, options)).into_iter(),
    );

    HTML_POLICY.clean(&unsafe_html).to_string()
}

/// Clean every raw HTML block on its own and re-emit it in a shape that
/// parses back as the same HTML block.
fn settle_html_blocks<'a>(events: impl Iterator<Item = Event<'a>>) -> Vec<Event<'a>> {
    let mut out = Vec::new();
    let mut block: Option<String> = None;

    for event in events {
        match event {
            Event::Start(Tag::HtmlBlock) => block = Some(String::new()),
            Event::End(TagEnd::HtmlBlock) => {
                if let Some(html) = block.take().and_then(|raw| settle_html_block(&raw)) {
                    out.push(Event::Html(html.into()));
                }
            }
            Event::Html(html) => match block.as_mut() {
                Some(raw) => raw.push_str(&html),
                None => out.push(Event::Html(html)),
            },
            other => out.push(other),
        }
    }

    out
}

fn settle_html_block(raw: &str) -> Option<String> {
    let cleaned = HTML_POLICY.clean(raw).to_string();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }

    // pre blocks run to their closing tag, blank lines included
    if opening_tag(cleaned) == Some("pre") {
        return Some(format!("{cleaned}\n"));
    }

    // any other HTML block ends at a blank line
    let body = cleaned
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    match opening_tag(&body) {
        Some(tag) if BLOCK_TAGS.contains(&tag) => Some(format!("{body}\n")),
        _ => Some(format!("<p>{body}</p>\n")),
    }
}

/// Name of the tag `html` starts with, if it starts with one.
fn opening_tag(html: &str) -> Option<&str> {
    let rest = html.strip_prefix('<')?;
    let end = rest
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(rest.len());
    let name = &rest[..end];
    if name.is_empty() {
        return None;
    }

    match rest[end..].chars().next() {
        Some('>' | '/') | None => Some(name),
        Some(c) if c.is_whitespace() => Some(name),
        _ => None,
    }
}

/// Strip all markup, keeping (escaped) text content.
pub fn sanitize_text(text: &str) -> String {
    TEXT_POLICY.clean(text).to_string()
}

/// Absolute http(s)/mailto URL, normalized, or `None`.
pub fn sanitize_url(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.contains(['<', '>', '"', '\'']) || raw.contains(char::is_whitespace) {
        return None;
    }

    let parsed = url::Url::parse(raw).ok()?;
    if !URL_SCHEMES.contains(&parsed.scheme()) {
        log::debug!("sanitize: rejected url scheme '{}'", parsed.scheme());
        return None;
    }

    Some(parsed.to_string())
}

/// Plain-text, trimmed, lower-cased, de-duplicated tags of at most
/// [`MAX_TAG_LENGTH`] characters. First occurrence wins.
pub fn sanitize_tags<S: AsRef<str>>(tags: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();

    tags.iter()
        .map(|tag| sanitize_text(tag.as_ref()).trim().to_lowercase())
        .filter(|tag| !tag.is_empty() && tag.chars().count() <= MAX_TAG_LENGTH)
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}

/// A message as submitted for saving.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageDraft {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub category: Option<String>,
    pub is_public: Option<bool>,
}

/// A message ready for persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizedMessage {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub is_public: bool,
}

pub fn validate_and_sanitize_message(draft: &MessageDraft) -> EngineResult<SanitizedMessage> {
    let title = non_blank(draft.title.as_deref());
    let content = non_blank(draft.content.as_deref());

    let (Some(title), Some(content)) = (title, content) else {
        return Err(EngineError::validation("title and content are required"));
    };

    Ok(SanitizedMessage {
        title: sanitize_text(title),
        content: render(content),
        tags: draft.tags.as_deref().map(sanitize_tags::<String>).unwrap_or_default(),
        category: non_blank(draft.category.as_deref()).map(sanitize_text),
        is_public: draft.is_public.unwrap_or(false),
    })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
