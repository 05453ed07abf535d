//! Page extraction rules.
//!
//! Pure functions from a loaded HTML document to plain-text or URL records.
//! Every profile has a primary selector and a looser secondary one that is
//! only consulted when the primary matches nothing. Extraction never fails:
//! a structural mismatch yields an empty result and the caller decides.

use log::debug;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Minimum headline length in characters (exclusive)
const MIN_HEADLINE_CHARS: usize = 5;
const MAX_HEADLINES: usize = 10;
/// Bodies below this many characters are flagged but still returned
const SHORT_BODY_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionProfile {
    HeadlineList,
    ArticleBody,
    SearchResultLinks,
}

impl ExtractionProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HeadlineList => "headline_list",
            Self::ArticleBody => "article_body",
            Self::SearchResultLinks => "search_result_links",
        }
    }

    pub fn primary_selector(&self) -> &'static str {
        match self {
            Self::HeadlineList => r#"a[href*="/article/"], a[href*="/search/"]"#,
            Self::ArticleBody => ".article-body, #article_content, .main-text",
            Self::SearchResultLinks => r#"a[href^="/flag/search/"]"#,
        }
    }

    pub fn secondary_selector(&self) -> &'static str {
        match self {
            Self::HeadlineList => "h1, h2, h3",
            Self::ArticleBody => "body",
            Self::SearchResultLinks => r#"a[href*="/article/"]"#,
        }
    }
}

/// Records pulled out of one document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extracted {
    pub items: Vec<String>,
    /// Set when the secondary selector produced the items
    pub used_fallback: bool,
    /// Article body shorter than expected; a signal, not an error
    pub suspiciously_short: bool,
}

impl Extracted {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// First item, used by single-valued profiles such as `article_body`
    pub fn first(&self) -> Option<&str> {
        self.items.first().map(String::as_str)
    }
}

/// Run one extraction profile over an HTML document
pub fn extract(html: &str, profile: ExtractionProfile, base: Option<&Url>) -> Extracted {
    let document = Html::parse_document(html);

    let primary = run_selector(&document, profile, profile.primary_selector(), base);
    let (items, used_fallback) = if primary.is_empty() {
        let secondary = run_selector(&document, profile, profile.secondary_selector(), base);
        if !secondary.is_empty() {
            debug!(
                "{}: primary selector matched nothing, using secondary",
                profile.as_str()
            );
        }
        (secondary, true)
    } else {
        (primary, false)
    };

    let used_fallback = used_fallback && !items.is_empty();
    let suspiciously_short = profile == ExtractionProfile::ArticleBody
        && items
            .first()
            .map(|body| body.chars().count() < SHORT_BODY_CHARS)
            .unwrap_or(false);

    Extracted {
        items,
        used_fallback,
        suspiciously_short,
    }
}

/// Does the document contain at least one element matching `selector`
pub fn has_match(html: &str, selector: &str) -> bool {
    match Selector::parse(selector) {
        Ok(sel) => Html::parse_document(html).select(&sel).next().is_some(),
        Err(_) => false,
    }
}

fn run_selector(
    document: &Html,
    profile: ExtractionProfile,
    selector: &str,
    base: Option<&Url>,
) -> Vec<String> {
    let Ok(sel) = Selector::parse(selector) else {
        return Vec::new();
    };

    match profile {
        ExtractionProfile::HeadlineList => document
            .select(&sel)
            .map(visible_text)
            .filter(|text| text.chars().count() > MIN_HEADLINE_CHARS)
            .take(MAX_HEADLINES)
            .collect(),
        ExtractionProfile::ArticleBody => document
            .select(&sel)
            .map(visible_text)
            .find(|text| !text.is_empty())
            .into_iter()
            .collect(),
        ExtractionProfile::SearchResultLinks => document
            .select(&sel)
            .filter_map(|el| el.value().attr("href"))
            .map(|href| resolve(href, base))
            .collect(),
    }
}

fn resolve(href: &str, base: Option<&Url>) -> String {
    match base {
        Some(base) => base
            .join(href)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| href.to_string()),
        None => href.to_string(),
    }
}

/// Text of an element with scripts and styles skipped and whitespace collapsed
fn visible_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    for node in element.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map(|el| matches!(el.name(), "script" | "style" | "noscript"))
                .unwrap_or(false)
        });
        if !hidden {
            raw.push_str(text);
            raw.push(' ');
        }
    }
    normalize_whitespace(&raw)
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First `limit` characters, with an ellipsis when cut
pub fn preview(text: &str, limit: usize) -> String {
    if text.chars().count() > limit {
        let head: String = text.chars().take(limit).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Plain text of an HTML or XML fragment; tags become spaces
pub fn strip_tags(markup: &str) -> String {
    let fragment = Html::parse_fragment(markup);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    normalize_whitespace(&text)
}
