//! crates/scrollmine_core/src/extract.rs
//!
//! Builds page snapshots from the current document: selection, main-content
//! text, metadata, and the content type / social platform derived from the
//! page host.

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::{ItemType, PageMetadata, PageSnapshot, SocialPlatform};
use crate::ports::PageDocument;

/// Candidate regions for the main content, tried in order.
pub const CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    "[role=\"main\"]",
    ".content",
    ".post-content",
    ".entry-content",
    ".article-content",
    ".main-content",
    ".post-body",
    ".article-body",
    ".story-body",
    ".post-text",
];

/// Structural elements stripped from the body before the fallback extraction.
pub const NON_CONTENT_SELECTORS: &[&str] = &[
    "nav",
    "header",
    "footer",
    ".nav",
    ".header",
    ".footer",
    ".sidebar",
    ".menu",
    ".advertisement",
    ".ads",
    "script",
    "style",
    "iframe",
    ".social-share",
    ".comments",
];

/// A candidate region must hold more than this many characters to win.
pub const MIN_CONTENT_CHARS: usize = 200;

/// Extracted content is cut at this many characters.
pub const MAX_CONTENT_CHARS: usize = 3000;

pub const TRUNCATION_MARKER: &str = "...";

/// Host fragments mapped to content types; the first match wins.
const TYPE_TABLE: &[(&str, ItemType)] = &[
    ("twitter.com", ItemType::Tweet),
    ("x.com", ItemType::Tweet),
    ("linkedin.com", ItemType::Article),
    ("facebook.com", ItemType::Article),
    ("instagram.com", ItemType::Article),
    ("youtube.com", ItemType::Video),
    ("youtu.be", ItemType::Video),
    ("vimeo.com", ItemType::Video),
    ("medium.com", ItemType::Article),
    ("substack.com", ItemType::Article),
];

const PLATFORM_TABLE: &[(&str, SocialPlatform)] = &[
    ("twitter.com", SocialPlatform::Twitter),
    ("x.com", SocialPlatform::Twitter),
    ("linkedin.com", SocialPlatform::Linkedin),
    ("facebook.com", SocialPlatform::Facebook),
    ("instagram.com", SocialPlatform::Instagram),
    ("youtube.com", SocialPlatform::Youtube),
    ("youtu.be", SocialPlatform::Youtube),
];

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

//=========================================================================================
// Snapshot
//=========================================================================================

/// Captures `{title, url, selectedText, content, platform, type}` from `doc`.
pub fn snapshot(doc: &dyn PageDocument) -> PageSnapshot {
    let hostname = doc.hostname().unwrap_or_default();
    PageSnapshot {
        title: doc.title().unwrap_or_default(),
        url: doc.url().unwrap_or_default(),
        selected_text: selected_text(doc),
        content: page_content(doc),
        platform: social_platform(&hostname),
        item_type: content_type(&hostname),
    }
}

/// The trimmed current selection, or an empty string.
pub fn selected_text(doc: &dyn PageDocument) -> String {
    doc.selection_text()
        .map(|text| text.trim().to_string())
        .unwrap_or_default()
}

/// The main text of the page, whitespace-normalized and size-capped.
pub fn page_content(doc: &dyn PageDocument) -> String {
    let main_region = CONTENT_SELECTORS.iter().find_map(|selector| {
        doc.select_text(selector)
            .map(|text| text.trim().to_string())
            .filter(|text| text.chars().count() > MIN_CONTENT_CHARS)
    });

    let raw = main_region
        .or_else(|| doc.body_text_excluding(NON_CONTENT_SELECTORS))
        .unwrap_or_default();

    truncate_content(&normalize_whitespace(&raw))
}

/// Collapses every whitespace run to a single space and trims the ends.
pub fn normalize_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Cuts `text` to `MAX_CONTENT_CHARS` characters, appending the marker when cut.
pub fn truncate_content(text: &str) -> String {
    match text.char_indices().nth(MAX_CONTENT_CHARS) {
        Some((cut, _)) => format!("{}{}", &text[..cut], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

//=========================================================================================
// Metadata
//=========================================================================================

pub fn metadata(doc: &dyn PageDocument) -> PageMetadata {
    let first_meta = |selectors: &[&str]| {
        selectors
            .iter()
            .find_map(|selector| doc.meta_content(selector).filter(|v| !v.is_empty()))
            .unwrap_or_default()
    };

    let tags = doc
        .meta_content("meta[name=\"keywords\"]")
        .map(|keywords| {
            keywords
                .split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    PageMetadata {
        title: doc.title().unwrap_or_default(),
        url: doc.url().unwrap_or_default(),
        description: first_meta(&[
            "meta[name=\"description\"]",
            "meta[property=\"og:description\"]",
        ]),
        author: first_meta(&[
            "meta[name=\"author\"]",
            "meta[property=\"article:author\"]",
        ]),
        published_date: first_meta(&[
            "meta[property=\"article:published_time\"]",
            "meta[name=\"date\"]",
        ]),
        tags,
    }
}

//=========================================================================================
// Host classification
//=========================================================================================

/// Content type of a page, from substring matches on its hostname.
pub fn content_type(hostname: &str) -> ItemType {
    let host = hostname.to_lowercase();
    TYPE_TABLE
        .iter()
        .find(|(fragment, _)| host.contains(fragment))
        .map(|(_, item_type)| *item_type)
        .unwrap_or(ItemType::Article)
}

pub fn social_platform(hostname: &str) -> Option<SocialPlatform> {
    let host = hostname.to_lowercase();
    PLATFORM_TABLE
        .iter()
        .find(|(fragment, _)| host.contains(fragment))
        .map(|(_, platform)| *platform)
}

/// Content type for a URL string, for contexts that only know the tab URL.
pub fn content_type_for_url(url: &str) -> ItemType {
    hostname_of(url)
        .map(|host| content_type(&host))
        .unwrap_or(ItemType::Article)
}

/// Extracts the lowercase hostname from a URL string.
pub fn hostname_of(url: &str) -> Option<String> {
    let trimmed = url.trim();
    let without_scheme = trimmed
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(trimmed);

    // Drop the path, then any credentials and port.
    let authority = without_scheme.split(['/', '?', '#']).next()?;
    let host_port = authority.rsplit('@').next()?;
    let host = host_port.split(':').next()?.to_lowercase();

    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}
