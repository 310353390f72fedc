//! Gollum wiki tags: `[[page]]`, `[[text|target]]` and `[[image.png]]`.

use std::path::{Component, Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use super::document::{Document, Node};
use crate::error::{Result, SeedError};

static TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[(.+?)\]\]").expect("gollum tag pattern is valid"));

static IMAGE_EXTENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(jpg|jpeg|png|gif)$").expect("image pattern is valid"));

/// A file found in a wiki repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiFile {
    /// Path relative to the wiki root
    pub path: String,
}

/// Queryable wiki the tags filter resolves internal images against.
pub trait Wiki {
    fn find_file(&self, path: &str) -> Option<WikiFile>;

    /// Base path wiki files are served from (e.g., "/group/project/wikis").
    fn wiki_base_path(&self) -> String;
}

/// Wiki backed by a checked-out directory.
#[derive(Debug, Clone)]
pub struct DirectoryWiki {
    root: PathBuf,
    base_path: String,
}

impl DirectoryWiki {
    pub fn new(root: impl Into<PathBuf>, base_path: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_path: base_path.into(),
        }
    }
}

impl Wiki for DirectoryWiki {
    fn find_file(&self, path: &str) -> Option<WikiFile> {
        let relative = Path::new(path);
        if !relative
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
        {
            return None;
        }

        self.root.join(relative).is_file().then(|| WikiFile {
            path: path.trim_start_matches("./").to_string(),
        })
    }

    fn wiki_base_path(&self) -> String {
        self.base_path.clone()
    }
}

/// Context handed to markup filters.
#[derive(Default, Clone, Copy)]
pub struct FilterContext<'a> {
    pub project_wiki: Option<&'a dyn Wiki>,
}

/// Expands Gollum-style tags into links and images.
///
/// - `[[images/logo.png]]` becomes an image when the wiki contains the file
/// - `[[http://example.com/logo.png]]` becomes an image with the URL as source
/// - `[[page]]` and `[[http://example.com]]` become links to themselves
/// - `[[text|target]]` becomes a link labelled `text`, or an image with `text`
///   as alt text when `target` resolves to an image
pub struct GollumTagsFilter;

impl GollumTagsFilter {
    const NAME: &'static str = "GollumTagsFilter";

    /// # Errors
    ///
    /// Returns [`SeedError::MissingContextKeys`] when no wiki is provided.
    pub fn call(text: &str, context: &FilterContext<'_>) -> Result<Document> {
        let wiki = context
            .project_wiki
            .ok_or_else(|| SeedError::MissingContextKeys {
                filter: Self::NAME.to_string(),
                keys: "project_wiki".to_string(),
            })?;

        let mut document = Document::default();
        let mut last = 0;

        for captures in TAG_PATTERN.captures_iter(text) {
            let (Some(tag), Some(content)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            document.push_text(&text[last..tag.start()]);
            match process_tag(content.as_str(), wiki) {
                Some(node) => document.push(node),
                None => document.push_text(tag.as_str()),
            }
            last = tag.end();
        }
        document.push_text(&text[last..]);

        Ok(document)
    }
}

fn process_tag(content: &str, wiki: &dyn Wiki) -> Option<Node> {
    let parts: Vec<&str> = content.split('|').map(str::trim).collect();
    let (text, target) = match parts.as_slice() {
        [target] => (None, *target),
        [text, target, ..] => (Some(*text), *target),
        [] => return None,
    };
    if target.is_empty() {
        return None;
    }

    if let Some(src) = image_source(target, wiki) {
        return Some(Node::Image {
            src,
            alt: text.filter(|t| !t.is_empty()).map(ToString::to_string),
        });
    }

    Some(Node::Link {
        text: text.filter(|t| !t.is_empty()).unwrap_or(target).to_string(),
        href: target.to_string(),
    })
}

fn image_source(target: &str, wiki: &dyn Wiki) -> Option<String> {
    if !IMAGE_EXTENSION.is_match(target) {
        return None;
    }
    if is_url(target) {
        return Some(target.to_string());
    }
    wiki.find_file(target).map(|file| {
        format!(
            "{}/{}",
            wiki.wiki_base_path().trim_end_matches('/'),
            file.path
        )
    })
}

fn is_url(target: &str) -> bool {
    Url::parse(target).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}
