mod document;
mod gollum;

pub use document::{Document, Node};
pub use gollum::{DirectoryWiki, FilterContext, GollumTagsFilter, Wiki, WikiFile};
