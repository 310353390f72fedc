use console::{style, StyledObject};
use std::fmt::Display;

fn styled(text: impl Display) -> StyledObject<String> {
    style(text.to_string())
}

/// Section and phase titles.
pub fn heading(text: impl Display) -> StyledObject<String> {
    styled(text).bright().underlined()
}

/// Work in progress and counts worth noticing.
pub fn highlight(text: impl Display) -> StyledObject<String> {
    styled(text).bright().yellow()
}

pub fn success(text: impl Display) -> StyledObject<String> {
    styled(text).bright().green()
}

/// Identifiers taken from the pipeline (project path, ref, source).
pub fn value(text: impl Display) -> StyledObject<String> {
    styled(text).cyan()
}

pub fn dim(text: impl Display) -> StyledObject<String> {
    styled(text).dim()
}

pub fn emoji(text: impl Display) -> StyledObject<String> {
    styled(text).bright()
}

pub fn title(text: impl Display) -> StyledObject<String> {
    styled(text).magenta().bold()
}
