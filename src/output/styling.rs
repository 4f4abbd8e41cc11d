use std::fmt::Display;

use console::{style, StyledObject};

/// Styles by role rather than by color.
pub fn notice(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().yellow()
}

pub fn succeeded(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().green()
}

pub fn failed(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().red()
}

pub fn muted(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).dim()
}

pub fn heading(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().underlined()
}

pub fn emphasis(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright()
}

pub fn banner_title(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).magenta().bold()
}
