//! Itinerary text rendering.
//!
//! Generated itineraries are free markdown delimited by the literal token
//! "Day". This module splits the text into per-day sections and renders each
//! section to HTML with tables and links enabled. Every anchor in the output
//! is forced to open in a new context without a referrer.

use comrak::{Options, markdown_to_html};
use regex::Regex;
use std::sync::LazyLock;

/// The literal token separating days in generated itineraries.
const DAY_TOKEN: &str = "Day";

static ANCHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<a href=").expect("valid anchor regex"));

/// Split itinerary text into day sections.
///
/// Splitting on every literal "Day" yields a leading preamble plus one part
/// per day; the preamble is discarded. Text without any "Day" token becomes a
/// single section labelled "1" followed by the raw text.
///
/// Sections do not carry the "Day" prefix; [`render_day`] adds it back.
#[must_use]
pub fn split_days(text: &str) -> Vec<String> {
    let mut parts: Vec<&str> = text.split(DAY_TOKEN).collect();
    if parts.len() > 1 {
        parts.remove(0);
        parts.into_iter().map(String::from).collect()
    } else {
        vec![format!("1{text}")]
    }
}

/// Render one day section to HTML.
#[must_use]
pub fn render_day(section: &str) -> String {
    rewrite_anchors(&render_markdown(&format!("{DAY_TOKEN}{section}")))
}

/// Render markdown to HTML with GFM-style tables enabled.
fn render_markdown(markdown: &str) -> String {
    let mut options = Options::default();
    options.extension.table = true;
    options.extension.strikethrough = true;
    options.extension.autolink = true;
    markdown_to_html(markdown, &options)
}

/// Force every anchor to open in a new context with no referrer.
fn rewrite_anchors(html: &str) -> String {
    ANCHOR_RE
        .replace_all(html, "<a target=\"_blank\" rel=\"noreferrer\" href=")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_discards_preamble() {
        let sections = split_days("PreambleDay 1: textDay 2: text");
        assert_eq!(sections, vec![" 1: text", " 2: text"]);
    }

    #[test]
    fn test_split_without_token_is_single_section() {
        let sections = split_days("just a note about the trip");
        assert_eq!(sections, vec!["1just a note about the trip"]);
    }

    #[test]
    fn test_split_empty_text() {
        let sections = split_days("");
        assert_eq!(sections, vec!["1"]);
    }

    #[test]
    fn test_render_day_prefixes_token() {
        let html = render_day(" 1: Visit the museum");
        assert!(html.contains("Day 1: Visit the museum"));
    }

    #[test]
    fn test_render_day_renders_markdown_links() {
        let html = render_day(" 1: [Louvre](https://example.test/louvre)");
        assert!(html.contains("href=\"https://example.test/louvre\""));
        assert!(html.contains(">Louvre</a>"));
    }

    #[test]
    fn test_rendered_anchors_open_in_new_context() {
        let html = render_day(" 1: [Louvre](https://example.test/louvre)");
        assert!(html.contains("target=\"_blank\""));
        assert!(html.contains("rel=\"noreferrer\""));
    }

    #[test]
    fn test_render_day_renders_tables() {
        let html = render_day(" 1:\n\n| Stop | Time |\n| --- | --- |\n| Louvre | 9am |\n");
        assert!(html.contains("<table>"));
        assert!(html.contains("<td>Louvre</td>"));
    }
}
