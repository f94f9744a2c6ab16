//! Markdown list scanner producing the nesting records the parser consumes.

use std::path::Path;
use std::sync::LazyLock;

use mdkanban_core::{ListItem, ParsedFile, parse_file};
use regex::Regex;

static ITEM: LazyLock<Regex> = LazyLock::new(|| pattern(r"^([ \t]*)([-*+]|\d+[.)])(?:[ \t]+(\[[ xX]\])?|$)"));
static FENCE: LazyLock<Regex> = LazyLock::new(|| pattern(r"^[ \t]*(```|~~~)"));

#[allow(clippy::expect_used)]
fn pattern(source: &str) -> Regex {
    Regex::new(source).expect("built-in pattern must compile")
}

const TAB_WIDTH: usize = 4;

fn indent_width(indent: &str) -> usize {
    indent
        .chars()
        .map(|c| if c == '\t' { TAB_WIDTH } else { 1 })
        .sum()
}

/// Find list items and their parents in a Markdown document.
///
/// Nesting follows indentation (a tab counts as four columns). Blank lines and
/// indented continuation lines keep the list open; any other unindented text
/// ends it. Fenced code blocks are skipped.
#[must_use]
pub fn scan_list_items<S: AsRef<str>>(lines: &[S]) -> Vec<ListItem> {
    let mut items = Vec::new();
    // (indent width, line) of the open ancestors, innermost last.
    let mut open: Vec<(usize, usize)> = Vec::new();
    let mut fence: Option<String> = None;

    for (line, text) in lines.iter().map(AsRef::as_ref).enumerate() {
        if let Some(marker) = FENCE.captures(text).and_then(|caps| caps.get(1)) {
            match &fence {
                Some(open_marker) if open_marker == marker.as_str() => fence = None,
                Some(_) => {}
                None => fence = Some(marker.as_str().to_owned()),
            }
            continue;
        }
        if fence.is_some() {
            continue;
        }

        let Some(caps) = ITEM.captures(text) else {
            let continues = text.trim().is_empty() || text.starts_with([' ', '\t']);
            if !continues {
                open.clear();
            }
            continue;
        };
        let width = caps.get(1).map_or(0, |m| indent_width(m.as_str()));
        while open.last().is_some_and(|&(depth, _)| depth >= width) {
            open.pop();
        }
        items.push(ListItem {
            line,
            parent: open.last().map(|&(_, parent)| parent),
            // Checkboxes only count on bullet items.
            is_task: caps.get(3).is_some()
                && caps.get(2).is_some_and(|marker| !marker.as_str().starts_with(|c: char| c.is_ascii_digit())),
        });
        open.push((width, line));
    }
    items
}

/// Scan and parse a whole document.
#[must_use]
pub fn parse_document<S: AsRef<str>>(file: &Path, lines: &[S]) -> ParsedFile {
    let items = scan_list_items(lines);
    parse_file(file, lines, &items)
}
