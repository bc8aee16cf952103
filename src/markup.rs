//! Line-oriented parser for the entry body syntax.
//!
//! This is not markdown. Each physical line is classified on its own, in
//! this order: heading, epigraph, subtitle, scene break, rule, table row,
//! aside, paragraph. Anything unrecognised becomes a paragraph; nothing is
//! an error.

use regex::Regex;
use std::sync::OnceLock;

/// Bold-only lines at or above this many characters are paragraphs.
pub const HEADING_MAX_CHARS: usize = 80;

pub const SCENE_BREAKS: [&str; 3] = ["* * *", "⁂", "~"];

pub const RULE: &str = "---";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    Bold(String),
    Italic(String),
}

pub type Cell = Vec<Inline>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading(String),
    Subtitle(String),
    Epigraph(String),
    SceneBreak,
    Rule,
    Table { headers: Vec<Cell>, rows: Vec<Vec<Cell>> },
    Aside(Vec<Inline>),
    Paragraph(Vec<Inline>),
}

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\*\*([^*]+)\*\*$").unwrap())
}

fn italic_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\*([^*]+)\*$").unwrap())
}

fn emphasis_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*(.+?)\*\*|\*([^*]+)\*").unwrap())
}

pub fn parse(content: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut table: Vec<&str> = Vec::new();

    for raw in content.lines() {
        let line = raw.trim();
        if line.starts_with('|') {
            table.push(line);
            continue;
        }
        if !table.is_empty() {
            blocks.push(build_table(&table));
            table.clear();
        }
        if line.is_empty() {
            continue;
        }
        blocks.push(classify(line));
    }
    if !table.is_empty() {
        blocks.push(build_table(&table));
    }
    blocks
}

fn classify(line: &str) -> Block {
    if let Some(caps) = heading_re().captures(line) {
        let text = caps[1].trim();
        if text.chars().count() < HEADING_MAX_CHARS {
            return Block::Heading(text.to_string());
        }
    }
    if let Some(caps) = italic_line_re().captures(line) {
        let text = caps[1].trim();
        if is_epigraph(text) {
            return Block::Epigraph(dashes(text));
        }
        return Block::Subtitle(dashes(text));
    }
    if SCENE_BREAKS.contains(&line) {
        return Block::SceneBreak;
    }
    if line == RULE {
        return Block::Rule;
    }
    if line.len() > 2 && line.starts_with('[') && line.ends_with(']') {
        return Block::Aside(inline(&line[1..line.len() - 1]));
    }
    Block::Paragraph(inline(line))
}

/// Quoted lines and lines with an attribution dash are epigraphs.
fn is_epigraph(text: &str) -> bool {
    text.starts_with('"') || text.starts_with('“') || text.contains(" — ")
}

fn dashes(text: &str) -> String {
    text.replace(RULE, "—")
}

/// Splits a line into plain, bold and italic runs.
pub fn inline(text: &str) -> Vec<Inline> {
    let mut runs = Vec::new();
    let mut last = 0;
    for caps in emphasis_re().captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() > last {
            runs.push(Inline::Text(dashes(&text[last..whole.start()])));
        }
        if let Some(bold) = caps.get(1) {
            runs.push(Inline::Bold(dashes(bold.as_str())));
        } else if let Some(italic) = caps.get(2) {
            runs.push(Inline::Italic(dashes(italic.as_str())));
        }
        last = whole.end();
    }
    if last < text.len() {
        runs.push(Inline::Text(dashes(&text[last..])));
    }
    runs
}

pub fn plain_text(runs: &[Inline]) -> String {
    runs.iter()
        .map(|run| match run {
            Inline::Text(s) | Inline::Bold(s) | Inline::Italic(s) => s.as_str(),
        })
        .collect()
}

fn split_row(line: &str) -> Vec<&str> {
    let line = line.trim();
    let line = line.strip_prefix('|').unwrap_or(line);
    let line = line.strip_suffix('|').unwrap_or(line);
    line.split('|').map(str::trim).collect()
}

fn is_separator(cells: &[&str]) -> bool {
    cells
        .iter()
        .all(|c| !c.is_empty() && c.chars().all(|ch| matches!(ch, '-' | ':' | ' ')))
}

/// First row is the header; separator rows are dropped and every data row
/// is padded or cut to the header's column count.
fn build_table(lines: &[&str]) -> Block {
    let mut rows = lines.iter().map(|l| split_row(l));
    let header_cells = rows.next().unwrap_or_default();
    let columns = header_cells.len();
    let headers = header_cells.iter().map(|c| inline(c)).collect();
    let rows = rows
        .filter(|cells| !is_separator(cells))
        .map(|cells| {
            (0..columns)
                .map(|i| cells.get(i).map(|c| inline(c)).unwrap_or_default())
                .collect()
        })
        .collect();
    Block::Table { headers, rows }
}
