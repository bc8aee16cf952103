use ratatui::prelude::*;

use crate::config::Theme;
use crate::markup::{Block as MarkupBlock, Cell, Inline, plain_text};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Inline,
    Reading,
}

#[derive(Debug, Clone, Copy)]
pub struct RenderStyle {
    pub width: usize,
    pub variant: Variant,
    pub theme: Theme,
}

impl RenderStyle {
    fn reading(&self) -> bool {
        self.variant == Variant::Reading
    }

    fn base(&self) -> Style {
        Style::default().fg(self.theme.text())
    }

    fn muted(&self) -> Style {
        Style::default().fg(self.theme.muted())
    }

    fn centered(&self, line: Line<'static>) -> Line<'static> {
        if self.reading() { line.alignment(Alignment::Center) } else { line }
    }
}

pub fn render_blocks(blocks: &[MarkupBlock], style: &RenderStyle) -> Vec<Line<'static>> {
    let width = style.width.max(8);
    let mut lines = Vec::new();
    let mut previous: Option<&MarkupBlock> = None;

    for block in blocks {
        if let Some(prev) = previous {
            if style.reading() || needs_gap(prev, block) {
                lines.push(Line::default());
            }
        }
        match block {
            MarkupBlock::Heading(text) => {
                let s = Style::default()
                    .fg(style.theme.accent)
                    .add_modifier(Modifier::BOLD);
                let s = if style.reading() { s } else { s.add_modifier(Modifier::UNDERLINED) };
                for row in textwrap::wrap(text, width) {
                    lines.push(style.centered(Line::from(Span::styled(row.into_owned(), s))));
                }
            }
            MarkupBlock::Subtitle(text) => {
                let s = style.muted().add_modifier(Modifier::ITALIC);
                for row in textwrap::wrap(text, width) {
                    lines.push(style.centered(Line::from(Span::styled(row.into_owned(), s))));
                }
            }
            MarkupBlock::Epigraph(text) => {
                let s = style.muted().add_modifier(Modifier::ITALIC | Modifier::DIM);
                let options = textwrap::Options::new(width.saturating_sub(4).max(4))
                    .initial_indent("    ")
                    .subsequent_indent("    ");
                for row in textwrap::wrap(text, options) {
                    lines.push(style.centered(Line::from(Span::styled(row.into_owned(), s))));
                }
            }
            MarkupBlock::SceneBreak => {
                lines.push(
                    Line::from(Span::styled("✦   ✦   ✦", Style::default().fg(style.theme.accent)))
                        .alignment(Alignment::Center),
                );
            }
            MarkupBlock::Rule => {
                lines.push(Line::from(Span::styled("─".repeat(width), style.muted())));
            }
            MarkupBlock::Table { headers, rows } => {
                lines.extend(render_table(headers, rows, width, style));
            }
            MarkupBlock::Aside(runs) => {
                let s = style.muted().add_modifier(Modifier::ITALIC);
                for mut line in wrap_runs(runs, width.saturating_sub(2), s) {
                    line.spans.insert(0, Span::styled("│ ", Style::default().fg(style.theme.accent)));
                    lines.push(line);
                }
            }
            MarkupBlock::Paragraph(runs) => {
                lines.extend(wrap_runs(runs, width, style.base()));
            }
        }
        previous = Some(block);
    }
    lines
}

/// Headings sit directly on their captions; everything else is spaced.
fn needs_gap(previous: &MarkupBlock, next: &MarkupBlock) -> bool {
    !matches!(
        (previous, next),
        (MarkupBlock::Heading(_), MarkupBlock::Subtitle(_) | MarkupBlock::Epigraph(_))
    )
}

fn run_style(run: &Inline, base: Style) -> (String, Style) {
    match run {
        Inline::Text(s) => (s.clone(), base),
        Inline::Bold(s) => (s.clone(), base.add_modifier(Modifier::BOLD)),
        Inline::Italic(s) => (s.clone(), base.add_modifier(Modifier::ITALIC)),
    }
}

/// Greedy word wrap that keeps each run's style. Words longer than the
/// width get a line of their own and are left for the widget to clip.
pub fn wrap_runs(runs: &[Inline], width: usize, base: Style) -> Vec<Line<'static>> {
    // (word, style, glued to the previous word)
    let mut words: Vec<(String, Style, bool)> = Vec::new();
    let mut pending_space = false;
    for run in runs {
        let (text, style) = run_style(run, base);
        let mut current = String::new();
        for c in text.chars() {
            if c.is_whitespace() {
                if !current.is_empty() {
                    words.push((std::mem::take(&mut current), style, !pending_space));
                }
                pending_space = true;
            } else {
                if current.is_empty() && words.is_empty() {
                    pending_space = false;
                }
                current.push(c);
            }
        }
        if !current.is_empty() {
            words.push((current, style, !pending_space));
            pending_space = false;
        }
    }

    let width = width.max(1);
    let mut lines = Vec::new();
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut used = 0;
    for (word, style, glued) in words {
        let len = word.chars().count();
        let gap = usize::from(!glued && used > 0);
        if used > 0 && used + gap + len > width {
            lines.push(Line::from(std::mem::take(&mut spans)));
            used = 0;
        } else if gap == 1 {
            spans.push(Span::styled(" ", base));
            used += 1;
        }
        used += len;
        spans.push(Span::styled(word, style));
    }
    if !spans.is_empty() {
        lines.push(Line::from(spans));
    }
    lines
}

fn render_table(headers: &[Cell], rows: &[Vec<Cell>], width: usize, style: &RenderStyle) -> Vec<Line<'static>> {
    let columns = headers.len().max(1);
    let mut widths: Vec<usize> = (0..columns)
        .map(|i| {
            let header = headers.get(i).map(|c| plain_text(c).chars().count()).unwrap_or(0);
            rows.iter()
                .filter_map(|r| r.get(i))
                .map(|c| plain_text(c).chars().count())
                .fold(header, usize::max)
                .max(1)
        })
        .collect();

    let separators = 3 * (columns - 1);
    let cap = (width.saturating_sub(separators) / columns).max(4);
    if widths.iter().sum::<usize>() + separators > width {
        for w in &mut widths {
            *w = (*w).min(cap);
        }
    }

    let border = Style::default().fg(style.theme.muted());
    let header_style = Style::default()
        .fg(style.theme.accent)
        .add_modifier(Modifier::BOLD);

    let row_line = |cells: &[Cell], base: Style| {
        let mut spans = Vec::new();
        for (i, w) in widths.iter().enumerate() {
            if i > 0 {
                spans.push(Span::styled(" │ ", border));
            }
            let empty = Vec::new();
            spans.extend(cell_spans(cells.get(i).unwrap_or(&empty), *w, base));
        }
        Line::from(spans)
    };

    let mut lines = vec![row_line(headers, header_style)];
    let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
    lines.push(Line::from(Span::styled(rule.join("─┼─"), border)));
    for row in rows {
        lines.push(row_line(row, style.base()));
    }
    lines
}

fn cell_spans(cell: &[Inline], width: usize, base: Style) -> Vec<Span<'static>> {
    let text = plain_text(cell);
    let len = text.chars().count();
    if len > width {
        let cut: String = text.chars().take(width.saturating_sub(1)).collect();
        return vec![Span::styled(format!("{cut}…"), base)];
    }
    let mut spans: Vec<Span<'static>> = cell
        .iter()
        .map(|run| {
            let (text, style) = run_style(run, base);
            Span::styled(text, style)
        })
        .collect();
    spans.push(Span::styled(" ".repeat(width - len), base));
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Theme;
    use crate::markup::parse;

    fn line_text(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn style(width: usize, variant: Variant) -> RenderStyle {
        RenderStyle {
            width,
            variant,
            theme: Theme::default(),
        }
    }

    #[test]
    fn heading_renders_one_line_without_asterisks() {
        let lines = render_blocks(&parse("**Overview**"), &style(40, Variant::Inline));
        assert_eq!(lines.len(), 1);
        assert_eq!(line_text(&lines[0]), "Overview");
    }

    #[test]
    fn table_renders_header_rule_and_rows() {
        let blocks = parse("| A | B |\n|---|---|\n| 1 | 2 |\n| 3 | 4 |");
        let lines = render_blocks(&blocks, &style(40, Variant::Inline));
        assert_eq!(lines.len(), 4);
        assert_eq!(line_text(&lines[0]), "A │ B");
        assert_eq!(line_text(&lines[3]), "3 │ 4");
    }

    #[test]
    fn paragraphs_wrap_and_keep_punctuation_attached() {
        let runs = vec![
            Inline::Text("eyes on the ".into()),
            Inline::Bold("ridge".into()),
            Inline::Text(", never on the ground".into()),
        ];
        let lines = wrap_runs(&runs, 18, Style::default());
        let texts: Vec<_> = lines.iter().map(line_text).collect();
        assert_eq!(texts, vec!["eyes on the ridge,", "never on the", "ground"]);
        assert!(lines.iter().all(|l| line_text(l).chars().count() <= 18));
    }

    #[test]
    fn reading_variant_spaces_every_block() {
        let blocks = parse("**Title**\n*caption*\nBody.");
        let inline = render_blocks(&blocks, &style(40, Variant::Inline));
        let reading = render_blocks(&blocks, &style(40, Variant::Reading));
        assert_eq!(inline.len(), 4);
        assert_eq!(reading.len(), 5);
    }

    #[test]
    fn wide_tables_are_truncated_to_fit() {
        let blocks = parse("| Name | Description |\n|---|---|\n| x | a very long description that cannot fit |");
        let lines = render_blocks(&blocks, &style(24, Variant::Inline));
        assert!(lines.iter().all(|l| line_text(l).chars().count() <= 24));
        assert!(line_text(&lines[2]).ends_with('…'));
    }
}
