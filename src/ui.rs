use std::time::Instant;

use ratatui::layout::{Flex, Margin};
use ratatui::{prelude::*, widgets::*};

use crate::app::{App, AppState};
use crate::config::Theme;
use crate::editor::{EditForm, Field};
use crate::markup::parse;
use crate::model::{EntryRef, Placement};
use crate::nav::{Focus, NavRow};
use crate::render::{RenderStyle, Variant, render_blocks};
use crate::search::snippet;

const SIDEBAR_WIDTH: u16 = 34;

fn border(theme: Theme, title: &str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.accent))
        .title(Span::styled(format!(" {} ", title), Style::default().fg(theme.accent)))
}

pub fn ui(f: &mut Frame, app: &mut App) {
    let now = Instant::now();
    let theme = app.theme;
    f.render_widget(
        Block::default().style(Style::default().bg(theme.background()).fg(theme.text())),
        f.area(),
    );

    let screen = if app.state == AppState::Editing {
        underlying_state(app)
    } else {
        app.state
    };

    if screen == AppState::Reading {
        render_reading(f, app, f.area());
    } else {
        let bottom_height = if screen == AppState::Searching { 3 } else { 1 };
        let c = Layout::vertical([Constraint::Min(0), Constraint::Length(bottom_height)]).split(f.area());
        let (main_area, bottom_area) = (c[0], c[1]);

        if screen == AppState::Timeline {
            render_timeline(f, app, main_area);
        } else {
            let h = Layout::horizontal([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(20)]).split(main_area);
            render_sidebar(f, app, h[0]);
            match screen {
                AppState::Searching => render_results(f, app, h[1]),
                _ => match app.nav.focus().clone() {
                    Focus::Home => render_home(f, app, h[1], now),
                    Focus::Category(key) => render_category(f, app, h[1], &key),
                    Focus::Entry { .. } => render_entry(f, app, h[1]),
                },
            }
        }

        if screen == AppState::Searching {
            f.render_widget(
                Paragraph::new(format!("{}▏", app.query))
                    .style(Style::default().fg(theme.accent))
                    .block(border(theme, "Search")),
                bottom_area,
            );
        } else {
            render_status(f, app, bottom_area);
        }
    }

    if app.state == AppState::Editing {
        if let Some(form) = &app.form {
            render_editor(f, app, form, f.area());
        }
    }
}

/// The screen drawn behind the edit form.
fn underlying_state(app: &App) -> AppState {
    match app.nav.focus() {
        Focus::Home => AppState::Home,
        _ => AppState::Browsing,
    }
}

fn render_status(f: &mut Frame, app: &App, area: Rect) {
    let theme = app.theme;
    let (text, style) = match &app.toast {
        Some(toast) if toast.error => (
            format!(" {} ", toast.message),
            Style::default().bg(Color::Red).fg(Color::White),
        ),
        Some(toast) => (format!(" {} ", toast.message), Style::default().bg(theme.accent).fg(Color::Black)),
        None => {
            let hints = match app.state {
                AppState::Timeline => " [ j/k: Scroll ] [ n/p: Era ] [ Esc: Back ] ",
                AppState::Home => " [ /: Search ] [ Enter: Open ] [ ←/→: Eras ] [ t: Timeline ] [ n: New ] [ q: Quit ] ",
                _ => " [ /: Search ] [ r: Read ] [ e: Edit ] [ n: New ] [ [/]: Prev/Next ] [ Esc: Back ] [ q: Quit ] ",
            };
            (hints.to_string(), Style::default().bg(theme.accent).fg(Color::Black))
        }
    };
    f.render_widget(Paragraph::new(text).style(style), area);
}

fn render_sidebar(f: &mut Frame, app: &App, area: Rect) {
    let theme = app.theme;
    let rows = app.rows();
    let focus = app.nav.focus();
    let muted = Style::default().fg(theme.muted());

    let items: Vec<ListItem> = rows
        .iter()
        .map(|row| match row {
            NavRow::Category {
                title,
                icon,
                expanded,
                count,
                key,
            } => {
                let arrow = if *expanded { "▾" } else { "▸" };
                let icon = icon.as_deref().unwrap_or("•");
                let active = matches!(focus, Focus::Category(c) if c == key);
                let style = Style::default().fg(theme.accent).add_modifier(if active {
                    Modifier::BOLD | Modifier::UNDERLINED
                } else {
                    Modifier::BOLD
                });
                ListItem::new(Line::from(vec![
                    Span::styled(format!("{arrow} {icon} {title}"), style),
                    Span::styled(format!(" ({count})"), muted),
                ]))
            }
            NavRow::Heading { depth, title } => ListItem::new(Span::styled(
                format!("{}{}", "  ".repeat(*depth as usize), title),
                muted.add_modifier(Modifier::ITALIC),
            )),
            NavRow::Entry {
                category,
                key,
                title,
                depth,
            } => {
                let active = matches!(focus, Focus::Entry { category: c, entry } if c == category && entry == key);
                let style = if active {
                    Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(theme.text())
                };
                ListItem::new(Span::styled(format!("{}{}", "  ".repeat(*depth as usize), title), style))
            }
        })
        .collect();

    let sidebar_focused = matches!(app.state, AppState::Home | AppState::Browsing);
    let highlight = if sidebar_focused {
        Style::default().bg(theme.accent).fg(Color::Black)
    } else {
        Style::default().add_modifier(Modifier::REVERSED)
    };
    let mut state = ListState::default();
    state.select(Some(app.cursor));
    let list = List::new(items).highlight_style(highlight).block(border(theme, "Sethael"));
    f.render_stateful_widget(list, area, &mut state);
}

fn render_home(f: &mut Frame, app: &App, area: Rect, now: Instant) {
    let theme = app.theme;
    let block = border(theme, "Home");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let c = Layout::vertical([Constraint::Length(4), Constraint::Length(13), Constraint::Min(0)]).split(inner);

    let banner = vec![
        Line::from(Span::styled(
            "The Encyclopedia of Sethael",
            Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            format!(
                "{} categories · {} entries",
                app.wiki.categories.len(),
                app.wiki.entry_count()
            ),
            Style::default().fg(theme.muted()),
        )),
    ];
    f.render_widget(Paragraph::new(banner).alignment(Alignment::Center), c[0]);

    let teaser = Block::default()
        .borders(Borders::TOP | Borders::BOTTOM)
        .border_style(Style::default().fg(theme.muted()))
        .title(Span::styled(" Eras ", Style::default().fg(theme.accent)));
    let teaser_inner = teaser.inner(c[1]);
    f.render_widget(teaser, c[1]);
    let width = teaser_inner.width.saturating_sub(4) as usize;
    f.render_widget(Paragraph::new(app.carousel.lines(theme, width, now)), teaser_inner);

    let controls = vec![
        Line::from("Controls"),
        Line::from("────────"),
        Line::from("  j / k   : Move         Enter : Open / Expand"),
        Line::from("  Esc     : Back         /     : Search"),
        Line::from("  [ / ]   : Prev / Next  r     : Reading mode"),
        Line::from("  e / n   : Edit / New   t     : Timeline"),
        Line::from("  ← / →   : Eras         T     : Light / Dark"),
        Line::from("  q       : Quit"),
    ];
    f.render_widget(Paragraph::new(controls).alignment(Alignment::Center), c[2]);
}

fn render_category(f: &mut Frame, app: &App, area: Rect, key: &str) {
    let theme = app.theme;
    let Some(category) = app.wiki.category(key) else {
        return;
    };
    let block = border(theme, &category.title);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let width = inner.width.saturating_sub(4) as usize;
    let mut lines = vec![
        Line::from(Span::styled(
            format!("{} entries", category.entries.len()),
            Style::default().fg(theme.muted()),
        )),
        Line::default(),
    ];
    for entry in category.entries.values() {
        lines.push(Line::from(Span::styled(
            entry.title.clone(),
            Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(Span::styled(
            format!("  {}", snippet(entry, "", width)),
            Style::default().fg(theme.muted()),
        )));
    }
    f.render_widget(Paragraph::new(lines), inner);
}

fn meta_line(theme: Theme, e: &EntryRef<'_>, position: Option<(usize, usize)>) -> Line<'static> {
    let muted = Style::default().fg(theme.muted());
    let mut spans = vec![Span::styled(e.category.title.clone(), muted)];
    if let Some(group) = e.category.resolved_group(e.entry) {
        spans.push(Span::styled(format!(" · {}", group.title), muted));
    }
    if let Placement::Volume { .. } = e.entry.placement {
        if let Some((book, volume)) = e.category.resolved_volume(e.entry) {
            spans.push(Span::styled(format!(" · {}", book.title), muted));
            if let Some(volume) = volume {
                spans.push(Span::styled(format!(" · {}", volume.title), muted));
            }
        }
    }
    for tag in &e.entry.tags {
        spans.push(Span::styled(format!("  #{tag}"), Style::default().fg(theme.accent)));
    }
    if let Some((at, total)) = position {
        spans.push(Span::styled(format!("   {}/{}", at + 1, total), muted));
    }
    Line::from(spans)
}

fn render_entry(f: &mut Frame, app: &mut App, area: Rect) {
    let theme = app.theme;
    let total = app.wiki.entry_count();
    let Some(e) = app.selected_entry() else {
        return;
    };
    let block = border(theme, &e.entry.title);
    let inner = block.inner(area);

    let style = RenderStyle {
        width: inner.width.saturating_sub(1) as usize,
        variant: Variant::Inline,
        theme,
    };
    let position = app.wiki.position(e.category_key, e.entry_key).map(|p| (p, total));
    let mut lines = vec![
        meta_line(theme, &e, position),
        Line::from(Span::styled(
            "─".repeat(inner.width as usize),
            Style::default().fg(theme.muted()),
        )),
    ];
    lines.extend(render_blocks(&parse(&e.entry.content), &style));

    let max = lines.len().saturating_sub(1) as u16;
    app.entry_scroll = app.entry_scroll.min(max);
    f.render_widget(block, area);
    f.render_widget(Paragraph::new(lines).scroll((app.entry_scroll, 0)), inner);
}

fn render_results(f: &mut Frame, app: &mut App, area: Rect) {
    let theme = app.theme;
    let query = app.query.clone();
    let hits = app.search_hits().to_vec();
    let title = if query.trim().is_empty() {
        "Search".to_string()
    } else {
        format!("{} results", hits.len())
    };
    let width = area.width.saturating_sub(6) as usize;

    let items: Vec<ListItem> = hits
        .iter()
        .enumerate()
        .filter_map(|(i, (category, key))| {
            let cat = app.wiki.category(category)?;
            let entry = cat.entries.get(key)?;
            let selected = i == app.result_index;
            let style = if selected {
                Style::default().fg(Color::Black).bg(theme.accent)
            } else {
                Style::default()
            };
            Some(
                ListItem::new(vec![
                    Line::from(vec![
                        Span::raw(format!(" {} ", entry.title)),
                        Span::styled(format!("· {}", cat.title), Style::default().fg(theme.muted())),
                    ]),
                    Line::from(Span::styled(
                        format!("   {}", snippet(entry, &query, width)),
                        Style::default().fg(theme.muted()),
                    )),
                ])
                .style(style),
            )
        })
        .collect();
    f.render_widget(List::new(items).block(border(theme, &title)), area);
}

fn render_reading(f: &mut Frame, app: &mut App, area: Rect) {
    let theme = app.theme;
    let Some(e) = app.selected_entry() else {
        return;
    };
    let c = Layout::vertical([Constraint::Length(2), Constraint::Min(0), Constraint::Length(1)]).split(area);
    let column = Layout::horizontal([Constraint::Percentage(app.reading.column_percent())])
        .flex(Flex::Center)
        .split(c[1])[0];

    let header = Line::from(vec![
        Span::styled(e.category.title.clone(), Style::default().fg(theme.muted())),
        Span::styled("  ·  ", Style::default().fg(theme.muted())),
        Span::styled(
            e.entry.title.clone(),
            Style::default().fg(theme.accent).add_modifier(Modifier::BOLD),
        ),
    ])
    .alignment(Alignment::Center);

    let style = RenderStyle {
        width: column.width.saturating_sub(2) as usize,
        variant: Variant::Reading,
        theme,
    };
    let lines = render_blocks(&parse(&e.entry.content), &style);

    app.reading.total = lines.len();
    app.reading.viewport = column.height;
    let max = app.reading.total.saturating_sub(column.height as usize) as u16;
    app.reading.scroll = app.reading.scroll.min(max);

    f.render_widget(Paragraph::new(header), c[0]);
    f.render_widget(
        Paragraph::new(lines).scroll((app.reading.scroll, 0)),
        column.inner(Margin::new(1, 0)),
    );

    let progress = app.reading.progress();
    let gauge = LineGauge::default()
        .filled_style(Style::default().fg(theme.accent))
        .unfilled_style(Style::default().fg(theme.muted()))
        .label(format!(
            "{:>3}%  size {}  [ +/-: Size ] [ n/p: Next/Prev ] [ Esc: Back ] ",
            (progress * 100.0).round() as u16,
            app.reading.scale
        ))
        .ratio(progress);
    f.render_widget(gauge, c[2]);
}

fn render_timeline(f: &mut Frame, app: &mut App, area: Rect) {
    let theme = app.theme;
    let block = border(theme, "Timeline of Sethael");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let (lines, offsets) = app.timeline.lines(theme, inner.width as usize);
    app.timeline_total = lines.len();
    app.timeline_offsets = offsets;
    app.timeline.scroll_by(0, app.timeline_total);
    f.render_widget(Paragraph::new(lines).scroll((app.timeline.scroll, 0)), inner);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let v = Layout::vertical([Constraint::Percentage(percent_y)])
        .flex(Flex::Center)
        .split(r)[0];
    Layout::horizontal([Constraint::Percentage(percent_x)])
        .flex(Flex::Center)
        .split(v)[0]
}

fn render_editor(f: &mut Frame, app: &App, form: &EditForm, area: Rect) {
    let theme = app.theme;
    let modal = centered_rect(80, 85, area);
    f.render_widget(Clear, modal);
    let heading = if form.is_create() { "New Entry" } else { "Edit Entry" };
    let block = border(theme, heading).style(Style::default().bg(theme.background()));
    let inner = block.inner(modal);
    f.render_widget(block, modal);

    let mut constraints = vec![Constraint::Length(3)];
    if form.is_create() {
        constraints.push(Constraint::Length(3));
    }
    constraints.extend([Constraint::Length(3), Constraint::Min(3), Constraint::Length(1)]);
    let c = Layout::vertical(constraints).split(inner);

    let field_block = |field: Field, label: &str| {
        let color = if form.field == field { theme.accent } else { theme.muted() };
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(color))
            .title(Span::styled(format!(" {label} "), Style::default().fg(color)))
    };
    let with_cursor = |field: Field, text: &str| {
        if form.field == field { format!("{text}▏") } else { text.to_string() }
    };

    let mut slot = 0;
    f.render_widget(
        Paragraph::new(with_cursor(Field::Title, &form.title)).block(field_block(Field::Title, "Title")),
        c[slot],
    );
    slot += 1;

    if form.is_create() {
        let title = app
            .wiki
            .category(&form.category)
            .map(|c| c.title.clone())
            .unwrap_or_else(|| form.category.clone());
        f.render_widget(
            Paragraph::new(format!("◀ {title} ▶")).block(field_block(Field::Category, "Category (←/→)")),
            c[slot],
        );
        slot += 1;
    }

    f.render_widget(
        Paragraph::new(with_cursor(Field::Tags, &form.tags))
            .block(field_block(Field::Tags, "Tags (comma separated)")),
        c[slot],
    );
    slot += 1;

    let body_block = field_block(Field::Body, "Body");
    let body_inner = body_block.inner(c[slot]);
    let body = with_cursor(Field::Body, &form.body);
    let wrapped: usize = body
        .split('\n')
        .map(|l| textwrap::wrap(l, (body_inner.width as usize).max(1)).len().max(1))
        .sum();
    let scroll = wrapped.saturating_sub(body_inner.height as usize) as u16;
    f.render_widget(
        Paragraph::new(body)
            .wrap(Wrap { trim: false })
            .scroll((scroll, 0))
            .block(body_block),
        c[slot],
    );
    slot += 1;

    let hints = if form.is_create() {
        " Tab: Next field · Ctrl-S: Save · Esc: Cancel "
    } else {
        " Tab: Next field · Ctrl-S: Save · Ctrl-D: Delete · Esc: Cancel "
    };
    f.render_widget(
        Paragraph::new(hints).style(Style::default().fg(theme.muted())),
        c[slot],
    );
}
