use std::time::{Duration, Instant};

use ratatui::prelude::*;

use crate::config::Theme;
use crate::nav::Direction;

#[derive(Debug, Clone, Copy)]
pub struct Era {
    pub name: &'static str,
    pub subtitle: &'static str,
    pub span: &'static str,
    pub description: &'static str,
    pub events: &'static [&'static str],
}

pub const ERAS: &[Era] = &[
    Era {
        name: "The Kindling",
        subtitle: "First Age",
        span: "0 – 1140 AW",
        description: "Life answers the Seeder's intention. Peoples gather along the Nine Wells and keep no writing.",
        events: &["Ilvane hears the Seeder speak", "Orun's Throat is found", "Ilvane ascends"],
    },
    Era {
        name: "The Sundering",
        subtitle: "Second Age",
        span: "1140 – 1502 AW",
        description: "The Glass Well cracks and the first Veil falls. Cities forget their own names overnight.",
        events: &["The Glass Well cracks", "Stone-writing begins on the eastern ridges"],
    },
    Era {
        name: "The Long Quiet",
        subtitle: "Third Age",
        span: "1502 – 1810 AW",
        description: "Three centuries without war or plague, remembered chiefly through tax ledgers.",
        events: &["The Ashmark line takes Sael-under-Ash", "Trade Cant spreads along the Drift"],
    },
    Era {
        name: "The Ridge Wars",
        subtitle: "Fourth Age",
        span: "1810 – 1867 AW",
        description: "The ridge holds fight over the Wells and the right to read what is written near them.",
        events: &["Siege of Thessaly-Var", "The Wellkeepers withdraw"],
    },
    Era {
        name: "The Accord",
        subtitle: "Fourth Age, late",
        span: "1867 – 1990 AW",
        description: "The Accord of Thessaly-Var binds the Wellkeepers to neutrality.",
        events: &["The Accord is signed", "First reading on the longest night"],
    },
    Era {
        name: "The Ember Age",
        subtitle: "Present day",
        span: "1990 AW –",
        description: "The Wells grow restless. Corin Ashmark leaves Sael-under-Ash before dawn.",
        events: &["Corin walks the Ash Road", "The Glass Well hums again"],
    },
];

/// Scroll events further apart than this start a fresh gesture.
pub const WHEEL_IDLE_RESET: Duration = Duration::from_millis(250);
/// Notches in one gesture needed to page once.
pub const WHEEL_THRESHOLD: i32 = 2;
pub const ANIMATION_LOCK: Duration = Duration::from_millis(350);

/// Home-screen pager over the eras.
#[derive(Debug, Clone)]
pub struct Carousel {
    index: usize,
    len: usize,
    wheel: i32,
    last_wheel: Option<Instant>,
    transition: Option<(Direction, Instant)>,
}

impl Carousel {
    pub fn new(len: usize) -> Self {
        Self {
            index: 0,
            len,
            wheel: 0,
            last_wheel: None,
            transition: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_animating(&self, now: Instant) -> bool {
        self.progress(now).is_some()
    }

    /// Direction and completion (0.0..1.0) of the running page turn.
    pub fn progress(&self, now: Instant) -> Option<(Direction, f32)> {
        let (direction, started) = self.transition?;
        let elapsed = now.saturating_duration_since(started);
        (elapsed < ANIMATION_LOCK).then(|| (direction, elapsed.as_secs_f32() / ANIMATION_LOCK.as_secs_f32()))
    }

    /// `delta` is +1 per notch forward, -1 per notch back.
    pub fn on_wheel(&mut self, delta: i32, now: Instant) -> bool {
        if self
            .last_wheel
            .is_some_and(|last| now.saturating_duration_since(last) > WHEEL_IDLE_RESET)
        {
            self.wheel = 0;
        }
        self.last_wheel = Some(now);
        if self.is_animating(now) {
            self.wheel = 0;
            return false;
        }
        self.wheel += delta;
        if self.wheel.abs() < WHEEL_THRESHOLD {
            return false;
        }
        let direction = if self.wheel > 0 { Direction::Next } else { Direction::Prev };
        self.wheel = 0;
        self.advance(direction, now)
    }

    pub fn on_key(&mut self, direction: Direction, now: Instant) -> bool {
        if self.is_animating(now) {
            return false;
        }
        self.advance(direction, now)
    }

    fn advance(&mut self, direction: Direction, now: Instant) -> bool {
        let target = match direction {
            Direction::Prev => self.index.checked_sub(1),
            Direction::Next => Some(self.index + 1).filter(|i| *i < self.len),
        };
        let Some(target) = target else {
            return false;
        };
        self.index = target;
        self.transition = Some((direction, now));
        true
    }

    pub fn lines(&self, theme: Theme, width: usize, now: Instant) -> Vec<Line<'static>> {
        let Some(era) = ERAS.get(self.index) else {
            return Vec::new();
        };
        let accent = Style::default().fg(theme.accent);
        let muted = Style::default().fg(theme.muted());

        // slide in from the side we are travelling toward
        let offset = match self.progress(now) {
            Some((direction, done)) => {
                let pad = ((1.0 - done) * 8.0) as usize;
                match direction {
                    Direction::Next => " ".repeat(pad),
                    Direction::Prev => String::new(),
                }
            }
            None => String::new(),
        };

        let left = if self.index > 0 { "◀" } else { " " };
        let right = if self.index + 1 < self.len { "▶" } else { " " };
        let mut lines = vec![
            Line::from(vec![
                Span::styled(format!("{left}  "), accent),
                Span::styled(format!("{} of {}", self.index + 1, self.len), muted),
                Span::styled(format!("  {right}"), accent),
            ])
            .alignment(Alignment::Center),
            Line::default(),
            Line::from(Span::styled(
                format!("{offset}{}", era.name),
                accent.add_modifier(Modifier::BOLD),
            ))
            .alignment(Alignment::Center),
            Line::from(Span::styled(
                format!("{} · {}", era.subtitle, era.span),
                muted.add_modifier(Modifier::ITALIC),
            ))
            .alignment(Alignment::Center),
            Line::default(),
        ];
        for row in textwrap::wrap(era.description, width.max(10)) {
            lines.push(Line::from(row.into_owned()).alignment(Alignment::Center));
        }
        lines.push(Line::default());
        let dots: Vec<&str> = (0..self.len).map(|i| if i == self.index { "●" } else { "○" }).collect();
        lines.push(Line::from(Span::styled(dots.join(" "), accent)).alignment(Alignment::Center));
        lines
    }
}

const RULER_LABEL: usize = 16;

/// Full timeline: a vertical ruler with one annotated section per era.
#[derive(Debug, Clone, Default)]
pub struct TimelineView {
    pub scroll: u16,
    pub selected: usize,
}

impl TimelineView {
    pub fn scroll_by(&mut self, delta: i32, total: usize) {
        let max = total.saturating_sub(1) as i32;
        self.scroll = (self.scroll as i32 + delta).clamp(0, max) as u16;
    }

    /// Selects the neighbouring era and scrolls to its first line.
    pub fn jump(&mut self, direction: Direction, offsets: &[usize]) {
        self.selected = match direction {
            Direction::Prev => self.selected.saturating_sub(1),
            Direction::Next => (self.selected + 1).min(offsets.len().saturating_sub(1)),
        };
        if let Some(offset) = offsets.get(self.selected) {
            self.scroll = *offset as u16;
        }
    }

    /// Lines plus the line index at which each era starts.
    pub fn lines(&self, theme: Theme, width: usize) -> (Vec<Line<'static>>, Vec<usize>) {
        let accent = Style::default().fg(theme.accent);
        let muted = Style::default().fg(theme.muted());
        let text = Style::default().fg(theme.text());
        let body_width = width.saturating_sub(RULER_LABEL + 3).max(10);
        let gutter = || Span::styled(format!("{:>w$} ┃ ", "", w = RULER_LABEL), muted);

        let mut lines = Vec::new();
        let mut offsets = Vec::with_capacity(ERAS.len());
        for (i, era) in ERAS.iter().enumerate() {
            offsets.push(lines.len());
            let selected = i == self.selected;
            let marker_style = if selected { accent.add_modifier(Modifier::BOLD) } else { accent };
            lines.push(Line::from(vec![
                Span::styled(format!("{:>w$} ", era.span, w = RULER_LABEL), muted),
                Span::styled(if selected { "◆ " } else { "◇ " }, marker_style),
                Span::styled(era.name.to_uppercase(), marker_style),
            ]));
            lines.push(Line::from(vec![
                gutter(),
                Span::styled(era.subtitle, muted.add_modifier(Modifier::ITALIC)),
            ]));
            for row in textwrap::wrap(era.description, body_width) {
                lines.push(Line::from(vec![gutter(), Span::styled(row.into_owned(), text)]));
            }
            for event in era.events {
                let options = textwrap::Options::new(body_width)
                    .initial_indent("  • ")
                    .subsequent_indent("    ");
                for row in textwrap::wrap(event, options) {
                    lines.push(Line::from(vec![gutter(), Span::styled(row.into_owned(), text)]));
                }
            }
            lines.push(Line::from(gutter()));
        }
        (lines, offsets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(base: Instant, n: u64) -> Instant {
        base + Duration::from_millis(n)
    }

    #[test]
    fn wheel_needs_threshold_within_one_gesture() {
        let t = Instant::now();
        let mut c = Carousel::new(ERAS.len());
        assert!(!c.on_wheel(1, t));
        assert!(c.on_wheel(1, ms(t, 50)));
        assert_eq!(c.index(), 1);
    }

    #[test]
    fn idle_gap_resets_accumulator() {
        let t = Instant::now();
        let mut c = Carousel::new(ERAS.len());
        assert!(!c.on_wheel(1, t));
        assert!(!c.on_wheel(1, ms(t, 400)));
        assert_eq!(c.index(), 0);
        assert!(c.on_wheel(1, ms(t, 450)));
    }

    #[test]
    fn animation_lock_blocks_overlapping_steps() {
        let t = Instant::now();
        let mut c = Carousel::new(ERAS.len());
        assert!(c.on_key(Direction::Next, t));
        assert!(!c.on_key(Direction::Next, ms(t, 100)));
        assert!(!c.on_wheel(1, ms(t, 120)));
        assert!(!c.on_wheel(1, ms(t, 140)));
        assert_eq!(c.index(), 1);
        assert!(c.on_key(Direction::Next, ms(t, 400)));
        assert_eq!(c.index(), 2);
    }

    #[test]
    fn stepping_clamps_at_ends() {
        let t = Instant::now();
        let mut c = Carousel::new(2);
        assert!(!c.on_key(Direction::Prev, t));
        assert!(c.on_key(Direction::Next, t));
        assert!(!c.on_key(Direction::Next, ms(t, 1000)));
        assert_eq!(c.index(), 1);
    }

    #[test]
    fn full_timeline_jumps_to_era_offsets() {
        let mut view = TimelineView::default();
        let (lines, offsets) = view.lines(Theme::default(), 80);
        assert_eq!(offsets.len(), ERAS.len());
        assert!(offsets.windows(2).all(|w| w[0] < w[1]));
        view.jump(Direction::Next, &offsets);
        assert_eq!(view.selected, 1);
        assert_eq!(view.scroll as usize, offsets[1]);
        view.scroll_by(10_000, lines.len());
        assert_eq!(view.scroll as usize, lines.len() - 1);
    }
}
