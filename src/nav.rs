use std::collections::BTreeSet;

use crate::model::{Category, CategoryLayout, Wiki};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Focus {
    #[default]
    Home,
    Category(String),
    Entry { category: String, entry: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Prev,
    Next,
}

/// One line of the sidebar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavRow {
    Category {
        key: String,
        title: String,
        icon: Option<String>,
        expanded: bool,
        count: usize,
    },
    Heading {
        depth: u8,
        title: String,
    },
    Entry {
        category: String,
        key: String,
        title: String,
        depth: u8,
    },
}

impl NavRow {
    pub fn selectable(&self) -> bool {
        !matches!(self, Self::Heading { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Navigator {
    focus: Focus,
    expanded: BTreeSet<String>,
}

impl Navigator {
    pub fn focus(&self) -> &Focus {
        &self.focus
    }

    pub fn is_expanded(&self, category: &str) -> bool {
        self.expanded.contains(category)
    }

    pub fn selected_entry(&self) -> Option<(&str, &str)> {
        match &self.focus {
            Focus::Entry { category, entry } => Some((category, entry)),
            _ => None,
        }
    }

    pub fn select_category(&mut self, key: &str) {
        self.expanded.insert(key.to_string());
        self.focus = Focus::Category(key.to_string());
    }

    /// Expanding also focuses the category; collapsing leaves focus alone.
    pub fn toggle_category(&mut self, key: &str) {
        if !self.expanded.remove(key) {
            self.select_category(key);
        }
    }

    pub fn select_entry(&mut self, category: &str, entry: &str) {
        self.expanded.insert(category.to_string());
        self.focus = Focus::Entry {
            category: category.to_string(),
            entry: entry.to_string(),
        };
    }

    /// Entry goes back to its category, a category goes home. Expand state
    /// is untouched, so the list looks the way it did before.
    pub fn back(&mut self) {
        self.focus = match std::mem::take(&mut self.focus) {
            Focus::Entry { category, .. } => Focus::Category(category),
            Focus::Category(_) | Focus::Home => Focus::Home,
        };
    }

    pub fn clear(&mut self) {
        self.focus = Focus::Home;
    }

    /// Moves to the neighbouring entry in the flattened list. Returns false
    /// at either end or when no entry is selected.
    pub fn step(&mut self, wiki: &Wiki, direction: Direction) -> bool {
        let Some((category, entry)) = self.selected_entry() else {
            return false;
        };
        let Some(pos) = wiki.position(category, entry) else {
            return false;
        };
        let target = match direction {
            Direction::Prev => pos.checked_sub(1),
            Direction::Next => Some(pos + 1),
        };
        let Some(next) = target.and_then(|i| wiki.nth_entry(i)) else {
            return false;
        };
        let (category, entry) = (next.category_key.to_string(), next.entry_key.to_string());
        self.select_entry(&category, &entry);
        true
    }

    /// Drops references to categories or entries that no longer exist.
    pub fn reconcile(&mut self, wiki: &Wiki) {
        self.expanded.retain(|key| wiki.categories.contains_key(key));
        self.focus = match std::mem::take(&mut self.focus) {
            Focus::Entry { category, entry } if wiki.entry(&category, &entry).is_some() => {
                Focus::Entry { category, entry }
            }
            Focus::Entry { category, .. } | Focus::Category(category)
                if wiki.categories.contains_key(&category) =>
            {
                Focus::Category(category)
            }
            _ => Focus::Home,
        };
    }

    pub fn rows(&self, wiki: &Wiki) -> Vec<NavRow> {
        let mut rows = Vec::new();
        for (key, category) in &wiki.categories {
            let expanded = self.is_expanded(key);
            rows.push(NavRow::Category {
                key: key.clone(),
                title: category.title.clone(),
                icon: category.icon.clone(),
                expanded,
                count: category.entries.len(),
            });
            if expanded {
                category_rows(key, category, &mut rows);
            }
        }
        rows
    }
}

fn entry_row(category: &str, key: &str, title: &str, depth: u8) -> NavRow {
    NavRow::Entry {
        category: category.to_string(),
        key: key.to_string(),
        title: title.to_string(),
        depth,
    }
}

fn heading(depth: u8, title: &str) -> NavRow {
    NavRow::Heading {
        depth,
        title: title.to_string(),
    }
}

fn category_rows(key: &str, category: &Category, rows: &mut Vec<NavRow>) {
    match &category.layout {
        CategoryLayout::Simple => {
            for (entry_key, entry) in &category.entries {
                rows.push(entry_row(key, entry_key, &entry.title, 1));
            }
        }
        CategoryLayout::Grouped(groups) => {
            let mut any_group = false;
            for group in groups {
                let members: Vec<_> = category
                    .entries
                    .iter()
                    .filter(|(_, e)| category.resolved_group(e).is_some_and(|g| g.key == group.key))
                    .collect();
                if members.is_empty() {
                    continue;
                }
                any_group = true;
                rows.push(heading(1, &group.title));
                for (entry_key, entry) in members {
                    rows.push(entry_row(key, entry_key, &entry.title, 2));
                }
            }
            let loose: Vec<_> = category
                .entries
                .iter()
                .filter(|(_, e)| category.resolved_group(e).is_none())
                .collect();
            if !loose.is_empty() && any_group {
                rows.push(heading(1, "Other"));
            }
            let depth = if any_group { 2 } else { 1 };
            for (entry_key, entry) in loose {
                rows.push(entry_row(key, entry_key, &entry.title, depth));
            }
        }
        CategoryLayout::Books(books) => {
            for book in books {
                let in_book: Vec<_> = category
                    .entries
                    .iter()
                    .filter_map(|(k, e)| {
                        category
                            .resolved_volume(e)
                            .filter(|(b, _)| b.key == book.key)
                            .map(|(_, v)| (k, e, v.map(|v| v.key.clone())))
                    })
                    .collect();
                if in_book.is_empty() {
                    continue;
                }
                rows.push(heading(1, &book.title));
                for (entry_key, entry, _) in in_book.iter().filter(|(_, _, v)| v.is_none()) {
                    rows.push(entry_row(key, entry_key, &entry.title, 2));
                }
                for volume in &book.volumes {
                    let chapters: Vec<_> = in_book
                        .iter()
                        .filter(|(_, _, v)| v.as_deref() == Some(volume.key.as_str()))
                        .collect();
                    if chapters.is_empty() {
                        continue;
                    }
                    rows.push(heading(2, &volume.title));
                    for (entry_key, entry, _) in chapters {
                        rows.push(entry_row(key, entry_key, &entry.title, 3));
                    }
                }
            }
            for (entry_key, entry) in &category.entries {
                if category.resolved_volume(entry).is_none() {
                    rows.push(entry_row(key, entry_key, &entry.title, 1));
                }
            }
        }
    }
}

/// Next selectable row from `cursor` in `direction`; stays put at the ends.
pub fn move_cursor(rows: &[NavRow], cursor: usize, direction: Direction) -> usize {
    let found = match direction {
        Direction::Next => rows
            .iter()
            .enumerate()
            .skip(cursor + 1)
            .find(|(_, r)| r.selectable())
            .map(|(i, _)| i),
        Direction::Prev => rows
            .iter()
            .enumerate()
            .take(cursor)
            .rev()
            .find(|(_, r)| r.selectable())
            .map(|(i, _)| i),
    };
    found.unwrap_or(cursor.min(rows.len().saturating_sub(1)))
}

/// Row index of whatever is focused, if it is visible.
pub fn focused_row(rows: &[NavRow], focus: &Focus) -> Option<usize> {
    rows.iter().position(|row| match (row, focus) {
        (NavRow::Category { key, .. }, Focus::Category(c)) => key == c,
        (NavRow::Entry { category, key, .. }, Focus::Entry { category: c, entry }) => category == c && key == entry,
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Entry, Placement};

    fn wiki() -> Wiki {
        Wiki::shipped().unwrap()
    }

    #[test]
    fn back_walks_entry_category_home() {
        let mut nav = Navigator::default();
        nav.select_entry("history", "the-sundering");
        nav.back();
        assert_eq!(nav.focus(), &Focus::Category("history".into()));
        assert!(nav.is_expanded("history"));
        nav.back();
        assert_eq!(nav.focus(), &Focus::Home);
        assert!(nav.is_expanded("history"));
    }

    #[test]
    fn step_crosses_categories_and_stops_at_ends() {
        let wiki = wiki();
        let mut nav = Navigator::default();
        let last_cosmology = wiki.category("cosmology").unwrap().entries.keys().last().unwrap().clone();
        nav.select_entry("cosmology", &last_cosmology);
        assert!(nav.step(&wiki, Direction::Next));
        assert_eq!(nav.selected_entry(), Some(("history", "the-kindling")));
        assert!(nav.is_expanded("history"));

        let first = wiki.nth_entry(0).unwrap();
        nav.select_entry(first.category_key, first.entry_key);
        assert!(!nav.step(&wiki, Direction::Prev));
        assert_eq!(nav.selected_entry(), Some((first.category_key, first.entry_key)));
    }

    #[test]
    fn reconcile_falls_back_when_entry_is_removed() {
        let mut wiki = wiki();
        let mut nav = Navigator::default();
        nav.select_entry("history", "the-long-quiet");
        wiki.remove_entry("history", "the-long-quiet").unwrap();
        nav.reconcile(&wiki);
        assert_eq!(nav.focus(), &Focus::Category("history".into()));
    }

    #[test]
    fn rows_group_entries_and_treat_dangling_as_other() {
        let mut wiki = wiki();
        let mut stray = Entry::new("Stray", "");
        stray.placement = Placement::Group("nope".into());
        wiki.insert_entry("characters", "stray", stray).unwrap();

        let mut nav = Navigator::default();
        nav.select_category("characters");
        let rows = nav.rows(&wiki);
        let start = rows
            .iter()
            .position(|r| matches!(r, NavRow::Category { key, .. } if key == "characters"))
            .unwrap();
        let titles: Vec<String> = rows[start + 1..]
            .iter()
            .take_while(|r| !matches!(r, NavRow::Category { .. }))
            .map(|r| match r {
                NavRow::Heading { title, .. } => format!("# {title}"),
                NavRow::Entry { key, .. } => key.clone(),
                NavRow::Category { .. } => unreachable!(),
            })
            .collect();
        assert_eq!(
            titles,
            vec!["# The Ascended", "ilvane", "# Mortals", "corin-ashmark", "mother-teodra", "# Other", "stray"]
        );
    }

    #[test]
    fn book_rows_nest_volumes() {
        let wiki = wiki();
        let mut nav = Navigator::default();
        nav.select_category("books");
        let rows = nav.rows(&wiki);
        assert!(rows.contains(&NavRow::Heading { depth: 1, title: "The Ember Cycle".into() }));
        assert!(rows.contains(&NavRow::Heading { depth: 2, title: "Volume II: Glass".into() }));
        assert!(rows.iter().any(|r| matches!(r, NavRow::Entry { key, depth: 3, .. } if key == "chapter-3-the-glass-well")));
    }

    #[test]
    fn cursor_skips_headings() {
        let rows = vec![
            NavRow::Heading { depth: 1, title: "h".into() },
            NavRow::Entry { category: "c".into(), key: "a".into(), title: "A".into(), depth: 2 },
            NavRow::Heading { depth: 1, title: "h2".into() },
            NavRow::Entry { category: "c".into(), key: "b".into(), title: "B".into(), depth: 2 },
        ];
        assert_eq!(move_cursor(&rows, 1, Direction::Next), 3);
        assert_eq!(move_cursor(&rows, 3, Direction::Prev), 1);
        assert_eq!(move_cursor(&rows, 1, Direction::Prev), 1);
        assert_eq!(move_cursor(&rows, 3, Direction::Next), 3);
    }
}
