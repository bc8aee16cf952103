use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{WikiError, WikiResult};

const SHIPPED_WIKI: &str = include_str!("../assets/sethael.json");

/// The whole dataset. Category order is the order used for navigation and
/// for the flattened entry list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Wiki {
    pub categories: IndexMap<String, Category>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "CategoryLayout::is_simple")]
    pub layout: CategoryLayout,
    #[serde(default)]
    pub entries: IndexMap<String, Entry>,
}

/// How a category arranges its entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryLayout {
    #[default]
    Simple,
    Grouped(Vec<Group>),
    Books(Vec<Book>),
}

impl CategoryLayout {
    pub fn is_simple(&self) -> bool {
        matches!(self, Self::Simple)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub key: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub key: String,
    pub title: String,
    #[serde(default)]
    pub volumes: Vec<Volume>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub key: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Placement::is_loose")]
    pub placement: Placement,
}

impl Entry {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            tags: Vec::new(),
            placement: Placement::Loose,
        }
    }
}

/// Where an entry sits inside its category's layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    #[default]
    Loose,
    Group(String),
    Volume {
        book: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        volume: Option<String>,
    },
}

impl Placement {
    pub fn is_loose(&self) -> bool {
        matches!(self, Self::Loose)
    }
}

/// A borrowed view of one entry together with its owning category.
#[derive(Debug, Clone, Copy)]
pub struct EntryRef<'a> {
    pub category_key: &'a str,
    pub category: &'a Category,
    pub entry_key: &'a str,
    pub entry: &'a Entry,
}

impl Wiki {
    /// The dataset compiled into the binary.
    pub fn shipped() -> WikiResult<Self> {
        Self::from_json(SHIPPED_WIKI)
    }

    pub fn from_json(raw: &str) -> WikiResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn category(&self, key: &str) -> Option<&Category> {
        self.categories.get(key)
    }

    pub fn entry(&self, category: &str, key: &str) -> Option<&Entry> {
        self.categories.get(category)?.entries.get(key)
    }

    /// Every entry, category by category, in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = EntryRef<'_>> {
        self.categories.iter().flat_map(|(category_key, category)| {
            category.entries.iter().map(move |(entry_key, entry)| EntryRef {
                category_key,
                category,
                entry_key,
                entry,
            })
        })
    }

    pub fn entry_count(&self) -> usize {
        self.categories.values().map(|c| c.entries.len()).sum()
    }

    /// Index of an entry in the flattened list.
    pub fn position(&self, category: &str, key: &str) -> Option<usize> {
        self.entries()
            .position(|e| e.category_key == category && e.entry_key == key)
    }

    pub fn nth_entry(&self, index: usize) -> Option<EntryRef<'_>> {
        self.entries().nth(index)
    }

    /// Inserts or overwrites an entry, returning the previous value under that key.
    pub fn insert_entry(&mut self, category: &str, key: &str, entry: Entry) -> WikiResult<Option<Entry>> {
        let cat = self
            .categories
            .get_mut(category)
            .ok_or_else(|| WikiError::UnknownCategory(category.to_string()))?;
        Ok(cat.entries.insert(key.to_string(), entry))
    }

    pub fn remove_entry(&mut self, category: &str, key: &str) -> WikiResult<Entry> {
        let cat = self
            .categories
            .get_mut(category)
            .ok_or_else(|| WikiError::UnknownCategory(category.to_string()))?;
        cat.entries.shift_remove(key).ok_or_else(|| WikiError::UnknownEntry {
            category: category.to_string(),
            entry: key.to_string(),
        })
    }

    /// Replaces `old_key` with `new_key` at the same position in the category.
    /// Fails if another entry already holds `new_key`.
    pub fn rename_entry(&mut self, category: &str, old_key: &str, new_key: &str, entry: Entry) -> WikiResult<()> {
        let cat = self
            .categories
            .get_mut(category)
            .ok_or_else(|| WikiError::UnknownCategory(category.to_string()))?;
        let index = cat.entries.get_index_of(old_key).ok_or_else(|| WikiError::UnknownEntry {
            category: category.to_string(),
            entry: old_key.to_string(),
        })?;
        if new_key != old_key && cat.entries.contains_key(new_key) {
            return Err(WikiError::DuplicateEntry {
                category: category.to_string(),
                entry: new_key.to_string(),
            });
        }
        cat.entries.shift_remove_index(index);
        let index = index.min(cat.entries.len());
        cat.entries.shift_insert(index, new_key.to_string(), entry);
        Ok(())
    }

    /// Entries whose placement names a group, book or volume their category
    /// does not declare.
    pub fn dangling_placements(&self) -> Vec<(String, String)> {
        self.entries()
            .filter(|e| !e.category.placement_resolves(&e.entry.placement))
            .map(|e| (e.category_key.to_string(), e.entry_key.to_string()))
            .collect()
    }
}

impl Category {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            icon: None,
            layout: CategoryLayout::Simple,
            entries: IndexMap::new(),
        }
    }

    pub fn groups(&self) -> &[Group] {
        match &self.layout {
            CategoryLayout::Grouped(groups) => groups,
            _ => &[],
        }
    }

    pub fn books(&self) -> &[Book] {
        match &self.layout {
            CategoryLayout::Books(books) => books,
            _ => &[],
        }
    }

    /// The group an entry belongs to. A reference to an undeclared group
    /// resolves to `None`, same as an ungrouped entry.
    pub fn resolved_group(&self, entry: &Entry) -> Option<&Group> {
        match &entry.placement {
            Placement::Group(key) => self.groups().iter().find(|g| &g.key == key),
            _ => None,
        }
    }

    /// The book and, when present, volume an entry belongs to.
    pub fn resolved_volume(&self, entry: &Entry) -> Option<(&Book, Option<&Volume>)> {
        let Placement::Volume { book, volume } = &entry.placement else {
            return None;
        };
        let book = self.books().iter().find(|b| &b.key == book)?;
        match volume {
            Some(volume) => {
                let volume = book.volumes.iter().find(|v| &v.key == volume)?;
                Some((book, Some(volume)))
            }
            None => Some((book, None)),
        }
    }

    fn placement_resolves(&self, placement: &Placement) -> bool {
        match placement {
            Placement::Loose => true,
            Placement::Group(key) => self.groups().iter().any(|g| &g.key == key),
            Placement::Volume { book, volume } => self.books().iter().any(|b| {
                &b.key == book
                    && volume
                        .as_ref()
                        .is_none_or(|v| b.volumes.iter().any(|vol| &vol.key == v))
            }),
        }
    }

    /// `base` if free, otherwise `base-2`, `base-3`, ... . `except` is
    /// treated as free so an entry can keep its own key.
    pub fn unique_key(&self, base: &str, except: Option<&str>) -> String {
        let taken = |key: &str| self.entries.contains_key(key) && except != Some(key);
        if !taken(base) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{base}-{n}"))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| base.to_string())
    }
}

/// Lowercases, turns whitespace runs into hyphens and drops everything
/// outside `[a-z0-9-]`.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for word in title.split_whitespace() {
        let cleaned: String = word
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
            .collect();
        if cleaned.is_empty() {
            continue;
        }
        if !slug.is_empty() {
            slug.push('-');
        }
        slug.push_str(&cleaned);
    }
    let mut collapsed = String::with_capacity(slug.len());
    for c in slug.chars() {
        if c == '-' && collapsed.ends_with('-') {
            continue;
        }
        collapsed.push(c);
    }
    let trimmed = collapsed.trim_matches('-');
    if trimmed.is_empty() {
        "entry".to_string()
    } else {
        trimmed.to_string()
    }
}
