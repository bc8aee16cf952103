use crate::error::{WikiError, WikiResult};
use crate::model::{Entry, Placement, Wiki, slugify};
use crate::nav::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Category,
    Tags,
    Body,
}

const CREATE_FIELDS: &[Field] = &[Field::Title, Field::Category, Field::Tags, Field::Body];
const EDIT_FIELDS: &[Field] = &[Field::Title, Field::Tags, Field::Body];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Create,
    Edit { category: String, key: String },
}

/// Where a saved or deleted entry ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub category: String,
    pub key: String,
}

#[derive(Debug, Clone)]
pub struct EditForm {
    pub target: Target,
    pub title: String,
    pub category: String,
    pub tags: String,
    pub body: String,
    pub field: Field,
    original_title: String,
    placement: Placement,
}

impl EditForm {
    pub fn create(category: &str) -> Self {
        Self {
            target: Target::Create,
            title: String::new(),
            category: category.to_string(),
            tags: String::new(),
            body: String::new(),
            field: Field::Title,
            original_title: String::new(),
            placement: Placement::Loose,
        }
    }

    pub fn edit(category: &str, key: &str, entry: &Entry) -> Self {
        Self {
            target: Target::Edit {
                category: category.to_string(),
                key: key.to_string(),
            },
            title: entry.title.clone(),
            category: category.to_string(),
            tags: entry.tags.join(", "),
            body: entry.content.clone(),
            field: Field::Title,
            original_title: entry.title.clone(),
            placement: entry.placement.clone(),
        }
    }

    pub fn is_create(&self) -> bool {
        self.target == Target::Create
    }

    pub fn fields(&self) -> &'static [Field] {
        if self.is_create() { CREATE_FIELDS } else { EDIT_FIELDS }
    }

    pub fn focus(&mut self, direction: Direction) {
        let fields = self.fields();
        let at = fields.iter().position(|f| *f == self.field).unwrap_or(0);
        let next = match direction {
            Direction::Next => (at + 1) % fields.len(),
            Direction::Prev => (at + fields.len() - 1) % fields.len(),
        };
        self.field = fields[next];
    }

    fn field_text(&mut self) -> Option<&mut String> {
        match self.field {
            Field::Title => Some(&mut self.title),
            Field::Tags => Some(&mut self.tags),
            Field::Body => Some(&mut self.body),
            Field::Category => None,
        }
    }

    pub fn input(&mut self, c: char) {
        if let Some(text) = self.field_text() {
            text.push(c);
        }
    }

    pub fn backspace(&mut self) {
        if let Some(text) = self.field_text() {
            text.pop();
        }
    }

    /// Enter adds a line in the body and moves on from single-line fields.
    pub fn newline(&mut self) {
        if self.field == Field::Body {
            self.body.push('\n');
        } else {
            self.focus(Direction::Next);
        }
    }

    /// Cycles the target category. Only meaningful while creating.
    pub fn cycle_category(&mut self, wiki: &Wiki, direction: Direction) {
        if !self.is_create() || wiki.categories.is_empty() {
            return;
        }
        let len = wiki.categories.len();
        let at = wiki.categories.get_index_of(&self.category).unwrap_or(0);
        let next = match direction {
            Direction::Next => (at + 1) % len,
            Direction::Prev => (at + len - 1) % len,
        };
        if let Some((key, _)) = wiki.categories.get_index(next) {
            self.category = key.clone();
        }
    }

    pub fn parsed_tags(&self) -> Vec<String> {
        self.tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Writes the form into the wiki. New entries get a key derived from
    /// the title, suffixed until unique. An edit that changes the title
    /// moves the entry to the new key in place, leaving nothing behind
    /// under the old one.
    pub fn apply(&self, wiki: &mut Wiki) -> WikiResult<Applied> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(WikiError::EmptyTitle);
        }
        let base = slugify(title);
        let entry = Entry {
            title: title.to_string(),
            content: self.body.clone(),
            tags: self.parsed_tags(),
            placement: self.placement.clone(),
        };

        match &self.target {
            Target::Create => {
                let category = wiki
                    .category(&self.category)
                    .ok_or_else(|| WikiError::UnknownCategory(self.category.clone()))?;
                let key = category.unique_key(&base, None);
                wiki.insert_entry(&self.category, &key, entry)?;
                Ok(Applied {
                    category: self.category.clone(),
                    key,
                })
            }
            Target::Edit { category, key: old } => {
                let cat = wiki
                    .category(category)
                    .ok_or_else(|| WikiError::UnknownCategory(category.clone()))?;
                if !cat.entries.contains_key(old) {
                    return Err(WikiError::UnknownEntry {
                        category: category.clone(),
                        entry: old.clone(),
                    });
                }
                let key = if title == self.original_title.trim() {
                    old.clone()
                } else {
                    cat.unique_key(&base, Some(old))
                };
                if key == *old {
                    wiki.insert_entry(category, &key, entry)?;
                } else {
                    wiki.rename_entry(category, old, &key, entry)?;
                }
                Ok(Applied {
                    category: category.clone(),
                    key,
                })
            }
        }
    }

    pub fn delete(&self, wiki: &mut Wiki) -> WikiResult<Applied> {
        match &self.target {
            Target::Edit { category, key } => {
                wiki.remove_entry(category, key)?;
                Ok(Applied {
                    category: category.clone(),
                    key: key.clone(),
                })
            }
            Target::Create => Err(WikiError::UnknownEntry {
                category: self.category.clone(),
                entry: String::new(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wiki() -> Wiki {
        Wiki::shipped().unwrap()
    }

    fn type_into(form: &mut EditForm, text: &str) {
        for c in text.chars() {
            form.input(c);
        }
    }

    #[test]
    fn create_derives_key_and_parses_tags() {
        let mut wiki = wiki();
        let mut form = EditForm::create("history");
        type_into(&mut form, "The Ridge Wars");
        form.focus(Direction::Next);
        form.focus(Direction::Next);
        type_into(&mut form, "war, ridge , ,");
        form.focus(Direction::Next);
        type_into(&mut form, "Fighting.");
        form.newline();
        type_into(&mut form, "More.");

        let applied = form.apply(&mut wiki).unwrap();
        assert_eq!(applied.key, "the-ridge-wars");
        let entry = wiki.entry("history", "the-ridge-wars").unwrap();
        assert_eq!(entry.tags, vec!["war", "ridge"]);
        assert_eq!(entry.content, "Fighting.\nMore.");
    }

    #[test]
    fn colliding_title_does_not_overwrite() {
        let mut wiki = wiki();
        let before = wiki.entry("history", "the-sundering").cloned();
        let mut form = EditForm::create("history");
        form.title = "The Sundering".into();
        let applied = form.apply(&mut wiki).unwrap();
        assert_eq!(applied.key, "the-sundering-2");
        assert_eq!(wiki.entry("history", "the-sundering").cloned(), before);
    }

    #[test]
    fn retitled_edit_moves_key_without_duplicates() {
        let mut wiki = wiki();
        let count = wiki.entry_count();
        let entry = wiki.entry("history", "the-long-quiet").unwrap().clone();
        let mut form = EditForm::edit("history", "the-long-quiet", &entry);
        form.title = "The Quiet Centuries".into();
        form.body = "Rewritten.".into();
        let applied = form.apply(&mut wiki).unwrap();

        assert_eq!(applied.key, "the-quiet-centuries");
        assert_eq!(wiki.entry_count(), count);
        assert!(wiki.entry("history", "the-long-quiet").is_none());
        let matches: Vec<_> = wiki.entries().filter(|e| e.entry.content == "Rewritten.").collect();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].entry_key, "the-quiet-centuries");
        assert_eq!(wiki.category("history").unwrap().entries.get_index_of("the-quiet-centuries"), Some(2));
    }

    #[test]
    fn body_only_edit_keeps_key_and_placement() {
        let mut wiki = wiki();
        let entry = wiki.entry("characters", "ilvane").unwrap().clone();
        let mut form = EditForm::edit("characters", "ilvane", &entry);
        form.body.push_str("\nMore.");
        let applied = form.apply(&mut wiki).unwrap();
        assert_eq!(applied.key, "ilvane");
        let saved = wiki.entry("characters", "ilvane").unwrap();
        assert_eq!(saved.placement, entry.placement);
        assert!(saved.content.ends_with("More."));
    }

    #[test]
    fn empty_title_is_rejected() {
        let mut wiki = wiki();
        let form = EditForm::create("history");
        assert!(matches!(form.apply(&mut wiki), Err(WikiError::EmptyTitle)));
    }

    #[test]
    fn delete_removes_entry() {
        let mut wiki = wiki();
        let entry = wiki.entry("languages", "trade-cant").unwrap().clone();
        let form = EditForm::edit("languages", "trade-cant", &entry);
        form.delete(&mut wiki).unwrap();
        assert!(wiki.entry("languages", "trade-cant").is_none());
    }

    #[test]
    fn category_cycles_only_when_creating() {
        let wiki = wiki();
        let mut form = EditForm::create("cosmology");
        form.cycle_category(&wiki, Direction::Prev);
        assert_eq!(form.category, "books");
        form.cycle_category(&wiki, Direction::Next);
        assert_eq!(form.category, "cosmology");

        let entry = wiki.entry("history", "the-kindling").unwrap().clone();
        let mut edit = EditForm::edit("history", "the-kindling", &entry);
        edit.cycle_category(&wiki, Direction::Next);
        assert_eq!(edit.category, "history");
        assert_eq!(edit.fields().len(), 3);
    }
}
