use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{WikiError, WikiResult};
use crate::model::{CategoryLayout, Wiki};
use crate::storage::{KeyValueStore, Persistence, STORAGE_KEY};

pub const CURRENT_VERSION: u64 = 1;

#[derive(Deserialize)]
struct Envelope {
    categories: Wiki,
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u64,
    categories: &'a Wiki,
}

/// One step lifting a blob from `version` to `version + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Migration {
    /// Version 0 is the bare category map with loosely typed
    /// `group`/`book`/`volume` fields and `groups`/`structure` arrays.
    WrapLegacyMap,
}

impl Migration {
    pub fn for_version(version: u64) -> Option<Self> {
        match version {
            0 => Some(Self::WrapLegacyMap),
            _ => None,
        }
    }

    pub fn target(self) -> u64 {
        match self {
            Self::WrapLegacyMap => 1,
        }
    }

    pub fn apply(self, blob: Value) -> WikiResult<Value> {
        match self {
            Self::WrapLegacyMap => wrap_legacy_map(blob),
        }
    }
}

fn migration_error(msg: impl Into<String>) -> WikiError {
    WikiError::Migration(msg.into())
}

pub fn detect_version(blob: &Value) -> WikiResult<u64> {
    let Value::Object(map) = blob else {
        return Err(migration_error("stored blob is not an object"));
    };
    match map.get("version") {
        None => Ok(0),
        Some(v) => v
            .as_u64()
            .ok_or_else(|| migration_error("version field is not an unsigned integer")),
    }
}

/// Brings a blob of any known version up to date. Returns the wiki and the
/// version it was stored at.
pub fn migrate(mut blob: Value) -> WikiResult<(Wiki, u64)> {
    let from = detect_version(&blob)?;
    if from > CURRENT_VERSION {
        return Err(WikiError::UnsupportedVersion {
            found: from,
            supported: CURRENT_VERSION,
        });
    }
    let mut version = from;
    while version < CURRENT_VERSION {
        let step = Migration::for_version(version)
            .ok_or_else(|| migration_error(format!("no migration from version {version}")))?;
        blob = step.apply(blob)?;
        version = step.target();
    }
    let envelope: Envelope = serde_json::from_value(blob)?;
    Ok((envelope.categories, from))
}

pub fn decode(raw: &str) -> WikiResult<(Wiki, u64)> {
    migrate(serde_json::from_str(raw)?)
}

pub fn encode(wiki: &Wiki) -> WikiResult<String> {
    Ok(serde_json::to_string(&EnvelopeRef {
        version: CURRENT_VERSION,
        categories: wiki,
    })?)
}

fn wrap_legacy_map(blob: Value) -> WikiResult<Value> {
    let Value::Object(categories) = blob else {
        return Err(migration_error("legacy blob is not an object"));
    };
    let mut migrated = Map::new();
    for (key, category) in categories {
        let Value::Object(category) = category else {
            return Err(migration_error(format!("legacy category {key} is not an object")));
        };
        migrated.insert(key, legacy_category(category)?);
    }
    Ok(json!({ "version": 1, "categories": migrated }))
}

fn legacy_category(mut category: Map<String, Value>) -> WikiResult<Value> {
    let groups = category.remove("groups").unwrap_or(Value::Null);
    let structure = category.remove("structure").unwrap_or(Value::Null);

    let layout = if !structure.is_null() {
        json!({ "books": legacy_books(structure)? })
    } else {
        match groups {
            Value::Array(groups) if !groups.is_empty() => json!({ "grouped": groups }),
            _ => json!("simple"),
        }
    };
    category.insert("layout".into(), layout);

    if let Some(Value::Object(entries)) = category.get_mut("entries") {
        for entry in entries.values_mut() {
            if let Value::Object(entry) = entry {
                legacy_entry(entry);
            }
        }
    }
    Ok(Value::Object(category))
}

fn legacy_entry(entry: &mut Map<String, Value>) {
    let group = entry.remove("group");
    let book = entry.remove("book");
    let volume = entry.remove("volume");

    let as_str = |v: &Option<Value>| v.as_ref().and_then(Value::as_str).map(str::to_string);
    let placement = match (as_str(&book), as_str(&group)) {
        (Some(book), _) => json!({ "volume": { "book": book, "volume": as_str(&volume) } }),
        (None, Some(group)) => json!({ "group": group }),
        (None, None) => return,
    };
    entry.insert("placement".into(), placement);
}

/// The legacy outline came as a list, as `{ "books": [...] }`, or as a map
/// keyed by book key. Volumes follow the same rules.
fn legacy_books(structure: Value) -> WikiResult<Value> {
    let structure = match structure {
        Value::Object(mut map) if map.contains_key("books") => map.remove("books").unwrap_or(Value::Null),
        other => other,
    };
    let books = keyed_list(structure)?
        .into_iter()
        .map(|mut book| {
            if let Some(volumes) = book.remove("volumes") {
                let volumes = keyed_list(volumes)?;
                book.insert("volumes".into(), Value::Array(volumes.into_iter().map(Value::Object).collect()));
            }
            Ok(Value::Object(book))
        })
        .collect::<WikiResult<Vec<_>>>()?;
    Ok(Value::Array(books))
}

fn keyed_list(value: Value) -> WikiResult<Vec<Map<String, Value>>> {
    let with_key = |key: Option<String>, item: Value| -> WikiResult<Map<String, Value>> {
        let Value::Object(mut item) = item else {
            return Err(migration_error("outline item is not an object"));
        };
        if let Some(key) = key {
            item.entry("key").or_insert(Value::String(key));
        }
        let fallback = item.get("key").cloned().unwrap_or(Value::String(String::new()));
        item.entry("title").or_insert(fallback);
        Ok(item)
    };
    match value {
        Value::Array(items) => items.into_iter().map(|item| with_key(None, item)).collect(),
        Value::Object(items) => items.into_iter().map(|(k, item)| with_key(Some(k), item)).collect(),
        Value::Null => Ok(Vec::new()),
        _ => Err(migration_error("outline is neither a list nor a map")),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub added_categories: usize,
    pub added_entries: usize,
    pub reconciled_layouts: usize,
}

impl MergeReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Adds whatever the shipped defaults have that the stored wiki lacks.
/// Never removes or overwrites stored data.
pub fn merge_defaults(stored: &mut Wiki, defaults: &Wiki) -> MergeReport {
    let mut report = MergeReport::default();
    for (key, default) in &defaults.categories {
        let Some(category) = stored.categories.get_mut(key) else {
            stored.categories.insert(key.clone(), default.clone());
            report.added_categories += 1;
            continue;
        };
        for (entry_key, entry) in &default.entries {
            if !category.entries.contains_key(entry_key) {
                category.entries.insert(entry_key.clone(), entry.clone());
                report.added_entries += 1;
            }
        }
        if reconcile_layout(&mut category.layout, &default.layout) {
            report.reconciled_layouts += 1;
        }
    }
    report
}

fn reconcile_layout(stored: &mut CategoryLayout, default: &CategoryLayout) -> bool {
    if stored.is_simple() && !default.is_simple() {
        *stored = default.clone();
        return true;
    }
    match (stored, default) {
        (CategoryLayout::Grouped(groups), CategoryLayout::Grouped(defaults)) => {
            let before = groups.len();
            for group in defaults {
                if !groups.iter().any(|g| g.key == group.key) {
                    groups.push(group.clone());
                }
            }
            groups.len() != before
        }
        (CategoryLayout::Books(books), CategoryLayout::Books(defaults)) => {
            let mut changed = false;
            for book in defaults {
                match books.iter_mut().find(|b| b.key == book.key) {
                    None => {
                        books.push(book.clone());
                        changed = true;
                    }
                    Some(existing) => {
                        for volume in &book.volumes {
                            if !existing.volumes.iter().any(|v| v.key == volume.key) {
                                existing.volumes.push(volume.clone());
                                changed = true;
                            }
                        }
                    }
                }
            }
            changed
        }
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Nothing was stored; the defaults were written out.
    Fresh,
    /// Storage or the stored blob was unusable; defaults are in memory only.
    Fallback,
    Persisted { migrated_from: u64 },
}

#[derive(Debug)]
pub struct Loaded {
    pub wiki: Wiki,
    pub origin: Origin,
    pub report: MergeReport,
}

/// Startup: read the stored wiki, bring it up to date and fold in the
/// defaults. Never fails; the worst case is the defaults held in memory.
pub async fn load<S: KeyValueStore>(persistence: &Persistence<S>, defaults: &Wiki) -> Loaded {
    let fallback = |origin| Loaded {
        wiki: defaults.clone(),
        origin,
        report: MergeReport::default(),
    };

    match persistence.store().read(STORAGE_KEY).await {
        Err(error) => {
            tracing::warn!(error = %error, "storage unreadable, using shipped wiki without saving");
            fallback(Origin::Fallback)
        }
        Ok(None) => {
            match encode(defaults) {
                Ok(blob) => {
                    if persistence.set(STORAGE_KEY, blob).await.is_some() {
                        tracing::info!("stored shipped wiki on first run");
                    }
                }
                Err(error) => tracing::warn!(error = %error, "could not encode shipped wiki"),
            }
            fallback(Origin::Fresh)
        }
        Ok(Some(raw)) => match decode(&raw) {
            Ok((mut wiki, migrated_from)) => {
                let report = merge_defaults(&mut wiki, defaults);
                tracing::info!(
                    migrated_from,
                    added_categories = report.added_categories,
                    added_entries = report.added_entries,
                    reconciled_layouts = report.reconciled_layouts,
                    "loaded stored wiki"
                );
                Loaded {
                    wiki,
                    origin: Origin::Persisted { migrated_from },
                    report,
                }
            }
            Err(error) => {
                tracing::warn!(error = %error, "stored wiki unusable, using shipped wiki without saving");
                fallback(Origin::Fallback)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, Entry, Group, Placement};
    use crate::storage::MemoryStore;

    fn defaults() -> Wiki {
        let mut wiki = Wiki::default();
        let mut lore = Category::new("Lore");
        lore.layout = CategoryLayout::Grouped(vec![
            Group { key: "forces".into(), title: "Forces".into() },
            Group { key: "realms".into(), title: "Realms".into() },
        ]);
        lore.entries.insert("seeder".into(), Entry::new("The Seeder", "Exists."));
        lore.entries.insert("veil".into(), Entry::new("The Veil", "Forgets."));
        wiki.categories.insert("lore".into(), lore);
        let mut people = Category::new("People");
        people.entries.insert("corin".into(), Entry::new("Corin", "A smith."));
        wiki.categories.insert("people".into(), people);
        wiki
    }

    fn stored() -> Wiki {
        let mut wiki = Wiki::default();
        let mut lore = Category::new("Lore");
        lore.layout = CategoryLayout::Grouped(vec![
            Group { key: "forces".into(), title: "Forces".into() },
            Group { key: "mine".into(), title: "My Group".into() },
        ]);
        lore.entries.insert("seeder".into(), Entry::new("The Seeder", "Edited by me."));
        lore.entries.insert("custom".into(), Entry::new("Custom", "User added."));
        wiki.categories.insert("lore".into(), lore);
        wiki
    }

    #[test]
    fn merge_is_additive() {
        let defaults = defaults();
        let mut wiki = stored();
        let report = merge_defaults(&mut wiki, &defaults);

        assert_eq!(report.added_categories, 1);
        assert_eq!(report.added_entries, 1);
        assert_eq!(wiki.entry("lore", "veil"), defaults.entry("lore", "veil"));
        assert_eq!(wiki.entry("lore", "custom").unwrap().content, "User added.");
        assert_eq!(wiki.entry("lore", "seeder").unwrap().content, "Edited by me.");
        assert_eq!(wiki.category("people"), defaults.category("people"));
    }

    #[test]
    fn merge_keeps_user_groups_and_adds_missing_ones() {
        let mut wiki = stored();
        merge_defaults(&mut wiki, &defaults());
        let keys: Vec<_> = wiki.category("lore").unwrap().groups().iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["forces", "mine", "realms"]);
    }

    #[test]
    fn merge_is_idempotent() {
        let defaults = defaults();
        let mut once = stored();
        merge_defaults(&mut once, &defaults);
        let mut twice = once.clone();
        let report = merge_defaults(&mut twice, &defaults);
        assert!(report.is_empty());
        assert_eq!(once, twice);
    }

    #[test]
    fn legacy_blob_migrates_placements_and_layouts() {
        let legacy = json!({
            "characters": {
                "title": "Characters",
                "groups": [{ "key": "mortals", "title": "Mortals" }],
                "entries": {
                    "corin": { "title": "Corin", "content": "A smith.", "tags": ["mortal"], "group": "mortals" }
                }
            },
            "books": {
                "title": "Books",
                "structure": { "ember": { "title": "The Ember Cycle", "volumes": { "ash": { "title": "Ash" } } } },
                "entries": {
                    "ch1": { "title": "Chapter 1", "content": "", "book": "ember", "volume": "ash" }
                }
            }
        });
        let (wiki, from) = migrate(legacy).unwrap();
        assert_eq!(from, 0);
        let characters = wiki.category("characters").unwrap();
        assert_eq!(characters.entries["corin"].placement, Placement::Group("mortals".into()));
        assert_eq!(characters.groups().len(), 1);
        let books = wiki.category("books").unwrap();
        assert_eq!(books.books()[0].key, "ember");
        assert_eq!(books.books()[0].volumes[0].title, "Ash");
        assert_eq!(
            books.entries["ch1"].placement,
            Placement::Volume { book: "ember".into(), volume: Some("ash".into()) }
        );
        assert!(wiki.dangling_placements().is_empty());
    }

    #[test]
    fn newer_versions_are_rejected() {
        let err = decode(r#"{"version": 9, "categories": {}}"#).unwrap_err();
        assert!(matches!(err, WikiError::UnsupportedVersion { found: 9, .. }));
    }

    #[test]
    fn encode_then_decode_is_current() {
        let wiki = defaults();
        let (decoded, from) = decode(&encode(&wiki).unwrap()).unwrap();
        assert_eq!(from, CURRENT_VERSION);
        assert_eq!(decoded, wiki);
    }

    #[tokio::test]
    async fn first_run_persists_defaults() {
        let shim = Persistence::new(MemoryStore::new());
        let loaded = load(&shim, &defaults()).await;
        assert_eq!(loaded.origin, Origin::Fresh);
        let raw = shim.store().value(STORAGE_KEY).unwrap();
        assert_eq!(decode(&raw).unwrap().0, defaults());
    }

    #[tokio::test]
    async fn unreadable_storage_falls_back_without_writing() {
        let shim = Persistence::new(MemoryStore::new());
        shim.store().set_failing(true);
        let loaded = load(&shim, &defaults()).await;
        assert_eq!(loaded.origin, Origin::Fallback);
        shim.store().set_failing(false);
        assert!(shim.store().value(STORAGE_KEY).is_none());
    }

    #[tokio::test]
    async fn malformed_blob_falls_back_and_is_left_alone() {
        let shim = Persistence::new(MemoryStore::with_value(STORAGE_KEY, "{not json"));
        let loaded = load(&shim, &defaults()).await;
        assert_eq!(loaded.origin, Origin::Fallback);
        assert_eq!(loaded.wiki, defaults());
        assert_eq!(shim.store().value(STORAGE_KEY).unwrap(), "{not json");
    }
}
