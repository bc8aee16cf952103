use crate::model::{Category, Entry, Wiki};

/// One matching entry, borrowed from the wiki it was found in.
#[derive(Debug, Clone, Copy)]
pub struct SearchHit<'a> {
    pub category_key: &'a str,
    pub category: &'a Category,
    pub entry_key: &'a str,
    pub entry: &'a Entry,
}

/// Case-insensitive substring match over titles, bodies and tags, in
/// flattened category order. A blank query matches nothing.
pub fn search<'a>(wiki: &'a Wiki, query: &str) -> Vec<SearchHit<'a>> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    wiki.entries()
        .filter(|e| matches(e.entry, &needle))
        .map(|e| SearchHit {
            category_key: e.category_key,
            category: e.category,
            entry_key: e.entry_key,
            entry: e.entry,
        })
        .collect()
}

fn matches(entry: &Entry, needle: &str) -> bool {
    entry.title.to_lowercase().contains(needle)
        || entry.content.to_lowercase().contains(needle)
        || entry.tags.iter().any(|t| t.to_lowercase().contains(needle))
}

/// A short single-line excerpt around the first match in the body.
pub fn snippet(entry: &Entry, query: &str, width: usize) -> String {
    let flat: String = entry
        .content
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace("**", "")
        .replace('*', "");
    let chars: Vec<char> = flat.chars().collect();
    let lower: Vec<char> = flat.to_lowercase().chars().collect();
    let needle: Vec<char> = query.trim().to_lowercase().chars().collect();

    let start = if needle.is_empty() || lower.len() != chars.len() {
        0
    } else {
        lower
            .windows(needle.len())
            .position(|w| w == needle.as_slice())
            .map(|at| at.saturating_sub(width / 4))
            .unwrap_or(0)
    };
    let excerpt: String = chars.iter().skip(start).take(width).collect();
    if start > 0 { format!("…{excerpt}") } else { excerpt }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_title_is_found() {
        let wiki = Wiki::shipped().unwrap();
        for e in wiki.entries() {
            let hits = search(&wiki, &e.entry.title);
            assert!(
                hits.iter().any(|h| h.category_key == e.category_key && h.entry_key == e.entry_key),
                "{} not found by its title",
                e.entry.title
            );
        }
    }

    #[test]
    fn matches_body_and_tags_case_insensitively() {
        let wiki = Wiki::shipped().unwrap();
        let hits = search(&wiki, "LITURGY");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entry_key, "old-vethic");
        assert!(search(&wiki, "city forgetting").iter().any(|h| h.entry_key == "chapter-3-the-glass-well"));
    }

    #[test]
    fn no_match_and_blank_query_are_empty() {
        let wiki = Wiki::shipped().unwrap();
        assert!(search(&wiki, "zzqx-no-such-text").is_empty());
        assert!(search(&wiki, "   ").is_empty());
    }

    #[test]
    fn snippet_centers_on_match() {
        let entry = Entry::new("t", "a b c d e f g h i j k l m n o p the needle q r s");
        let s = snippet(&entry, "needle", 16);
        assert!(s.starts_with('…'));
        assert!(s.contains("needle"));
    }
}
