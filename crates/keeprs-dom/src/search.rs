//! Fuzzy search over entries.

use crate::model::{Database, Entry, Group};
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;

/// An entry matching a search query.
#[derive(Debug, Clone)]
pub struct SearchHit<E> {
    pub entry: E,
    /// Path of the containing group as given by [`Group::path`], e.g.
    /// `Root/Email`.
    pub path: String,
    /// Match score; higher is better.
    pub score: i64,
}

/// Score every entry against `query` and return the best `limit` hits.
///
/// Entries are matched on title, username and group path. A blank query
/// returns nothing.
pub fn search_entries<D: Database>(db: &D, query: &str, limit: usize) -> Vec<SearchHit<D::Entry>> {
    if query.trim().is_empty() {
        return Vec::new();
    }

    let matcher = SkimMatcherV2::default();

    let mut items = Vec::new();
    collect_entries(&db.root_group(), &mut items);

    let mut scored: Vec<_> = items
        .into_iter()
        .filter_map(|(entry, path)| {
            let search_text = format!("{} {} {}", entry.title(), entry.username(), path);
            matcher
                .fuzzy_match(&search_text, query)
                .map(|score| SearchHit { entry, path, score })
        })
        .collect();

    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(limit);
    tracing::debug!(query, hits = scored.len(), "Fuzzy search finished");
    scored
}

fn collect_entries<G: Group>(group: &G, items: &mut Vec<(G::Entry, String)>) {
    let path = group.path();
    for entry in group.entries() {
        items.push((entry, path.clone()));
    }

    for child in group.groups() {
        collect_entries(&child, items);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::DomDatabase;

    fn populated() -> DomDatabase {
        let db = DomDatabase::new();
        let email = db.new_group();
        email.set_name("Email");
        db.root_group().add_group(&email).unwrap();
        for (title, user) in [("Gmail", "alice"), ("Fastmail", "bob"), ("Bank", "carol")] {
            let entry = db.new_entry();
            entry.set_title(title);
            entry.set_username(user);
            if title == "Bank" {
                db.root_group().add_entry(&entry).unwrap();
            } else {
                email.add_entry(&entry).unwrap();
            }
        }
        db
    }

    #[test]
    fn hits_are_sorted_and_carry_paths() {
        let db = populated();
        let hits = search_entries(&db, "gmail", 10);
        assert!(!hits.is_empty());
        assert_eq!(hits[0].entry.title(), "Gmail");
        assert_eq!(hits[0].path, "Root/Email");
        assert!(hits.windows(2).all(|pair| pair[0].score >= pair[1].score));
    }

    #[test]
    fn group_path_is_searchable() {
        let db = populated();
        let titles: Vec<String> = search_entries(&db, "email", 10)
            .into_iter()
            .map(|hit| hit.entry.title())
            .collect();
        assert!(titles.contains(&"Gmail".to_string()));
        assert!(titles.contains(&"Fastmail".to_string()));
    }

    #[test]
    fn blank_query_and_limit() {
        let db = populated();
        assert!(search_entries(&db, "   ", 10).is_empty());
        assert_eq!(search_entries(&db, "a", 1).len(), 1);
    }
}
