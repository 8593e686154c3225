//! Per-feed entry storage.
//!
//! Entries are keyed by link and kept in the order they were first seen.
//! Merging only ever inserts: an entry that is already stored is never
//! replaced, so its read flag survives every later fetch.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::fetcher::FetchedEntry;

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub link: String,
    pub title: String,
    pub published: Option<DateTime<Utc>>,
    pub image: Option<String>,
    pub read: bool,
}

impl Entry {
    pub fn published_display(&self) -> String {
        self.published
            .map(|p| p.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default()
    }
}

impl From<FetchedEntry> for Entry {
    fn from(fetched: FetchedEntry) -> Self {
        Self {
            link: fetched.link,
            title: fetched.title,
            published: fetched.published,
            image: fetched.image,
            read: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryStore {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert every fetched entry whose link is not stored yet.
    ///
    /// Returns the number of entries inserted.
    pub fn merge<I>(&mut self, fetched: I) -> usize
    where
        I: IntoIterator<Item = FetchedEntry>,
    {
        let mut added = 0;
        for entry in fetched {
            if self.index.contains_key(&entry.link) {
                continue;
            }
            self.index.insert(entry.link.clone(), self.entries.len());
            self.entries.push(entry.into());
            added += 1;
        }
        added
    }

    pub fn get(&self, link: &str) -> Option<&Entry> {
        self.index.get(link).map(|&i| &self.entries[i])
    }

    /// Flag an entry as read. Returns `None` if the link is unknown.
    pub fn mark_read(&mut self, link: &str) -> Option<&Entry> {
        let i = *self.index.get(link)?;
        let entry = &mut self.entries[i];
        entry.read = true;
        Some(&*entry)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn unread_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.read).count()
    }

    /// Slice out page `page` of `page_size` entries.
    ///
    /// Pages past the end are empty rather than an error.
    pub fn page(&self, page: usize, page_size: usize) -> Page {
        let page_size = page_size.max(1);
        let start = page.saturating_mul(page_size);
        let entries = self
            .entries
            .iter()
            .skip(start)
            .take(page_size)
            .cloned()
            .collect();

        Page {
            entries,
            page,
            max_page: self.entries.len() / page_size,
            total: self.entries.len(),
            page_size,
        }
    }
}

/// One page of a feed's entries, detached from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub entries: Vec<Entry>,
    pub page: usize,
    pub max_page: usize,
    pub total: usize,
    pub page_size: usize,
}

impl Page {
    pub fn has_next(&self) -> bool {
        self.page < self.max_page && self.next_page().saturating_mul(self.page_size) < self.total
    }

    pub fn next_page(&self) -> usize {
        self.page.saturating_add(1)
    }

    /// Number of entries shown once this page is loaded
    pub fn shown(&self) -> usize {
        self.next_page()
            .saturating_mul(self.page_size)
            .min(self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetched(n: usize) -> FetchedEntry {
        FetchedEntry {
            link: format!("https://example.com/{}", n),
            title: format!("Entry {}", n),
            published: None,
            image: None,
        }
    }

    fn store_with(count: usize) -> EntryStore {
        let mut store = EntryStore::new();
        store.merge((0..count).map(fetched));
        store
    }

    mod merge_tests {
        use super::*;

        #[test]
        fn test_merge_inserts_unread() {
            let mut store = EntryStore::new();
            let added = store.merge(vec![fetched(1), fetched(2)]);

            assert_eq!(added, 2);
            assert_eq!(store.len(), 2);
            assert!(store.iter().all(|e| !e.read));
        }

        #[test]
        fn test_merge_is_idempotent() {
            let mut store = EntryStore::new();
            store.merge(vec![fetched(1), fetched(2)]);
            let snapshot = store.clone();

            let added = store.merge(vec![fetched(1), fetched(2)]);

            assert_eq!(added, 0);
            assert_eq!(store, snapshot);
        }

        #[test]
        fn test_merge_preserves_read_flag() {
            let mut store = EntryStore::new();
            store.merge(vec![fetched(1)]);
            store.mark_read("https://example.com/1");

            store.merge(vec![fetched(1)]);

            assert!(store.get("https://example.com/1").unwrap().read);
        }

        #[test]
        fn test_merge_does_not_update_existing_title() {
            let mut store = EntryStore::new();
            store.merge(vec![fetched(1)]);

            let mut renamed = fetched(1);
            renamed.title = "Renamed upstream".to_string();
            store.merge(vec![renamed]);

            assert_eq!(store.get("https://example.com/1").unwrap().title, "Entry 1");
        }

        #[test]
        fn test_duplicate_links_in_one_batch_keep_first() {
            let mut store = EntryStore::new();
            let mut dup = fetched(1);
            dup.title = "Second copy".to_string();

            let added = store.merge(vec![fetched(1), dup]);

            assert_eq!(added, 1);
            assert_eq!(store.get("https://example.com/1").unwrap().title, "Entry 1");
        }

        #[test]
        fn test_new_entries_append_in_order() {
            let mut store = store_with(2);
            store.merge(vec![fetched(5), fetched(0), fetched(3)]);

            let links: Vec<_> = store.iter().map(|e| e.link.as_str()).collect();
            assert_eq!(
                links,
                vec![
                    "https://example.com/0",
                    "https://example.com/1",
                    "https://example.com/5",
                    "https://example.com/3",
                ]
            );
        }
    }

    mod read_state_tests {
        use super::*;

        #[test]
        fn test_mark_read() {
            let mut store = store_with(3);

            let entry = store.mark_read("https://example.com/1").unwrap();
            assert!(entry.read);
            assert_eq!(store.unread_count(), 2);
        }

        #[test]
        fn test_mark_read_unknown_link() {
            let mut store = store_with(1);
            assert!(store.mark_read("https://example.com/missing").is_none());
        }

        #[test]
        fn test_mark_read_twice_stays_read() {
            let mut store = store_with(1);
            store.mark_read("https://example.com/0");
            store.mark_read("https://example.com/0");

            assert_eq!(store.unread_count(), 0);
        }
    }

    mod pagination_tests {
        use super::*;

        #[test]
        fn test_twelve_entries_page_size_five() {
            let store = store_with(12);

            let first = store.page(0, 5);
            assert_eq!(first.entries.len(), 5);
            assert_eq!(first.entries[0].link, "https://example.com/0");
            assert_eq!(first.entries[4].link, "https://example.com/4");
            assert_eq!(first.max_page, 2);

            let last = store.page(2, 5);
            assert_eq!(last.entries.len(), 2);
            assert_eq!(last.entries[0].link, "https://example.com/10");
            assert_eq!(last.entries[1].link, "https://example.com/11");
            assert_eq!(last.max_page, 2);
        }

        #[test]
        fn test_out_of_range_page_is_empty() {
            let store = store_with(12);

            let page = store.page(7, 5);
            assert!(page.entries.is_empty());
            assert!(!page.has_next());
        }

        #[test]
        fn test_huge_page_index_does_not_overflow() {
            let store = store_with(3);

            let page = store.page(usize::MAX, 5);
            assert!(page.entries.is_empty());
        }

        #[test]
        fn test_empty_store() {
            let store = EntryStore::new();

            let page = store.page(0, 5);
            assert!(page.entries.is_empty());
            assert_eq!(page.max_page, 0);
            assert!(!page.has_next());
        }

        #[test]
        fn test_has_next() {
            let store = store_with(12);

            assert!(store.page(0, 5).has_next());
            assert!(store.page(1, 5).has_next());
            assert!(!store.page(2, 5).has_next());
        }

        #[test]
        fn test_exact_multiple_has_no_empty_trailing_page() {
            let store = store_with(10);

            let page = store.page(1, 5);
            assert_eq!(page.max_page, 2);
            assert!(!page.has_next());
            assert!(store.page(2, 5).entries.is_empty());
        }

        #[test]
        fn test_shown_count() {
            let store = store_with(12);

            assert_eq!(store.page(0, 5).shown(), 5);
            assert_eq!(store.page(2, 5).shown(), 12);
        }
    }

    #[test]
    fn test_published_display() {
        let mut entry: Entry = fetched(1).into();
        assert_eq!(entry.published_display(), "");

        entry.published = Some("2024-01-01T10:30:00Z".parse().unwrap());
        assert_eq!(entry.published_display(), "2024-01-01 10:30");
    }
}
