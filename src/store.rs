use std::collections::HashMap;

use crate::entry::{Coordinates, Entry};

/// In-memory entry set keyed by link, in feed order.
#[derive(Debug, Clone, Default)]
pub struct EntryStore {
    entries: Vec<Entry>,
    by_link: HashMap<String, usize>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = Entry>) -> Self {
        let mut store = Self::new();
        store.insert_batch(entries);
        store
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_link.clear();
    }

    /// Insert or replace by link. Returns true when an existing entry was replaced.
    pub fn insert(&mut self, entry: Entry) -> bool {
        match self.by_link.get(&entry.link) {
            Some(&idx) => {
                self.entries[idx] = entry;
                true
            }
            None => {
                self.by_link.insert(entry.link.clone(), self.entries.len());
                self.entries.push(entry);
                false
            }
        }
    }

    /// Insert many entries; returns how many were replaced.
    pub fn insert_batch(&mut self, entries: impl IntoIterator<Item = Entry>) -> usize {
        entries
            .into_iter()
            .map(|entry| self.insert(entry))
            .filter(|replaced| *replaced)
            .count()
    }

    /// Swap in a freshly fetched set.
    pub fn replace_all(&mut self, entries: impl IntoIterator<Item = Entry>) -> usize {
        self.clear();
        self.insert_batch(entries)
    }

    pub fn get(&self, index: usize) -> Option<&Entry> {
        self.entries.get(index)
    }

    pub fn get_by_link(&self, link: &str) -> Option<&Entry> {
        self.by_link.get(link).map(|&idx| &self.entries[idx])
    }

    pub fn index_of(&self, link: &str) -> Option<usize> {
        self.by_link.get(link).copied()
    }

    /// Every entry sitting exactly at `coordinates`.
    pub fn at_coordinates(&self, coordinates: Coordinates) -> impl Iterator<Item = &Entry> {
        self.entries
            .iter()
            .filter(move |entry| entry.coordinates == coordinates)
    }

    pub fn all(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
