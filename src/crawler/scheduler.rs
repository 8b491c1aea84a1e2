//! In-memory crawl frontier
//!
//! Entries are dispatched first-in first-out, which approximates a
//! breadth-first traversal. A URL can be pending at most once; pushing a URL
//! that is already queued is a no-op.

use std::collections::{HashSet, VecDeque};

/// A URL waiting to be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: String,

    /// Link distance from the seed (sitemap URLs count as seeds)
    pub depth: u32,

    /// URL of the page the link was found on; empty for the seed
    pub parent: String,
}

impl FrontierEntry {
    pub fn new(url: impl Into<String>, depth: u32, parent: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            depth,
            parent: parent.into(),
        }
    }

    /// Entry for the crawl's start URL
    pub fn seed(url: impl Into<String>) -> Self {
        Self::new(url, 0, "")
    }
}

/// FIFO queue of pending entries with duplicate suppression
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<FrontierEntry>,
    pending: HashSet<String>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry; returns false if its URL is already pending
    pub fn push(&mut self, entry: FrontierEntry) -> bool {
        if !self.pending.insert(entry.url.clone()) {
            return false;
        }
        self.queue.push_back(entry);
        true
    }

    /// Puts an entry back at the head of the queue
    ///
    /// Used for work that was dispatched but never started, so it is the
    /// next thing to run (or to be persisted on shutdown).
    pub fn push_front(&mut self, entry: FrontierEntry) -> bool {
        if !self.pending.insert(entry.url.clone()) {
            return false;
        }
        self.queue.push_front(entry);
        true
    }

    pub fn pop(&mut self) -> Option<FrontierEntry> {
        let entry = self.queue.pop_front()?;
        self.pending.remove(&entry.url);
        Some(entry)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.pending.contains(url)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Removes and returns every pending entry in dispatch order
    pub fn drain(&mut self) -> Vec<FrontierEntry> {
        self.pending.clear();
        self.queue.drain(..).collect()
    }
}

impl Extend<FrontierEntry> for Frontier {
    fn extend<I: IntoIterator<Item = FrontierEntry>>(&mut self, iter: I) {
        for entry in iter {
            self.push(entry);
        }
    }
}
