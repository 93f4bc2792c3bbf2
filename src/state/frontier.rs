//! The URL frontier: what has been visited and what is still pending
//!
//! Pending URLs are popped last-in-first-out, so link-deep branches are
//! explored before their siblings. That order decides which pages make it
//! into the first batches, so it must stay depth-first.

use std::collections::HashSet;

/// Visited set plus a LIFO pending stack
#[derive(Debug, Default, Clone)]
pub struct Frontier {
    /// Every URL ever marked visited; never shrinks
    visited: HashSet<String>,

    /// Pending URLs in push order; `pop` takes from the end
    pending: Vec<String>,

    /// Mirror of `pending` for O(1) membership checks
    pending_set: HashSet<String>,
}

impl Frontier {
    /// Creates an empty frontier
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a frontier seeded with the given URLs
    ///
    /// Seeds are pushed in order, so the last seed is popped first.
    pub fn with_seeds<I, S>(seeds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut frontier = Self::new();
        for seed in seeds {
            frontier.push(seed);
        }
        frontier
    }

    /// Adds a URL unless it is already visited or already pending
    ///
    /// Returns true if the URL was added.
    pub fn push(&mut self, url: impl Into<String>) -> bool {
        let url = url.into();
        if self.visited.contains(&url) || self.pending_set.contains(&url) {
            return false;
        }
        self.pending_set.insert(url.clone());
        self.pending.push(url);
        true
    }

    /// Removes and returns the most recently pushed URL
    pub fn pop(&mut self) -> Option<String> {
        let url = self.pending.pop()?;
        self.pending_set.remove(&url);
        Some(url)
    }

    /// Records a URL as visited
    ///
    /// Returns true if it had not been visited before. A visited URL is also
    /// dropped from `pending` so it can never be handed out again.
    pub fn mark_visited(&mut self, url: &str) -> bool {
        if self.pending_set.remove(url) {
            self.pending.retain(|pending| pending != url);
        }
        self.visited.insert(url.to_string())
    }

    /// Number of pending URLs
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
