//! Bounded conversation history.
//!
//! Keeps the most recent question/answer pairs of one session so they can be
//! replayed into the next prompt. Retention is strictly by recency: once the
//! buffer is full, every push evicts the single oldest entry.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of turns retained per session.
pub const DEFAULT_HISTORY_CAPACITY: usize = 14;

/// One completed question/answer turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    user_input: String,
    ai_message: String,
}

impl HistoryEntry {
    pub fn new(user_input: impl Into<String>, ai_message: impl Into<String>) -> Self {
        Self {
            user_input: user_input.into(),
            ai_message: ai_message.into(),
        }
    }

    /// The question the user asked.
    pub fn user_input(&self) -> &str {
        &self.user_input
    }

    /// The answer that was returned.
    pub fn ai_message(&self) -> &str {
        &self.ai_message
    }
}

/// A fixed-capacity FIFO of [`HistoryEntry`] values, oldest first.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl ConversationHistory {
    /// Create an empty history holding at most `capacity` entries.
    ///
    /// A capacity of zero yields a history that never retains anything;
    /// configuration validation rejects it before it gets here.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a turn as the most recent entry, evicting the oldest when full.
    pub fn push(&mut self, user_input: impl Into<String>, ai_message: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(HistoryEntry::new(user_input, ai_message));
    }

    /// The last `min(n, len)` entries, oldest first.
    pub fn peek(&self, n: usize) -> Vec<HistoryEntry> {
        let n = n.min(self.entries.len());
        self.entries
            .iter()
            .skip(self.entries.len() - n)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate over every retained entry, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Forget every entry. Capacity is unchanged.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(history: &[HistoryEntry]) -> Vec<(&str, &str)> {
        history
            .iter()
            .map(|e| (e.user_input(), e.ai_message()))
            .collect()
    }

    #[test]
    fn new_history_is_empty() {
        let history = ConversationHistory::new(4);
        assert!(history.is_empty());
        assert_eq!(history.len(), 0);
        assert_eq!(history.capacity(), 4);
    }

    #[test]
    fn default_capacity_is_fourteen() {
        assert_eq!(ConversationHistory::default().capacity(), 14);
    }

    #[test]
    fn length_tracks_pushes_up_to_capacity() {
        let mut history = ConversationHistory::new(5);
        for i in 0..12 {
            history.push(format!("q{i}"), format!("a{i}"));
            assert_eq!(history.len(), (i + 1).min(5));
        }
    }

    #[test]
    fn peek_returns_suffix_oldest_first() {
        let mut history = ConversationHistory::new(5);
        history.push("q1", "a1");
        history.push("q2", "a2");
        history.push("q3", "a3");

        let recent = history.peek(2);
        assert_eq!(pairs(&recent), vec![("q2", "a2"), ("q3", "a3")]);
    }

    #[test]
    fn eviction_drops_oldest_entry() {
        let mut history = ConversationHistory::new(2);
        history.push("q1", "a1");
        history.push("q2", "a2");
        history.push("q3", "a3");

        assert_eq!(history.len(), 2);
        assert_eq!(pairs(&history.peek(2)), vec![("q2", "a2"), ("q3", "a3")]);
        assert!(history.iter().all(|e| e.user_input() != "q1"));
    }

    #[test]
    fn retained_entries_are_most_recent_in_push_order() {
        let mut history = ConversationHistory::new(3);
        for i in 0..10 {
            history.push(format!("q{i}"), format!("a{i}"));
        }
        let kept: Vec<String> = history.iter().map(|e| e.user_input().to_string()).collect();
        assert_eq!(kept, vec!["q7", "q8", "q9"]);
    }

    #[test]
    fn peek_clamps_to_length() {
        let mut history = ConversationHistory::new(10);
        history.push("q1", "a1");
        history.push("q2", "a2");

        assert_eq!(history.peek(50).len(), 2);
        assert_eq!(pairs(&history.peek(50)), vec![("q1", "a1"), ("q2", "a2")]);
    }

    #[test]
    fn peek_zero_is_empty() {
        let mut history = ConversationHistory::new(3);
        assert!(history.peek(0).is_empty());
        history.push("q1", "a1");
        assert!(history.peek(0).is_empty());
    }

    #[test]
    fn peek_does_not_mutate() {
        let mut history = ConversationHistory::new(3);
        history.push("q1", "a1");
        let _ = history.peek(3);
        let _ = history.peek(0);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn empty_strings_are_accepted() {
        let mut history = ConversationHistory::new(2);
        history.push("", "");
        assert_eq!(history.len(), 1);
        assert_eq!(pairs(&history.peek(1)), vec![("", "")]);
    }

    #[test]
    fn capacity_one_keeps_only_latest() {
        let mut history = ConversationHistory::new(1);
        history.push("q1", "a1");
        history.push("q2", "a2");
        assert_eq!(pairs(&history.peek(5)), vec![("q2", "a2")]);
    }

    #[test]
    fn zero_capacity_never_retains() {
        let mut history = ConversationHistory::new(0);
        history.push("q1", "a1");
        assert!(history.is_empty());
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut history = ConversationHistory::new(3);
        history.push("q1", "a1");
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.capacity(), 3);
    }

    #[test]
    fn entry_serializes_with_field_names() {
        let entry = HistoryEntry::new("Who made Zelda?", "Nintendo.");
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"user_input\":\"Who made Zelda?\""));
        assert!(json.contains("\"ai_message\":\"Nintendo.\""));
    }
}
