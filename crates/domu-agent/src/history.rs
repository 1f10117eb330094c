//! Per-session conversation history.
//!
//! The store is volatile working state: created empty at process start, it
//! grows for the life of the process and is never persisted. Each history key
//! owns its own partition, so appends for one caller never contend with reads
//! for another.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

/// One completed exchange. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurn {
    pub user_text: String,
    pub agent_text: String,
    pub recorded_at: DateTime<Utc>,
}

type Partition = Arc<Mutex<Vec<ConversationTurn>>>;

/// Keyed, append-only conversation log.
///
/// Uses `std::sync` locks intentionally: every acquisition is a short map or
/// vector operation that never spans an `.await` point. The outer lock only
/// guards partition lookup; the per-partition mutex serializes access for one
/// key while other keys proceed independently.
#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    partitions: Arc<RwLock<HashMap<String, Partition>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn existing(&self, key: &str) -> Option<Partition> {
        let partitions = self.partitions.read().unwrap_or_else(|e| e.into_inner());
        partitions.get(key).cloned()
    }

    fn partition(&self, key: &str) -> Partition {
        if let Some(partition) = self.existing(key) {
            return partition;
        }
        let mut partitions = self.partitions.write().unwrap_or_else(|e| e.into_inner());
        partitions.entry(key.to_string()).or_default().clone()
    }

    /// Full history for `key`, oldest first. Empty for unknown keys.
    pub fn history(&self, key: &str) -> Vec<ConversationTurn> {
        match self.existing(key) {
            Some(partition) => partition.lock().unwrap_or_else(|e| e.into_inner()).clone(),
            None => Vec::new(),
        }
    }

    /// The most recent `n` turns for `key`, oldest first.
    pub fn window(&self, key: &str, n: usize) -> Vec<ConversationTurn> {
        let Some(partition) = self.existing(key) else {
            return Vec::new();
        };
        let turns = partition.lock().unwrap_or_else(|e| e.into_inner());
        let start = turns.len().saturating_sub(n);
        turns[start..].to_vec()
    }

    /// Appends one exchange and returns the new history length for `key`.
    pub fn append_turn(&self, key: &str, user_text: &str, agent_text: &str) -> usize {
        let partition = self.partition(key);
        let mut turns = partition.lock().unwrap_or_else(|e| e.into_inner());
        turns.push(ConversationTurn {
            user_text: user_text.to_string(),
            agent_text: agent_text.to_string(),
            recorded_at: Utc::now(),
        });
        turns.len()
    }

    /// Number of turns stored for `key`.
    pub fn len(&self, key: &str) -> usize {
        self.existing(key)
            .map(|p| p.lock().unwrap_or_else(|e| e.into_inner()).len())
            .unwrap_or(0)
    }

    /// Whether nothing has been stored for `key`.
    pub fn is_empty(&self, key: &str) -> bool {
        self.len(key) == 0
    }

    /// Number of distinct keys with a partition.
    pub fn session_count(&self) -> usize {
        self.partitions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(turns: &[ConversationTurn]) -> Vec<(&str, &str)> {
        turns
            .iter()
            .map(|t| (t.user_text.as_str(), t.agent_text.as_str()))
            .collect()
    }

    #[test]
    fn unknown_key_has_empty_history() {
        let store = ConversationStore::new();
        assert!(store.history("nobody").is_empty());
        assert!(store.window("nobody", 3).is_empty());
        assert!(store.is_empty("nobody"));
        assert_eq!(store.session_count(), 0);
    }

    #[test]
    fn appends_extend_history_in_order() {
        let store = ConversationStore::new();
        let mut expected: Vec<(String, String)> = Vec::new();

        for i in 0..5 {
            let user = format!("u{}", i);
            let agent = format!("a{}", i);
            let len = store.append_turn("lead:1", &user, &agent);
            expected.push((user, agent));

            assert_eq!(len, i + 1);
            let history = store.history("lead:1");
            let got: Vec<(String, String)> = history
                .into_iter()
                .map(|t| (t.user_text, t.agent_text))
                .collect();
            assert_eq!(got, expected);
        }
    }

    #[test]
    fn window_returns_most_recent_suffix() {
        let store = ConversationStore::new();
        for i in 0..6 {
            store.append_turn("k", &format!("u{}", i), &format!("a{}", i));
        }

        assert_eq!(pairs(&store.window("k", 2)), vec![("u4", "a4"), ("u5", "a5")]);
        assert_eq!(store.window("k", 0).len(), 0);
        assert_eq!(store.window("k", 50).len(), 6);
    }

    #[test]
    fn partitions_do_not_leak_across_keys() {
        let store = ConversationStore::new();
        for i in 0..3 {
            store.append_turn("A", &format!("a-user-{}", i), "a-agent");
        }
        for i in 0..2 {
            store.append_turn("B", &format!("b-user-{}", i), "b-agent");
        }

        assert_eq!(store.len("A"), 3);
        assert_eq!(store.len("B"), 2);
        assert!(store.history("A").iter().all(|t| t.user_text.starts_with("a-")));
        assert!(store.history("B").iter().all(|t| t.user_text.starts_with("b-")));
        assert_eq!(store.session_count(), 2);
    }

    #[test]
    fn concurrent_appends_to_distinct_keys_are_isolated() {
        let store = ConversationStore::new();
        let handles: Vec<_> = (0..8)
            .map(|k| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let key = format!("lead:{}", k);
                    for i in 0..=k {
                        store.append_turn(&key, &format!("{}-{}", k, i), "ok");
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        for k in 0..8 {
            let key = format!("lead:{}", k);
            let history = store.history(&key);
            assert_eq!(history.len(), k + 1);
            for (i, turn) in history.iter().enumerate() {
                assert_eq!(turn.user_text, format!("{}-{}", k, i));
            }
        }
    }
}
