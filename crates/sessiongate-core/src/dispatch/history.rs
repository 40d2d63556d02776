//! Bounded per-user message history.
//!
//! Each user's log is an insertion-ordered ring capped at a fixed capacity;
//! appending past the cap evicts the oldest entry. Logs exist only between
//! `open` (session creation) and `remove` (session teardown), and each log is
//! stamped with the generation of the session that opened it. A write from
//! an in-flight send is accepted only by the log of its own session, so it
//! can neither resurrect a removed log nor land in a re-created session's.

use std::collections::VecDeque;

use dashmap::DashMap;
use sessiongate_types::message::HistoryEntry;
use sessiongate_types::session::UserId;
use tracing::debug;

#[derive(Debug)]
struct Log {
    generation: u64,
    entries: VecDeque<HistoryEntry>,
}

/// Keyed store of bounded history logs.
///
/// Each key's log is mutated under its own map entry; different users never
/// contend on the same lock.
#[derive(Debug)]
pub struct HistoryStore {
    logs: DashMap<UserId, Log>,
    capacity: usize,
    default_limit: usize,
}

impl HistoryStore {
    pub fn new(capacity: usize, default_limit: usize) -> Self {
        Self {
            logs: DashMap::new(),
            capacity: capacity.max(1),
            default_limit,
        }
    }

    /// Start an empty log for a user's session `generation`, replacing any
    /// leftover one.
    pub fn open(&self, user_id: &UserId, generation: u64) {
        self.logs.insert(
            user_id.clone(),
            Log {
                generation,
                entries: VecDeque::with_capacity(self.capacity),
            },
        );
    }

    /// Append an entry to the log opened by session `generation`, evicting
    /// the oldest past capacity.
    ///
    /// Returns false (and drops the entry) if the user has no open log or the
    /// open log belongs to a different session.
    pub fn append(&self, user_id: &UserId, generation: u64, entry: HistoryEntry) -> bool {
        let Some(mut log) = self.logs.get_mut(user_id) else {
            debug!(%user_id, "no history log open, dropping entry");
            return false;
        };
        if log.generation != generation {
            debug!(
                %user_id,
                generation,
                open_generation = log.generation,
                "history entry from a previous session, dropping"
            );
            return false;
        }
        log.entries.push_back(entry);
        while log.entries.len() > self.capacity {
            log.entries.pop_front();
        }
        true
    }

    /// The most recent `limit` entries (default when `None`), newest first.
    pub fn query(&self, user_id: &UserId, limit: Option<usize>) -> Vec<HistoryEntry> {
        let limit = limit.unwrap_or(self.default_limit);
        self.logs
            .get(user_id)
            .map(|log| log.entries.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    /// Number of entries currently retained for a user.
    pub fn len(&self, user_id: &UserId) -> usize {
        self.logs.get(user_id).map(|log| log.entries.len()).unwrap_or(0)
    }

    pub fn is_open(&self, user_id: &UserId) -> bool {
        self.logs.contains_key(user_id)
    }

    /// Drop a user's log entirely.
    pub fn remove(&self, user_id: &UserId) {
        self.logs.remove(user_id);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
