// In-memory implementation of AfkStore.
//
// Same contract as the SQLite implementation, minus the database. Handy for
// tests and for running the bot without persistence.

use crate::core::afk::{AfkEntry, AfkError, AfkStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// DashMap keyed by (member_id, guild_id) - one slot per pair, so the
/// uniqueness invariant is structural.
pub struct InMemoryAfkStore {
    entries: DashMap<(u64, u64), AfkEntry>,
}

impl InMemoryAfkStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

#[async_trait]
impl AfkStore for InMemoryAfkStore {
    async fn get(&self, member_id: u64, guild_id: u64) -> Result<Option<AfkEntry>, AfkError> {
        Ok(self.entries.get(&(member_id, guild_id)).map(|e| e.clone()))
    }

    async fn upsert(&self, entry: AfkEntry) -> Result<(), AfkError> {
        self.entries
            .insert((entry.member_id, entry.guild_id), entry);
        Ok(())
    }

    async fn remove(&self, member_id: u64, guild_id: u64) -> Result<Option<AfkEntry>, AfkError> {
        Ok(self.entries.remove(&(member_id, guild_id)).map(|(_, e)| e))
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<AfkEntry>, AfkError> {
        Ok(self
            .entries
            .iter()
            .filter(|e| !e.perm_afk && e.until.is_some_and(|t| t <= now))
            .map(|e| e.clone())
            .collect())
    }
}

impl Default for InMemoryAfkStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(member_id: u64, guild_id: u64, reason: &str) -> AfkEntry {
        AfkEntry {
            member_id,
            guild_id,
            nickname: "nick".into(),
            reason: reason.into(),
            since: Utc::now(),
            until: None,
            enforced: false,
            perm_afk: false,
        }
    }

    #[tokio::test]
    async fn test_upsert_never_duplicates() {
        let store = InMemoryAfkStore::new();

        store.upsert(entry(1, 10, "first")).await.unwrap();
        store.upsert(entry(1, 10, "second")).await.unwrap();

        assert_eq!(store.entries.len(), 1);
        let stored = store.get(1, 10).await.unwrap().unwrap();
        assert_eq!(stored.reason, "second");
    }

    #[tokio::test]
    async fn test_same_member_different_guilds() {
        let store = InMemoryAfkStore::new();

        store.upsert(entry(1, 10, "guild a")).await.unwrap();
        store.upsert(entry(1, 20, "guild b")).await.unwrap();

        assert_eq!(store.entries.len(), 2);
        assert_eq!(store.get(1, 10).await.unwrap().unwrap().reason, "guild a");
        assert_eq!(store.get(1, 20).await.unwrap().unwrap().reason, "guild b");
    }

    #[tokio::test]
    async fn test_remove_returns_entry() {
        let store = InMemoryAfkStore::new();
        store.upsert(entry(1, 10, "bye")).await.unwrap();

        let removed = store.remove(1, 10).await.unwrap().unwrap();
        assert_eq!(removed.reason, "bye");
        assert!(store.remove(1, 10).await.unwrap().is_none());
    }
}
