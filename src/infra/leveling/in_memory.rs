// In-memory implementation of LevelsStore.
//
// DashMap keyed by (member_id, guild_id): concurrent, and structurally unable
// to hold two records for the same pair. Used by tests and available as a
// no-persistence fallback.

use crate::core::leveling::{LevelRecord, LevelingError, LevelsStore};
use async_trait::async_trait;
use dashmap::DashMap;

pub struct InMemoryLevelsStore {
    records: DashMap<(u64, u64), LevelRecord>,
}

impl InMemoryLevelsStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }
}

#[async_trait]
impl LevelsStore for InMemoryLevelsStore {
    async fn get_record(
        &self,
        member_id: u64,
        guild_id: u64,
    ) -> Result<Option<LevelRecord>, LevelingError> {
        Ok(self.records.get(&(member_id, guild_id)).map(|r| r.clone()))
    }

    async fn save_record(&self, record: LevelRecord) -> Result<(), LevelingError> {
        self.records
            .insert((record.member_id, record.guild_id), record);
        Ok(())
    }

    async fn top_records(
        &self,
        guild_id: u64,
        limit: usize,
    ) -> Result<Vec<LevelRecord>, LevelingError> {
        let mut records: Vec<LevelRecord> = self
            .records
            .iter()
            .filter(|r| r.guild_id == guild_id && !r.blacklisted)
            .map(|r| r.clone())
            .collect();

        records.sort_by(|a, b| b.xp.cmp(&a.xp));
        records.truncate(limit);
        Ok(records)
    }

    async fn set_blacklisted(
        &self,
        member_id: u64,
        guild_id: u64,
        blacklisted: bool,
    ) -> Result<(), LevelingError> {
        self.records
            .entry((member_id, guild_id))
            .or_insert_with(|| LevelRecord::new(member_id, guild_id))
            .blacklisted = blacklisted;
        Ok(())
    }
}

impl Default for InMemoryLevelsStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(member_id: u64, guild_id: u64, xp: u64) -> LevelRecord {
        let mut record = LevelRecord::new(member_id, guild_id);
        record.xp = xp;
        record
    }

    #[tokio::test]
    async fn test_save_never_duplicates() {
        let store = InMemoryLevelsStore::new();

        store.save_record(record(1, 10, 100)).await.unwrap();
        store.save_record(record(1, 10, 250)).await.unwrap();

        assert_eq!(store.records.len(), 1);
        assert_eq!(store.get_record(1, 10).await.unwrap().unwrap().xp, 250);
    }

    #[tokio::test]
    async fn test_top_records_sorted_per_guild() {
        let store = InMemoryLevelsStore::new();

        store.save_record(record(1, 100, 500)).await.unwrap();
        store.save_record(record(2, 100, 300)).await.unwrap();
        store.save_record(record(3, 100, 700)).await.unwrap();
        store.save_record(record(4, 200, 900)).await.unwrap(); // other guild

        let top = store.top_records(100, 10).await.unwrap();
        let members: Vec<u64> = top.iter().map(|r| r.member_id).collect();
        assert_eq!(members, vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn test_blacklist_creates_record_and_filters() {
        let store = InMemoryLevelsStore::new();

        store.save_record(record(1, 100, 500)).await.unwrap();
        store.set_blacklisted(1, 100, true).await.unwrap();
        store.set_blacklisted(2, 100, true).await.unwrap();

        assert!(store.get_record(2, 100).await.unwrap().unwrap().blacklisted);
        assert!(store.top_records(100, 10).await.unwrap().is_empty());
    }
}
