use crate::core::leveling::{LevelRecord, LevelingError, LevelsStore};
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite};

/// SQLite-backed LevelsStore. Expects the migrated schema (see `infra::db`);
/// leaderboard reads lean on the (guild_id, xp) index.
pub struct SqliteLevelsStore {
    pool: Pool<Sqlite>,
}

impl SqliteLevelsStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LevelsStore for SqliteLevelsStore {
    async fn get_record(
        &self,
        member_id: u64,
        guild_id: u64,
    ) -> Result<Option<LevelRecord>, LevelingError> {
        let row = sqlx::query("SELECT * FROM levels WHERE member_id = ? AND guild_id = ?")
            .bind(member_id as i64)
            .bind(guild_id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| LevelingError::StorageError(e.to_string()))?;

        Ok(row.as_ref().map(row_to_record))
    }

    async fn save_record(&self, record: LevelRecord) -> Result<(), LevelingError> {
        // The composite primary key makes this a replace, never a second row.
        sqlx::query(
            r#"
            INSERT INTO levels (member_id, guild_id, xp, level, blacklisted, last_message)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(member_id, guild_id) DO UPDATE SET
                xp = excluded.xp,
                level = excluded.level,
                blacklisted = excluded.blacklisted,
                last_message = excluded.last_message
            "#,
        )
        .bind(record.member_id as i64)
        .bind(record.guild_id as i64)
        .bind(record.xp as i64)
        .bind(i64::from(record.level))
        .bind(record.blacklisted)
        .bind(record.last_message)
        .execute(&self.pool)
        .await
        .map_err(|e| LevelingError::StorageError(e.to_string()))?;

        Ok(())
    }

    async fn top_records(
        &self,
        guild_id: u64,
        limit: usize,
    ) -> Result<Vec<LevelRecord>, LevelingError> {
        let rows = sqlx::query(
            "SELECT * FROM levels WHERE guild_id = ? AND blacklisted = 0 \
             ORDER BY xp DESC LIMIT ?",
        )
        .bind(guild_id as i64)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LevelingError::StorageError(e.to_string()))?;

        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn set_blacklisted(
        &self,
        member_id: u64,
        guild_id: u64,
        blacklisted: bool,
    ) -> Result<(), LevelingError> {
        sqlx::query(
            r#"
            INSERT INTO levels (member_id, guild_id, blacklisted)
            VALUES (?, ?, ?)
            ON CONFLICT(member_id, guild_id) DO UPDATE SET
                blacklisted = excluded.blacklisted
            "#,
        )
        .bind(member_id as i64)
        .bind(guild_id as i64)
        .bind(blacklisted)
        .execute(&self.pool)
        .await
        .map_err(|e| LevelingError::StorageError(e.to_string()))?;

        Ok(())
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> LevelRecord {
    LevelRecord {
        member_id: row.get::<i64, _>("member_id") as u64,
        guild_id: row.get::<i64, _>("guild_id") as u64,
        xp: row.get::<i64, _>("xp") as u64,
        level: row.get::<i64, _>("level") as u32,
        blacklisted: row.get("blacklisted"),
        last_message: row.get("last_message"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::db;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn migrated_store() -> SqliteLevelsStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        db::migrate_up(&pool).await.unwrap();
        SqliteLevelsStore::new(pool)
    }

    fn record(member_id: u64, guild_id: u64, xp: u64) -> LevelRecord {
        let mut record = LevelRecord::new(member_id, guild_id);
        record.xp = xp;
        record
    }

    #[tokio::test]
    async fn test_save_never_duplicates() {
        let store = migrated_store().await;

        store.save_record(record(1, 10, 100)).await.unwrap();
        store.save_record(record(1, 10, 250)).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM levels")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(store.get_record(1, 10).await.unwrap().unwrap().xp, 250);
    }

    #[tokio::test]
    async fn test_top_records_sorted_and_filtered() {
        let store = migrated_store().await;

        store.save_record(record(1, 100, 500)).await.unwrap();
        store.save_record(record(2, 100, 300)).await.unwrap();
        store.save_record(record(3, 100, 700)).await.unwrap();
        store.save_record(record(4, 200, 900)).await.unwrap(); // other guild
        store.set_blacklisted(2, 100, true).await.unwrap();

        let top = store.top_records(100, 2).await.unwrap();
        let members: Vec<u64> = top.iter().map(|r| r.member_id).collect();
        assert_eq!(members, vec![3, 1]);
    }

    #[tokio::test]
    async fn test_blacklist_upsert_creates_default_row() {
        let store = migrated_store().await;

        store.set_blacklisted(7, 100, true).await.unwrap();

        let record = store.get_record(7, 100).await.unwrap().unwrap();
        assert!(record.blacklisted);
        assert_eq!(record.xp, 0);
        assert_eq!(record.level, 0);
        assert_eq!(record.last_message, None);
    }
}
