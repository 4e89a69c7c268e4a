use crate::core::afk::{AfkEntry, AfkError, AfkStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Row, Sqlite};

/// SQLite-backed AfkStore. Expects the migrated schema (see `infra::db`).
pub struct SqliteAfkStore {
    pool: Pool<Sqlite>,
}

impl SqliteAfkStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AfkStore for SqliteAfkStore {
    async fn get(&self, member_id: u64, guild_id: u64) -> Result<Option<AfkEntry>, AfkError> {
        let row = sqlx::query("SELECT * FROM afk WHERE member_id = ? AND guild_id = ?")
            .bind(member_id as i64)
            .bind(guild_id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AfkError::StorageError(e.to_string()))?;

        Ok(row.as_ref().map(row_to_entry))
    }

    async fn upsert(&self, entry: AfkEntry) -> Result<(), AfkError> {
        // The composite primary key makes this a replace, never a second row.
        sqlx::query(
            r#"
            INSERT INTO afk (member_id, guild_id, nickname, reason, since, until, enforced, perm_afk)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(member_id, guild_id) DO UPDATE SET
                nickname = excluded.nickname,
                reason = excluded.reason,
                since = excluded.since,
                until = excluded.until,
                enforced = excluded.enforced,
                perm_afk = excluded.perm_afk
            "#,
        )
        .bind(entry.member_id as i64)
        .bind(entry.guild_id as i64)
        .bind(&entry.nickname)
        .bind(&entry.reason)
        .bind(entry.since)
        .bind(entry.until)
        .bind(entry.enforced)
        .bind(entry.perm_afk)
        .execute(&self.pool)
        .await
        .map_err(|e| AfkError::StorageError(e.to_string()))?;

        Ok(())
    }

    async fn remove(&self, member_id: u64, guild_id: u64) -> Result<Option<AfkEntry>, AfkError> {
        let entry = self.get(member_id, guild_id).await?;
        if entry.is_some() {
            sqlx::query("DELETE FROM afk WHERE member_id = ? AND guild_id = ?")
                .bind(member_id as i64)
                .bind(guild_id as i64)
                .execute(&self.pool)
                .await
                .map_err(|e| AfkError::StorageError(e.to_string()))?;
        }
        Ok(entry)
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<AfkEntry>, AfkError> {
        let rows = sqlx::query(
            "SELECT * FROM afk WHERE perm_afk = 0 AND until IS NOT NULL AND until <= ?",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AfkError::StorageError(e.to_string()))?;

        Ok(rows.iter().map(row_to_entry).collect())
    }
}

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> AfkEntry {
    AfkEntry {
        member_id: row.get::<i64, _>("member_id") as u64,
        guild_id: row.get::<i64, _>("guild_id") as u64,
        nickname: row.get("nickname"),
        reason: row.get("reason"),
        since: row.get("since"),
        until: row.get("until"),
        enforced: row.get("enforced"),
        perm_afk: row.get("perm_afk"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::db;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn migrated_store() -> SqliteAfkStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        db::migrate_up(&pool).await.unwrap();
        SqliteAfkStore::new(pool)
    }

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
    async fn test_roundtrip() {
        let store = migrated_store().await;

        let mut original = entry(1, 10, "lunch");
        original.enforced = true;
        store.upsert(original.clone()).await.unwrap();

        let loaded = store.get(1, 10).await.unwrap().unwrap();
        assert_eq!(loaded.member_id, original.member_id);
        assert_eq!(loaded.guild_id, original.guild_id);
        assert_eq!(loaded.nickname, original.nickname);
        assert_eq!(loaded.reason, original.reason);
        assert_eq!(loaded.until, None);
        assert!(loaded.enforced);
        assert!(!loaded.perm_afk);
    }

    #[tokio::test]
    async fn test_upsert_never_duplicates() {
        let store = migrated_store().await;

        store.upsert(entry(1, 10, "first")).await.unwrap();
        store.upsert(entry(1, 10, "second")).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM afk")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(store.get(1, 10).await.unwrap().unwrap().reason, "second");
    }

    #[tokio::test]
    async fn test_list_expired_skips_permanent_and_open_ended() {
        let store = migrated_store().await;
        let now = Utc::now();

        let mut expired = entry(1, 10, "expired");
        expired.until = Some(now - chrono::Duration::minutes(5));
        let mut future = entry(2, 10, "future");
        future.until = Some(now + chrono::Duration::hours(1));
        let mut perm = entry(3, 10, "perm");
        perm.until = Some(now - chrono::Duration::minutes(5));
        perm.perm_afk = true;
        let open_ended = entry(4, 10, "open");

        for e in [expired, future, perm, open_ended] {
            store.upsert(e).await.unwrap();
        }

        let hits = store.list_expired(now).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].member_id, 1);
    }

    #[tokio::test]
    async fn test_remove_returns_entry() {
        let store = migrated_store().await;
        store.upsert(entry(1, 10, "bye")).await.unwrap();

        assert!(store.remove(1, 10).await.unwrap().is_some());
        assert!(store.remove(1, 10).await.unwrap().is_none());
        assert!(store.get(1, 10).await.unwrap().is_none());
    }
}
