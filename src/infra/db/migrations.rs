// Schema migrations - a linear, reversible revision chain.
//
// Each revision has an opaque ID, forward SQL, and backward SQL. Applied
// revisions are recorded in `schema_revisions`; `migrate_up` walks the chain
// forward from wherever the database currently is, `migrate_down` reverts
// from the tail. Applying a revision and then reverting it restores the
// previous schema exactly.

use anyhow::{bail, Context, Result};
use sqlx::{Pool, Row, Sqlite};

pub struct Revision {
    pub id: &'static str,
    pub description: &'static str,
    up: &'static [&'static str],
    down: &'static [&'static str],
}

/// The full revision chain, oldest first. Append only - IDs already applied
/// to a live database must never change.
pub const REVISIONS: &[Revision] = &[
    Revision {
        id: "c9b41fd2a6e0",
        description: "create afk_model and levels tables",
        up: &[
            r#"
            CREATE TABLE afk_model (
                member_id INTEGER NOT NULL,
                guild_id INTEGER NOT NULL,
                nickname TEXT NOT NULL,
                reason TEXT NOT NULL,
                since TEXT NOT NULL,
                until TEXT,
                enforced INTEGER NOT NULL DEFAULT 0,
                perm_afk INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (member_id, guild_id)
            );
            "#,
            r#"
            CREATE TABLE levels (
                member_id INTEGER NOT NULL,
                guild_id INTEGER NOT NULL,
                xp INTEGER NOT NULL DEFAULT 0,
                level INTEGER NOT NULL DEFAULT 0,
                blacklisted INTEGER NOT NULL DEFAULT 0,
                last_message TEXT,
                PRIMARY KEY (member_id, guild_id)
            );
            "#,
        ],
        down: &["DROP TABLE levels;", "DROP TABLE afk_model;"],
    },
    Revision {
        id: "f51ac0834b7d",
        description: "index levels for leaderboard reads",
        up: &["CREATE INDEX idx_levels_guild_xp ON levels (guild_id, xp);"],
        down: &["DROP INDEX idx_levels_guild_xp;"],
    },
    Revision {
        id: "2d7e99c1b844",
        description: "rename afk_model to afk",
        up: &["ALTER TABLE afk_model RENAME TO afk;"],
        down: &["ALTER TABLE afk RENAME TO afk_model;"],
    },
];

async fn ensure_revision_table(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_revisions (
            id TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// IDs already applied, in application order.
pub async fn applied_revisions(pool: &Pool<Sqlite>) -> Result<Vec<String>> {
    ensure_revision_table(pool).await?;
    let rows = sqlx::query("SELECT id FROM schema_revisions ORDER BY rowid")
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(|row| row.get::<String, _>("id")).collect())
}

/// Apply every revision not yet recorded, in chain order.
/// Returns how many revisions were applied.
pub async fn migrate_up(pool: &Pool<Sqlite>) -> Result<usize> {
    let applied = applied_revisions(pool).await?;

    // The recorded history must be a prefix of the chain; anything else means
    // this database was migrated by an incompatible binary.
    for (recorded, revision) in applied.iter().zip(REVISIONS) {
        if recorded.as_str() != revision.id {
            bail!(
                "schema history diverged: found revision {recorded}, expected {}",
                revision.id
            );
        }
    }
    if applied.len() > REVISIONS.len() {
        bail!(
            "database is ahead of this binary: {} revisions recorded, {} known",
            applied.len(),
            REVISIONS.len()
        );
    }

    let pending = &REVISIONS[applied.len()..];
    for revision in pending {
        let mut tx = pool.begin().await?;
        for statement in revision.up {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("applying revision {}", revision.id))?;
        }
        sqlx::query("INSERT INTO schema_revisions (id, applied_at) VALUES (?, ?)")
            .bind(revision.id)
            .bind(chrono::Utc::now())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        tracing::info!(revision = revision.id, "Applied {}", revision.description);
    }

    Ok(pending.len())
}

/// Revert the last `steps` applied revisions, newest first.
/// Returns how many revisions were reverted.
pub async fn migrate_down(pool: &Pool<Sqlite>, steps: usize) -> Result<usize> {
    let applied = applied_revisions(pool).await?;
    let steps = steps.min(applied.len());

    let mut reverted = 0;
    for id in applied.iter().rev().take(steps) {
        let revision = REVISIONS
            .iter()
            .find(|r| r.id == id.as_str())
            .with_context(|| format!("unknown revision {id} recorded in database"))?;

        let mut tx = pool.begin().await?;
        for statement in revision.down {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("reverting revision {}", revision.id))?;
        }
        sqlx::query("DELETE FROM schema_revisions WHERE id = ?")
            .bind(revision.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        tracing::info!(revision = revision.id, "Reverted {}", revision.description);
        reverted += 1;
    }

    Ok(reverted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::collections::BTreeSet;

    async fn memory_pool() -> Pool<Sqlite> {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    /// Every user table and index name, ignoring our own bookkeeping.
    async fn schema_objects(pool: &Pool<Sqlite>) -> BTreeSet<(String, String)> {
        sqlx::query(
            "SELECT type, name FROM sqlite_master \
             WHERE name NOT LIKE 'sqlite_%' AND name != 'schema_revisions'",
        )
        .fetch_all(pool)
        .await
        .unwrap()
        .iter()
        .map(|row| (row.get::<String, _>("type"), row.get::<String, _>("name")))
        .collect()
    }

    #[tokio::test]
    async fn test_migrate_up_builds_final_schema() {
        let pool = memory_pool().await;
        let applied = migrate_up(&pool).await.unwrap();
        assert_eq!(applied, REVISIONS.len());

        let objects = schema_objects(&pool).await;
        assert!(objects.contains(&("table".into(), "afk".into())));
        assert!(objects.contains(&("table".into(), "levels".into())));
        assert!(objects.contains(&("index".into(), "idx_levels_guild_xp".into())));
        // The pre-rename name is gone.
        assert!(!objects.contains(&("table".into(), "afk_model".into())));
    }

    #[tokio::test]
    async fn test_migrate_up_is_idempotent() {
        let pool = memory_pool().await;
        assert_eq!(migrate_up(&pool).await.unwrap(), REVISIONS.len());
        assert_eq!(migrate_up(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_forward_then_backward_is_identity() {
        let pool = memory_pool().await;

        let before = schema_objects(&pool).await;
        migrate_up(&pool).await.unwrap();
        migrate_down(&pool, REVISIONS.len()).await.unwrap();
        assert_eq!(schema_objects(&pool).await, before);
        assert!(applied_revisions(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_single_step_down_reverts_only_the_rename() {
        let pool = memory_pool().await;
        migrate_up(&pool).await.unwrap();

        assert_eq!(migrate_down(&pool, 1).await.unwrap(), 1);

        let objects = schema_objects(&pool).await;
        assert!(objects.contains(&("table".into(), "afk_model".into())));
        assert!(!objects.contains(&("table".into(), "afk".into())));
        // Earlier revisions untouched.
        assert!(objects.contains(&("index".into(), "idx_levels_guild_xp".into())));

        // And the chain picks up from where it left off.
        assert_eq!(migrate_up(&pool).await.unwrap(), 1);
        assert!(schema_objects(&pool)
            .await
            .contains(&("table".into(), "afk".into())));
    }

    #[tokio::test]
    async fn test_divergent_history_rejected() {
        let pool = memory_pool().await;
        ensure_revision_table(&pool).await.unwrap();
        sqlx::query("INSERT INTO schema_revisions (id, applied_at) VALUES ('deadbeef0000', ?)")
            .bind(chrono::Utc::now())
            .execute(&pool)
            .await
            .unwrap();

        assert!(migrate_up(&pool).await.is_err());
    }
}
