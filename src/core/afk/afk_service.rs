// AFK status - business logic for away-from-keyboard tracking.
// Notice how this module has NO Discord-specific code (no serenity, no poise imports).
// It works with primitive types (u64, String) so the Discord layer stays a thin adapter.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

// ============================================================================
// DOMAIN MODELS
// ============================================================================

/// A member's away-from-keyboard state in one guild.
///
/// There is exactly one entry per (member, guild) pair - setting AFK twice
/// replaces the previous entry instead of stacking a second one.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AfkEntry {
    pub member_id: u64,
    pub guild_id: u64,
    /// The nickname the member had before going AFK, so it can be restored.
    pub nickname: String,
    /// Free-text reason shown to people who ping the member.
    pub reason: String,
    pub since: DateTime<Utc>,
    /// When set, the entry expires and is swept by a background task.
    pub until: Option<DateTime<Utc>>,
    /// Set by a moderator; the member cannot clear it by talking.
    pub enforced: bool,
    /// Survives the member's return; only `/permafk` toggles it off.
    pub perm_afk: bool,
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum AfkError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Member already has an enforced AFK status")]
    AlreadyEnforced,

    #[error("Member is not AFK")]
    NotAfk,

    #[error("Invalid member or guild ID")]
    InvalidId,
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Trait for persisting AFK entries.
///
/// The core defines WHAT it needs; the infra layer provides the actual
/// implementation (SQLite in production, in-memory for tests).
#[async_trait]
pub trait AfkStore: Send + Sync {
    /// Get a member's AFK entry in a guild, if any.
    async fn get(&self, member_id: u64, guild_id: u64) -> Result<Option<AfkEntry>, AfkError>;

    /// Insert or replace the entry for (member, guild).
    /// Must never produce a second row for the same pair.
    async fn upsert(&self, entry: AfkEntry) -> Result<(), AfkError>;

    /// Remove and return a member's entry, if any.
    async fn remove(&self, member_id: u64, guild_id: u64) -> Result<Option<AfkEntry>, AfkError>;

    /// Entries whose `until` has passed (permanent entries never expire).
    async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<AfkEntry>, AfkError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

/// The main service for AFK operations, generic over any `AfkStore`.
pub struct AfkService<S: AfkStore> {
    store: S,
}

impl<S: AfkStore> AfkService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn validate_ids(member_id: u64, guild_id: u64) -> Result<(), AfkError> {
        if member_id == 0 || guild_id == 0 {
            Err(AfkError::InvalidId)
        } else {
            Ok(())
        }
    }

    /// Mark a member AFK, replacing any previous self-set entry.
    ///
    /// An enforced entry cannot be overwritten by the member themselves -
    /// that would let people wriggle out of a moderator-set status.
    pub async fn set_afk(
        &self,
        member_id: u64,
        guild_id: u64,
        nickname: String,
        reason: String,
        duration: Option<Duration>,
        perm_afk: bool,
    ) -> Result<AfkEntry, AfkError> {
        Self::validate_ids(member_id, guild_id)?;

        if let Some(existing) = self.store.get(member_id, guild_id).await? {
            if existing.enforced {
                return Err(AfkError::AlreadyEnforced);
            }
        }

        let now = Utc::now();
        let entry = AfkEntry {
            member_id,
            guild_id,
            nickname,
            reason,
            since: now,
            until: duration.map(|d| now + d),
            enforced: false,
            perm_afk,
        };

        self.store.upsert(entry.clone()).await?;
        Ok(entry)
    }

    /// Moderator-set AFK. Overwrites whatever was there before.
    pub async fn enforce_afk(
        &self,
        member_id: u64,
        guild_id: u64,
        nickname: String,
        reason: String,
        duration: Option<Duration>,
    ) -> Result<AfkEntry, AfkError> {
        Self::validate_ids(member_id, guild_id)?;

        let now = Utc::now();
        let entry = AfkEntry {
            member_id,
            guild_id,
            nickname,
            reason,
            since: now,
            until: duration.map(|d| now + d),
            enforced: true,
            perm_afk: false,
        };

        self.store.upsert(entry.clone()).await?;
        Ok(entry)
    }

    /// Clear a member's AFK status when they come back.
    ///
    /// Returns the removed entry so the caller can restore the nickname.
    /// - Permanent entries survive an ordinary return (`Ok(None)`).
    /// - Enforced entries are only cleared with moderator authority.
    pub async fn clear_afk(
        &self,
        member_id: u64,
        guild_id: u64,
        moderator: bool,
    ) -> Result<Option<AfkEntry>, AfkError> {
        Self::validate_ids(member_id, guild_id)?;

        let entry = match self.store.get(member_id, guild_id).await? {
            Some(entry) => entry,
            None => return Ok(None),
        };

        if entry.enforced && !moderator {
            return Ok(None);
        }
        if entry.perm_afk && !moderator {
            return Ok(None);
        }

        self.store.remove(member_id, guild_id).await
    }

    /// Flip a member's permanent-AFK toggle.
    ///
    /// Returns the new entry when turned on, `None` when turned off.
    pub async fn toggle_perm_afk(
        &self,
        member_id: u64,
        guild_id: u64,
        nickname: String,
        reason: String,
    ) -> Result<Option<AfkEntry>, AfkError> {
        Self::validate_ids(member_id, guild_id)?;

        match self.store.get(member_id, guild_id).await? {
            Some(AfkEntry { perm_afk: true, .. }) => {
                self.store.remove(member_id, guild_id).await?;
                Ok(None)
            }
            Some(AfkEntry { enforced: true, .. }) => Err(AfkError::AlreadyEnforced),
            _ => {
                let entry = self
                    .set_afk(member_id, guild_id, nickname, reason, None, true)
                    .await?;
                Ok(Some(entry))
            }
        }
    }

    pub async fn get(&self, member_id: u64, guild_id: u64) -> Result<Option<AfkEntry>, AfkError> {
        Self::validate_ids(member_id, guild_id)?;
        self.store.get(member_id, guild_id).await
    }

    pub async fn is_afk(&self, member_id: u64, guild_id: u64) -> Result<bool, AfkError> {
        Ok(self.get(member_id, guild_id).await?.is_some())
    }

    /// Remove every expired entry and return them so nicknames can be restored.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<Vec<AfkEntry>, AfkError> {
        let expired = self.store.list_expired(now).await?;
        let mut removed = Vec::with_capacity(expired.len());
        for entry in expired {
            if let Some(entry) = self.store.remove(entry.member_id, entry.guild_id).await? {
                removed.push(entry);
            }
        }
        Ok(removed)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use dashmap::DashMap;

    /// In-memory store for testing
    struct MockAfkStore {
        entries: DashMap<(u64, u64), AfkEntry>,
    }

    impl MockAfkStore {
        fn new() -> Self {
            Self {
                entries: DashMap::new(),
            }
        }
    }

    #[async_trait]
    impl AfkStore for MockAfkStore {
        async fn get(&self, member_id: u64, guild_id: u64) -> Result<Option<AfkEntry>, AfkError> {
            Ok(self.entries.get(&(member_id, guild_id)).map(|e| e.clone()))
        }

        async fn upsert(&self, entry: AfkEntry) -> Result<(), AfkError> {
            self.entries
                .insert((entry.member_id, entry.guild_id), entry);
            Ok(())
        }

        async fn remove(
            &self,
            member_id: u64,
            guild_id: u64,
        ) -> Result<Option<AfkEntry>, AfkError> {
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

    fn make_service() -> AfkService<MockAfkStore> {
        AfkService::new(MockAfkStore::new())
    }

    #[tokio::test]
    async fn test_set_and_clear_afk() {
        let service = make_service();

        service
            .set_afk(1, 10, "nick".into(), "lunch".into(), None, false)
            .await
            .unwrap();
        assert!(service.is_afk(1, 10).await.unwrap());

        let removed = service.clear_afk(1, 10, false).await.unwrap().unwrap();
        assert_eq!(removed.nickname, "nick");
        assert!(!service.is_afk(1, 10).await.unwrap());
    }

    #[tokio::test]
    async fn test_set_afk_twice_replaces_entry() {
        let service = make_service();

        service
            .set_afk(1, 10, "nick".into(), "lunch".into(), None, false)
            .await
            .unwrap();
        service
            .set_afk(1, 10, "nick".into(), "dinner".into(), None, false)
            .await
            .unwrap();

        let entry = service.get(1, 10).await.unwrap().unwrap();
        assert_eq!(entry.reason, "dinner");
        assert_eq!(service.store.entries.len(), 1);
    }

    #[tokio::test]
    async fn test_enforced_afk_blocks_self_service() {
        let service = make_service();

        service
            .enforce_afk(1, 10, "nick".into(), "timeout".into(), None)
            .await
            .unwrap();

        // Member can't overwrite it...
        assert!(matches!(
            service
                .set_afk(1, 10, "nick".into(), "brb".into(), None, false)
                .await,
            Err(AfkError::AlreadyEnforced)
        ));

        // ...or clear it by talking.
        assert!(service.clear_afk(1, 10, false).await.unwrap().is_none());
        assert!(service.is_afk(1, 10).await.unwrap());

        // A moderator can.
        assert!(service.clear_afk(1, 10, true).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_perm_afk_survives_return() {
        let service = make_service();

        let entry = service
            .toggle_perm_afk(1, 10, "nick".into(), "gone fishing".into())
            .await
            .unwrap();
        assert!(entry.is_some());

        // An ordinary return doesn't clear it.
        assert!(service.clear_afk(1, 10, false).await.unwrap().is_none());
        assert!(service.is_afk(1, 10).await.unwrap());

        // Toggling again does.
        let entry = service
            .toggle_perm_afk(1, 10, "nick".into(), "".into())
            .await
            .unwrap();
        assert!(entry.is_none());
        assert!(!service.is_afk(1, 10).await.unwrap());
    }

    #[tokio::test]
    async fn test_sweep_expired() {
        let service = make_service();

        service
            .set_afk(
                1,
                10,
                "a".into(),
                "short".into(),
                Some(Duration::minutes(-5)),
                false,
            )
            .await
            .unwrap();
        service
            .set_afk(
                2,
                10,
                "b".into(),
                "long".into(),
                Some(Duration::hours(5)),
                false,
            )
            .await
            .unwrap();
        service
            .set_afk(3, 10, "c".into(), "open ended".into(), None, false)
            .await
            .unwrap();

        let removed = service.sweep_expired(Utc::now()).await.unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].member_id, 1);

        assert!(!service.is_afk(1, 10).await.unwrap());
        assert!(service.is_afk(2, 10).await.unwrap());
        assert!(service.is_afk(3, 10).await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_ids_rejected() {
        let service = make_service();
        assert!(matches!(
            service
                .set_afk(0, 10, String::new(), String::new(), None, false)
                .await,
            Err(AfkError::InvalidId)
        ));
    }
}
