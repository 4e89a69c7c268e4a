// Leveling - business logic for per-guild message XP.
// No Discord imports here; the service works with primitive IDs and lets the
// Discord layer decide how to announce things.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use thiserror::Error;

/// How much XP a single message is worth, before the roll.
const BASE_MESSAGE_XP: u64 = 15;
/// Random jitter added on top of the base, inclusive.
const MESSAGE_XP_JITTER: u64 = 10;
/// Minimum gap between two XP-earning messages.
const XP_COOLDOWN_SECS: i64 = 60;

// ============================================================================
// DOMAIN MODELS
// ============================================================================

/// A member's XP record in one guild.
///
/// Members can be in several guilds, so progress is tracked per
/// (member, guild) pair and there is never more than one record per pair.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LevelRecord {
    pub member_id: u64,
    pub guild_id: u64,
    pub xp: u64,
    /// Derived from `xp`; stored so leaderboard reads don't recompute it.
    pub level: u32,
    /// Blacklisted members gain no XP and are hidden from the leaderboard.
    pub blacklisted: bool,
    /// Last XP-earning message, used for the cooldown.
    pub last_message: Option<DateTime<Utc>>,
}

impl LevelRecord {
    pub fn new(member_id: u64, guild_id: u64) -> Self {
        Self {
            member_id,
            guild_id,
            xp: 0,
            level: 0,
            blacklisted: false,
            last_message: None,
        }
    }
}

/// Returned by the service when a message pushed a member over a level
/// threshold, so the Discord layer can announce it.
#[derive(Debug, Clone)]
pub struct LevelUpEvent {
    pub member_id: u64,
    pub guild_id: u64,
    pub old_level: u32,
    pub new_level: u32,
    pub total_xp: u64,
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum LevelingError {
    #[error("Member is on cooldown. Time remaining: {0}s")]
    OnCooldown(i64),

    #[error("Member is blacklisted from the leveling system")]
    Blacklisted,

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Invalid member or guild ID")]
    InvalidId,
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Trait for persisting level records.
#[async_trait]
pub trait LevelsStore: Send + Sync {
    /// Get a member's record, if one exists.
    async fn get_record(
        &self,
        member_id: u64,
        guild_id: u64,
    ) -> Result<Option<LevelRecord>, LevelingError>;

    /// Insert or replace the record for (member, guild).
    /// Must never produce a second row for the same pair.
    async fn save_record(&self, record: LevelRecord) -> Result<(), LevelingError>;

    /// The top non-blacklisted records in a guild, highest XP first.
    async fn top_records(
        &self,
        guild_id: u64,
        limit: usize,
    ) -> Result<Vec<LevelRecord>, LevelingError>;

    /// Flip a member's blacklist flag, creating the record if needed.
    /// Returns the new flag value.
    async fn set_blacklisted(
        &self,
        member_id: u64,
        guild_id: u64,
        blacklisted: bool,
    ) -> Result<(), LevelingError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

/// The main service for leveling operations, generic over any `LevelsStore`.
pub struct LevelingService<S: LevelsStore> {
    store: S,
    cooldown: Duration,
}

impl<S: LevelsStore> LevelingService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            cooldown: Duration::seconds(XP_COOLDOWN_SECS),
        }
    }

    fn validate_ids(member_id: u64, guild_id: u64) -> Result<(), LevelingError> {
        if member_id == 0 || guild_id == 0 {
            Err(LevelingError::InvalidId)
        } else {
            Ok(())
        }
    }

    /// Process a qualifying message and potentially award XP.
    ///
    /// Returns:
    /// - `Ok(Some(LevelUpEvent))` if the member leveled up
    /// - `Ok(None)` if XP was awarded without a level up
    /// - `Err(OnCooldown)` / `Err(Blacklisted)` when no XP was awarded
    pub async fn process_message(
        &self,
        member_id: u64,
        guild_id: u64,
    ) -> Result<Option<LevelUpEvent>, LevelingError> {
        Self::validate_ids(member_id, guild_id)?;

        let now = Utc::now();
        let mut record = self
            .store
            .get_record(member_id, guild_id)
            .await?
            .unwrap_or_else(|| LevelRecord::new(member_id, guild_id));

        if record.blacklisted {
            return Err(LevelingError::Blacklisted);
        }

        if let Some(last) = record.last_message {
            let elapsed = now - last;
            if elapsed < self.cooldown {
                return Err(LevelingError::OnCooldown(
                    (self.cooldown - elapsed).num_seconds(),
                ));
            }
        }

        let old_level = record.level;
        record.xp += Self::roll_message_xp();
        record.level = Self::calculate_level(record.xp);
        record.last_message = Some(now);

        let new_level = record.level;
        let total_xp = record.xp;
        self.store.save_record(record).await?;

        if new_level > old_level {
            Ok(Some(LevelUpEvent {
                member_id,
                guild_id,
                old_level,
                new_level,
                total_xp,
            }))
        } else {
            Ok(None)
        }
    }

    /// XP for one message: base amount plus a small random roll.
    fn roll_message_xp() -> u64 {
        BASE_MESSAGE_XP + rand::thread_rng().gen_range(0..=MESSAGE_XP_JITTER)
    }

    /// Calculate level from total XP.
    ///
    /// Square-root progression so levels get progressively harder:
    /// level 1 at 50 XP, level 2 at 200, level 3 at 450, and so on.
    /// Pure math, no side effects.
    pub fn calculate_level(xp: u64) -> u32 {
        (xp as f64 / 50.0).sqrt().floor() as u32
    }

    /// Total XP needed to reach the level after `current_level`.
    pub fn xp_for_next_level(current_level: u32) -> u64 {
        let next = u64::from(current_level) + 1;
        next.pow(2) * 50
    }

    /// A member's record, defaulting to an empty one.
    pub async fn get_record(
        &self,
        member_id: u64,
        guild_id: u64,
    ) -> Result<LevelRecord, LevelingError> {
        Self::validate_ids(member_id, guild_id)?;
        Ok(self
            .store
            .get_record(member_id, guild_id)
            .await?
            .unwrap_or_else(|| LevelRecord::new(member_id, guild_id)))
    }

    /// Top members of a guild by XP, blacklisted members excluded.
    pub async fn leaderboard(
        &self,
        guild_id: u64,
        limit: usize,
    ) -> Result<Vec<LevelRecord>, LevelingError> {
        if guild_id == 0 {
            return Err(LevelingError::InvalidId);
        }
        self.store.top_records(guild_id, limit).await
    }

    /// Admin toggle. Returns the new flag value.
    pub async fn toggle_blacklist(
        &self,
        member_id: u64,
        guild_id: u64,
    ) -> Result<bool, LevelingError> {
        Self::validate_ids(member_id, guild_id)?;

        let blacklisted = self
            .store
            .get_record(member_id, guild_id)
            .await?
            .map(|r| r.blacklisted)
            .unwrap_or(false);

        self.store
            .set_blacklisted(member_id, guild_id, !blacklisted)
            .await?;
        Ok(!blacklisted)
    }
}

// ============================================================================
// TESTS
// ============================================================================
