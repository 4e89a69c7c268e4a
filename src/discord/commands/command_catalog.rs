// Discord commands module.
// Each feature gets its own command file.

pub mod afk;

pub mod leveling;

pub mod moderation;

// Bot presence management
pub mod presence;

pub mod utility;

use crate::core::afk::AfkService;
use crate::core::leveling::LevelingService;
use crate::core::moderation::PermissionTable;
use crate::core::tracking::MessageTracker;
use crate::infra::afk::SqliteAfkStore;
use crate::infra::cache::RedisCache;
use crate::infra::leveling::SqliteLevelsStore;
use std::sync::Arc;

/// Type alias for our bot's context.
/// This is what every command receives as its first parameter.
pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

/// Data that's shared across all commands.
/// This is where we store our services and configuration.
pub struct Data {
    pub afk: Arc<AfkService<SqliteAfkStore>>,
    pub leveling: Arc<LevelingService<SqliteLevelsStore>>,
    pub permissions: Arc<PermissionTable>,
    pub tracker: Arc<MessageTracker>,
    pub cache: Arc<RedisCache>,
}

/// The invoker's role names, resolved through the guild cache.
/// Empty outside a guild or when the cache has no entry yet.
pub async fn author_role_names(ctx: &Context<'_>) -> Vec<String> {
    let Some(member) = ctx.author_member().await else {
        return Vec::new();
    };

    // The cache guard must not be held across an await point.
    let Some(guild) = ctx.guild() else {
        return Vec::new();
    };
    member
        .roles
        .iter()
        .filter_map(|id| guild.roles.get(id).map(|role| role.name.clone()))
        .collect()
}

/// Deny unless one of the invoker's roles grants `command` in the
/// permission table. Replies to the invoker when denying.
pub async fn require_table_permission(ctx: &Context<'_>, command: &str) -> Result<bool, Error> {
    let roles = author_role_names(ctx).await;
    if ctx
        .data()
        .permissions
        .any_role_allows(roles.iter().map(String::as_str), command)
    {
        return Ok(true);
    }

    ctx.say("You don't have permission to use that command.")
        .await?;
    Ok(false)
}
