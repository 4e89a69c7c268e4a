// AFK commands - thin adapters over the core AfkService.
//
// The Discord-visible side of an AFK entry is the nickname prefix; setting
// and restoring it is best-effort because the bot may outrank nobody.

use crate::core::afk::AfkError;
use crate::discord::commands::require_table_permission;
use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

pub const AFK_PREFIX: &str = "[AFK] ";
// Discord caps nicknames at 32 characters.
const MAX_NICKNAME_LEN: usize = 32;

/// Mark yourself AFK. Talking again clears it.
#[poise::command(slash_command, guild_only)]
pub async fn afk(
    ctx: Context<'_>,
    #[description = "Why you're away"] reason: Option<String>,
    #[description = "Clear automatically after this many hours"]
    #[min = 1]
    #[max = 720]
    hours: Option<u32>,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?;
    let member_id = ctx.author().id.get();
    let reason = reason.unwrap_or_else(|| "AFK".to_string());
    let duration = hours.map(|h| chrono::Duration::hours(i64::from(h)));

    let (mut nickname, display_name) = author_nickname(&ctx).await;
    // Re-running /afk must not capture the marked nickname as the original.
    if let Some(existing) = ctx.data().afk.get(member_id, guild_id.get()).await? {
        nickname = existing.nickname;
    }

    match ctx
        .data()
        .afk
        .set_afk(
            member_id,
            guild_id.get(),
            nickname,
            reason.clone(),
            duration,
            false,
        )
        .await
    {
        Ok(_) => {
            apply_afk_nickname(
                ctx.serenity_context(),
                guild_id,
                ctx.author().id,
                &display_name,
            )
            .await;
            ctx.say(format!("You're now AFK: {reason}")).await?;
        }
        Err(AfkError::AlreadyEnforced) => {
            ctx.say("A moderator set your AFK status; only a moderator can change it.")
                .await?;
        }
        Err(err) => return Err(err.into()),
    }

    Ok(())
}

/// Toggle permanent AFK. It survives your messages until toggled off.
#[poise::command(slash_command, guild_only)]
pub async fn permafk(
    ctx: Context<'_>,
    #[description = "Why you're away"] reason: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?;
    let member_id = ctx.author().id.get();
    let reason = reason.unwrap_or_else(|| "AFK".to_string());

    let (mut nickname, display_name) = author_nickname(&ctx).await;
    let previous = ctx.data().afk.get(member_id, guild_id.get()).await?;
    if let Some(existing) = &previous {
        nickname = existing.nickname.clone();
    }

    match ctx
        .data()
        .afk
        .toggle_perm_afk(member_id, guild_id.get(), nickname, reason.clone())
        .await
    {
        Ok(Some(_)) => {
            apply_afk_nickname(
                ctx.serenity_context(),
                guild_id,
                ctx.author().id,
                &display_name,
            )
            .await;
            ctx.say(format!("You're now permanently AFK: {reason}"))
                .await?;
        }
        Ok(None) => {
            // Toggled off; put the pre-AFK nickname back.
            let original = previous.map(|e| e.nickname).unwrap_or_default();
            restore_nickname(
                &ctx.serenity_context().http,
                guild_id,
                ctx.author().id,
                &original,
            )
            .await;
            ctx.say("Welcome back! Your permanent AFK is cleared.")
                .await?;
        }
        Err(AfkError::AlreadyEnforced) => {
            ctx.say("A moderator set your AFK status; only a moderator can change it.")
                .await?;
        }
        Err(err) => return Err(err.into()),
    }

    Ok(())
}

/// Force a member AFK (moderator only).
#[poise::command(
    slash_command,
    guild_only,
    rename = "enforceafk",
    required_permissions = "MODERATE_MEMBERS"
)]
pub async fn enforce_afk(
    ctx: Context<'_>,
    #[description = "Member to mark AFK"] user: serenity::User,
    #[description = "Reason shown to anyone who pings them"] reason: Option<String>,
    #[description = "Lift automatically after this many hours"]
    #[min = 1]
    #[max = 720]
    hours: Option<u32>,
) -> Result<(), Error> {
    if !require_table_permission(&ctx, "AfkEnforce").await? {
        return Ok(());
    }
    if user.bot {
        ctx.say("Bots can't be marked AFK.").await?;
        return Ok(());
    }

    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?;
    let reason = reason.unwrap_or_else(|| "AFK (enforced)".to_string());
    let duration = hours.map(|h| chrono::Duration::hours(i64::from(h)));

    // Fetch the member for their current nickname; fall back to no nickname.
    let member = guild_id.member(ctx.http(), user.id).await.ok();
    let nickname = member
        .as_ref()
        .and_then(|m| m.nick.clone())
        .unwrap_or_default();
    let display_name = member
        .as_ref()
        .map(|m| m.display_name().to_string())
        .unwrap_or_else(|| user.name.clone());

    ctx.data()
        .afk
        .enforce_afk(
            user.id.get(),
            guild_id.get(),
            nickname,
            reason.clone(),
            duration,
        )
        .await?;

    apply_afk_nickname(ctx.serenity_context(), guild_id, user.id, &display_name).await;

    tracing::info!(
        guild_id = guild_id.get(),
        member_id = user.id.get(),
        moderator = ctx.author().id.get(),
        "AFK enforced"
    );
    ctx.say(format!("{} is now AFK: {reason}", user.name)).await?;
    Ok(())
}

/// Lift a member's enforced AFK (moderator only).
#[poise::command(
    slash_command,
    guild_only,
    rename = "releaseafk",
    required_permissions = "MODERATE_MEMBERS"
)]
pub async fn release_afk(
    ctx: Context<'_>,
    #[description = "Member to release"] user: serenity::User,
) -> Result<(), Error> {
    if !require_table_permission(&ctx, "AfkEnforce").await? {
        return Ok(());
    }

    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?;

    match ctx
        .data()
        .afk
        .clear_afk(user.id.get(), guild_id.get(), true)
        .await?
    {
        Some(entry) => {
            restore_nickname(
                &ctx.serenity_context().http,
                guild_id,
                user.id,
                &entry.nickname,
            )
            .await;
            ctx.say(format!("{} is no longer AFK.", user.name)).await?;
        }
        None => {
            ctx.say(format!("{} isn't AFK.", user.name)).await?;
        }
    }

    Ok(())
}

/// The author's current nickname (to restore later) and display name.
async fn author_nickname(ctx: &Context<'_>) -> (String, String) {
    match ctx.author_member().await {
        Some(member) => (
            member.nick.clone().unwrap_or_default(),
            member.display_name().to_string(),
        ),
        None => (String::new(), ctx.author().name.clone()),
    }
}

/// Prefix a member's nickname with the AFK marker, best-effort.
pub async fn apply_afk_nickname(
    ctx: &serenity::Context,
    guild_id: serenity::GuildId,
    member_id: serenity::UserId,
    display_name: &str,
) {
    let base = display_name.strip_prefix(AFK_PREFIX).unwrap_or(display_name);
    // Discord counts characters, not bytes.
    let nickname: String = format!("{AFK_PREFIX}{base}")
        .chars()
        .take(MAX_NICKNAME_LEN)
        .collect();

    if let Err(err) = guild_id
        .edit_member(
            &ctx.http,
            member_id,
            serenity::EditMember::new().nickname(nickname),
        )
        .await
    {
        tracing::warn!(
            member_id = member_id.get(),
            "Failed to set AFK nickname: {err}"
        );
    }
}

/// Put a member's nickname back to what it was before going AFK,
/// best-effort. An empty stored nickname means "no nickname".
pub async fn restore_nickname(
    http: &serenity::Http,
    guild_id: serenity::GuildId,
    member_id: serenity::UserId,
    nickname: &str,
) {
    if let Err(err) = guild_id
        .edit_member(
            http,
            member_id,
            serenity::EditMember::new().nickname(nickname),
        )
        .await
    {
        tracing::warn!(
            member_id = member_id.get(),
            "Failed to restore nickname: {err}"
        );
    }
}
