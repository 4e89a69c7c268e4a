// Gateway event helpers - translate raw events into core service calls.
//
// The central dispatcher in main.rs matches on FullEvent and delegates here.
// Each helper applies its guards, calls at most one core service, and
// performs at most one visible side effect. Failures are logged, never
// escalated past the current event.

use crate::core::afk::AfkEntry;
use crate::core::leveling::{LevelUpEvent, LevelingError};
use crate::core::tracking::{self, TrackedMessage};
use crate::discord::Data;
use anyhow::Result;
use poise::serenity_prelude::{self as serenity, Context};

/// Snapshot a gateway message for later delete/edit handling.
fn snapshot(msg: &serenity::Message, guild_id: u64) -> TrackedMessage {
    TrackedMessage {
        message_id: msg.id.get(),
        guild_id,
        channel_id: msg.channel_id.get(),
        author_id: msg.author.id.get(),
        author_name: msg.author.name.clone(),
        author_is_bot: msg.author.bot,
        content: msg.content.clone(),
        user_mentions: msg.mentions.iter().map(|u| u.id.get()).collect(),
        role_mentions: msg.mention_roles.iter().map(|r| r.get()).collect(),
        mentions_everyone: msg.mention_everyone,
    }
}

/// Handle a newly created message: track it, settle AFK state, award XP.
pub async fn handle_message(
    ctx: &Context,
    data: &Data,
    msg: &serenity::Message,
) -> Result<()> {
    // Ignore bot messages (including our own)
    if msg.author.bot {
        return Ok(());
    }

    // Only guild messages matter here (not DMs)
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };

    data.tracker.remember(snapshot(msg, guild_id.get()));

    handle_afk_return(ctx, data, msg, guild_id).await;
    handle_afk_mentions(ctx, data, msg, guild_id).await;

    match data
        .leveling
        .process_message(msg.author.id.get(), guild_id.get())
        .await
    {
        Ok(Some(level_up)) => {
            tracing::info!(
                member_id = level_up.member_id,
                guild_id = level_up.guild_id,
                old_level = level_up.old_level,
                new_level = level_up.new_level,
                total_xp = level_up.total_xp,
                "Member leveled up"
            );
            if let Err(err) = send_level_up_embed(ctx, msg, &level_up).await {
                tracing::warn!("Failed to send level-up embed: {err}");
            }
        }
        Ok(None) => {}
        // Cooldown and blacklist are expected outcomes, not errors worth noise.
        Err(LevelingError::OnCooldown(_)) | Err(LevelingError::Blacklisted) => {}
        Err(err) => {
            tracing::error!("Error processing XP for message: {err}");
        }
    }

    Ok(())
}

/// Clear the author's AFK status when they talk again.
async fn handle_afk_return(
    ctx: &Context,
    data: &Data,
    msg: &serenity::Message,
    guild_id: serenity::GuildId,
) {
    let cleared = match data
        .afk
        .clear_afk(msg.author.id.get(), guild_id.get(), false)
        .await
    {
        Ok(cleared) => cleared,
        Err(err) => {
            tracing::error!("Error clearing AFK status: {err}");
            return;
        }
    };

    if let Some(entry) = cleared {
        crate::discord::commands::afk::restore_nickname(
            &ctx.http,
            guild_id,
            msg.author.id,
            &entry.nickname,
        )
        .await;

        if let Err(err) = msg
            .reply(&ctx.http, "Welcome back! Your AFK status is cleared.")
            .await
        {
            tracing::warn!("Failed to send AFK return notice: {err}");
        }
    }
}

/// Tell the author which of the members they pinged are AFK.
async fn handle_afk_mentions(
    ctx: &Context,
    data: &Data,
    msg: &serenity::Message,
    guild_id: serenity::GuildId,
) {
    let mut lines: Vec<String> = Vec::new();
    let mut seen: Vec<u64> = Vec::new();

    for user in &msg.mentions {
        let member_id = user.id.get();
        if member_id == msg.author.id.get() || user.bot || seen.contains(&member_id) {
            continue;
        }
        seen.push(member_id);

        match data.afk.get(member_id, guild_id.get()).await {
            Ok(Some(entry)) => lines.push(format_afk_notice(user, &entry)),
            Ok(None) => {}
            Err(err) => tracing::error!("Error looking up AFK status: {err}"),
        }
    }

    if lines.is_empty() {
        return;
    }

    if let Err(err) = msg.reply(&ctx.http, lines.join("\n")).await {
        tracing::warn!("Failed to send AFK notice: {err}");
    }
}

fn format_afk_notice(user: &serenity::User, entry: &AfkEntry) -> String {
    format!(
        "**{}** is AFK: {} (since <t:{}:R>)",
        user.name,
        entry.reason,
        entry.since.timestamp()
    )
}

async fn send_level_up_embed(
    ctx: &Context,
    msg: &serenity::Message,
    level_up: &LevelUpEvent,
) -> Result<()> {
    let embed = serenity::CreateEmbed::new()
        .title("Level up!")
        .color(0x00ff00)
        .description(format!(
            "<@{}> reached level **{}** ({} XP total)",
            level_up.member_id, level_up.new_level, level_up.total_xp
        ));

    msg.channel_id
        .send_message(&ctx.http, serenity::CreateMessage::new().embed(embed))
        .await?;
    Ok(())
}

/// A deleted message that pinged someone is a ghost ping - call it out.
pub async fn handle_message_delete(
    ctx: &Context,
    data: &Data,
    channel_id: serenity::ChannelId,
    message_id: serenity::MessageId,
    guild_id: Option<serenity::GuildId>,
) -> Result<()> {
    if guild_id.is_none() {
        return Ok(());
    }

    let Some(deleted) = data.tracker.take(message_id.get()) else {
        // Nothing tracked - the message predates us or was already evicted.
        return Ok(());
    };

    if !tracking::is_ghost_ping(&deleted) {
        return Ok(());
    }

    send_ghost_ping_embed(ctx, channel_id, &deleted, "deleted their message").await
}

/// Bulk deletions (e.g. `/clear`) can hide ghost pings too.
pub async fn handle_message_delete_bulk(
    ctx: &Context,
    data: &Data,
    channel_id: serenity::ChannelId,
    message_ids: &[serenity::MessageId],
    guild_id: Option<serenity::GuildId>,
) -> Result<()> {
    for message_id in message_ids {
        handle_message_delete(ctx, data, channel_id, *message_id, guild_id).await?;
    }
    Ok(())
}

/// An edit that silently drops mentions counts as a ghost ping as well.
pub async fn handle_message_update(
    ctx: &Context,
    data: &Data,
    new: Option<&serenity::Message>,
    event: &serenity::MessageUpdateEvent,
) -> Result<()> {
    let Some(old) = data.tracker.get(event.id.get()) else {
        return Ok(());
    };

    // Build the post-edit snapshot: prefer the full message, fall back to
    // patching the old snapshot with whatever fields the event carries.
    let updated = match new {
        Some(msg) => snapshot(msg, old.guild_id),
        None => {
            let mut patched = old.clone();
            if let Some(content) = &event.content {
                patched.content = content.clone();
            }
            if let Some(mentions) = &event.mentions {
                patched.user_mentions = mentions.iter().map(|u| u.id.get()).collect();
            }
            if let Some(roles) = &event.mention_roles {
                patched.role_mentions = roles.iter().map(|r| r.get()).collect();
            }
            if let Some(everyone) = event.mention_everyone {
                patched.mentions_everyone = everyone;
            }
            patched
        }
    };

    let ghosted = tracking::edit_removed_mentions(&old, &updated);
    data.tracker.remember(updated);

    if ghosted {
        send_ghost_ping_embed(ctx, event.channel_id, &old, "edited away a ping").await?;
    }

    Ok(())
}

async fn send_ghost_ping_embed(
    ctx: &Context,
    channel_id: serenity::ChannelId,
    message: &TrackedMessage,
    what_happened: &str,
) -> Result<()> {
    let mut content = message.content.clone();
    if content.len() > 1000 {
        content.truncate(1000);
        content.push_str("...");
    }
    if content.is_empty() {
        content = "*(no text content)*".to_string();
    }

    let embed = serenity::CreateEmbed::new()
        .title("Ghost ping detected")
        .color(0xED4245)
        .description(format!(
            "**{}** {what_happened}.",
            message.author_name
        ))
        .field("Message", content, false)
        .timestamp(serenity::Timestamp::now());

    channel_id
        .send_message(&ctx.http, serenity::CreateMessage::new().embed(embed))
        .await?;
    Ok(())
}

/// Membership churn only gets a log line.
pub fn handle_member_join(member: &serenity::Member) {
    tracing::info!(
        guild_id = member.guild_id.get(),
        member_id = member.user.id.get(),
        name = %member.user.name,
        "Member joined"
    );
}

pub fn handle_member_remove(guild_id: serenity::GuildId, user: &serenity::User) {
    tracing::info!(
        guild_id = guild_id.get(),
        member_id = user.id.get(),
        name = %user.name,
        "Member left"
    );
}

/// Role deletions get a log line; the role may be gone from the cache
/// already, so the name is best-effort.
pub fn handle_role_delete(
    guild_id: serenity::GuildId,
    role_id: serenity::RoleId,
    cached_role: Option<&serenity::Role>,
) {
    tracing::info!(
        guild_id = guild_id.get(),
        role_id = role_id.get(),
        name = cached_role.map(|r| r.name.as_str()).unwrap_or("<unknown>"),
        "Role deleted"
    );
}
