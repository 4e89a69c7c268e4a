// Leveling commands.
//
// Notice the pattern:
// 1. Extract primitive data from Discord types
// 2. Call core service
// 3. Format the response based on the result
//
// This layer is THIN - no business logic, just translation.

use crate::core::leveling::{LevelRecord, LevelingService};
use crate::discord::{Context, Error};
use crate::infra::leveling::SqliteLevelsStore;
use poise::serenity_prelude as serenity;

// How long a rendered leaderboard stays valid. Short on purpose: the board
// moves with every message.
const LEADERBOARD_CACHE_SECS: u64 = 60;

/// Show your current level and XP.
#[poise::command(slash_command, guild_only)]
pub async fn level(
    ctx: Context<'_>,
    #[description = "User to check (defaults to you)"] user: Option<serenity::User>,
) -> Result<(), Error> {
    let target_user = user.as_ref().unwrap_or_else(|| ctx.author());
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    if target_user.bot {
        ctx.say("Bots don't have levels!").await?;
        return Ok(());
    }

    let record = ctx
        .data()
        .leveling
        .get_record(target_user.id.get(), guild_id)
        .await?;

    let next_threshold =
        LevelingService::<SqliteLevelsStore>::xp_for_next_level(record.level);
    let xp_needed = next_threshold.saturating_sub(record.xp);

    let mut embed = serenity::CreateEmbed::new()
        .title(format!("Level of {}", target_user.name))
        .color(0x00ff00)
        .thumbnail(target_user.face())
        .field("Level", format!("**{}**", record.level), true)
        .field("Total XP", format!("**{}**", record.xp), true)
        .field("XP to next level", format!("{xp_needed}"), true);

    if record.blacklisted {
        embed = embed.field("Note", "This member is blacklisted from XP gain.", false);
    }

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Show the guild's XP leaderboard.
#[poise::command(slash_command, guild_only)]
pub async fn leaderboard(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    // Caching policy lives here, not in the cache wrapper: short TTL,
    // invalidation by expiry only.
    let cache_key = format!("leaderboard:{guild_id}");
    let records: Vec<LevelRecord> = match ctx.data().cache.get_json(&cache_key).await {
        Some(cached) => cached,
        None => {
            let records = ctx.data().leveling.leaderboard(guild_id, 10).await?;
            ctx.data()
                .cache
                .setex_json(&cache_key, LEADERBOARD_CACHE_SECS, &records)
                .await;
            records
        }
    };

    if records.is_empty() {
        ctx.say("Nobody has earned XP yet. Get chatting!").await?;
        return Ok(());
    }

    let mut lines = String::new();
    for (rank, record) in records.iter().enumerate() {
        lines.push_str(&format!(
            "**{}.** <@{}> — level {} ({} XP)\n",
            rank + 1,
            record.member_id,
            record.level,
            record.xp
        ));
    }

    let embed = serenity::CreateEmbed::new()
        .title("Leaderboard")
        .color(0xFFD700)
        .description(lines);

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Toggle a member's XP blacklist (admin only).
#[poise::command(slash_command, guild_only, required_permissions = "ADMINISTRATOR")]
pub async fn blacklist(
    ctx: Context<'_>,
    #[description = "Member to toggle"] user: serenity::User,
) -> Result<(), Error> {
    if user.bot {
        ctx.say("Bots aren't part of the leveling system.").await?;
        return Ok(());
    }

    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?
        .get();

    let blacklisted = ctx
        .data()
        .leveling
        .toggle_blacklist(user.id.get(), guild_id)
        .await?;

    // The cached board may still show them; drop it.
    ctx.data()
        .cache
        .delete(&format!("leaderboard:{guild_id}"))
        .await;

    if blacklisted {
        ctx.say(format!("{} is now blacklisted from XP gain.", user.name))
            .await?;
    } else {
        ctx.say(format!("{} can earn XP again.", user.name)).await?;
    }

    Ok(())
}
