// Moderation commands - channel purging, role deletion, and reports.
//
// Two permission layers apply here: Discord's own flags via the poise
// decorator, and the bot's role-name table checked per command. Both must
// pass.

use crate::discord::commands::require_table_permission;
use crate::discord::{Context, Data, Error};
use poise::serenity_prelude as serenity;

/// Bulk-delete recent messages from this channel.
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "MANAGE_MESSAGES",
    required_bot_permissions = "MANAGE_MESSAGES"
)]
pub async fn clear(
    ctx: Context<'_>,
    #[description = "How many messages to delete (1-100)"]
    #[min = 1]
    #[max = 100]
    amount: u32,
) -> Result<(), Error> {
    if !require_table_permission(&ctx, "Clear").await? {
        return Ok(());
    }

    // Keep the interaction alive while we fetch and delete; the confirmation
    // shouldn't linger in the channel we just purged.
    ctx.defer_ephemeral().await?;

    let messages = ctx
        .channel_id()
        .messages(
            ctx.http(),
            serenity::GetMessages::new().limit(amount as u8),
        )
        .await?;

    let deleted = messages.len();
    ctx.channel_id()
        .delete_messages(ctx.http(), messages.iter().map(|m| m.id))
        .await?;

    tracing::info!(
        channel_id = ctx.channel_id().get(),
        moderator = ctx.author().id.get(),
        deleted,
        "Channel purged"
    );
    ctx.say(format!("Deleted {deleted} messages.")).await?;
    Ok(())
}

/// Manage guild roles.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    subcommands("delete"),
    required_permissions = "MANAGE_ROLES"
)]
pub async fn roles(ctx: Context<'_>) -> Result<(), Error> {
    ctx.say("Available subcommands: `roles delete <role>`").await?;
    Ok(())
}

/// Delete a role from this guild.
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    required_permissions = "MANAGE_ROLES",
    required_bot_permissions = "MANAGE_ROLES"
)]
pub async fn delete(
    ctx: Context<'_>,
    #[description = "Role to delete"] role: serenity::Role,
) -> Result<(), Error> {
    if !require_table_permission(&ctx, "RolesDelete").await? {
        return Ok(());
    }

    let guild_id = ctx.guild_id().ok_or("This command only works in servers")?;

    if role.id.get() == guild_id.get() {
        ctx.say("The @everyone role can't be deleted.").await?;
        return Ok(());
    }
    if role.managed {
        ctx.say("That role is managed by an integration and can't be deleted.")
            .await?;
        return Ok(());
    }

    let role_name = role.name.clone();
    guild_id.delete_role(ctx.http(), role.id).await?;

    tracing::info!(
        guild_id = guild_id.get(),
        role_id = role.id.get(),
        moderator = ctx.author().id.get(),
        "Role deleted"
    );
    ctx.say(format!("Deleted role **{role_name}**.")).await?;
    Ok(())
}

#[derive(Debug, poise::Modal)]
#[name = "Report a user or issue"]
struct ReportModal {
    #[name = "Who or what are you reporting?"]
    #[placeholder = "Username, or a short subject"]
    #[max_length = 100]
    target: String,

    #[name = "What happened?"]
    #[placeholder = "Include message links if you have them"]
    #[paragraph]
    details: String,
}

/// File an anonymous report to the moderators.
#[poise::command(slash_command, guild_only, ephemeral)]
pub async fn report(ctx: poise::ApplicationContext<'_, Data, Error>) -> Result<(), Error> {
    use poise::Modal as _;

    let Some(submission) = ReportModal::execute(ctx).await? else {
        // Modal dismissed without submitting.
        return Ok(());
    };

    let reply_ctx = poise::Context::Application(ctx);
    let guild_id = ctx
        .guild_id()
        .ok_or("This command only works in servers")?;

    let Some(reports_channel) = find_reports_channel(ctx.serenity_context(), guild_id).await
    else {
        reply_ctx
            .say("No `#reports` channel is set up in this server; please contact the moderators directly.")
            .await?;
        return Ok(());
    };

    let embed = serenity::CreateEmbed::new()
        .title("New report")
        .color(0xED4245)
        .field("Target", submission.target, false)
        .field("Details", submission.details, false)
        .timestamp(serenity::Timestamp::now())
        .footer(serenity::CreateEmbedFooter::new(
            "Filed anonymously via /report",
        ));

    // The reporter stays anonymous: only log that a report happened, then
    // confirm ephemerally. A delivery failure turns into one generic reply.
    match reports_channel
        .send_message(
            &ctx.serenity_context().http,
            serenity::CreateMessage::new().embed(embed),
        )
        .await
    {
        Ok(_) => {
            tracing::info!(guild_id = guild_id.get(), "Report filed");
            reply_ctx
                .say("Thank you for your report. The moderators have been notified.")
                .await?;
        }
        Err(err) => {
            tracing::error!("Failed to deliver report: {err}");
            reply_ctx
                .say("Something went wrong while filing your report. Please try again later.")
                .await?;
        }
    }

    Ok(())
}

/// Find the guild's reports channel by name, cache first.
async fn find_reports_channel(
    ctx: &serenity::Context,
    guild_id: serenity::GuildId,
) -> Option<serenity::ChannelId> {
    let cached = ctx
        .cache
        .guild(guild_id)
        .map(|guild| guild.channels.clone());

    let channels = match cached {
        Some(channels) => channels,
        None => guild_id.channels(&ctx.http).await.ok()?,
    };

    channels
        .values()
        .find(|channel| channel.name == "reports")
        .map(|channel| channel.id)
}
