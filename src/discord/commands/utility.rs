use crate::discord::{Context, Error};
use poise::serenity_prelude as serenity;

/// Check the bot's gateway latency.
#[poise::command(slash_command, prefix_command)]
pub async fn ping(ctx: Context<'_>) -> Result<(), Error> {
    let latency = ctx.ping().await;
    let latency_text = if latency.is_zero() {
        // No heartbeat ack observed yet on a fresh shard.
        "still measuring...".to_string()
    } else {
        format!("{} ms", latency.as_millis())
    };

    let embed = serenity::CreateEmbed::new()
        .title("Pong!")
        .color(0x5865F2)
        .field("Gateway latency", latency_text, true)
        .field(
            "Cache",
            if ctx.data().cache.is_enabled() {
                "connected"
            } else {
                "disabled"
            },
            true,
        );

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Show a user's avatar.
#[poise::command(slash_command, prefix_command)]
pub async fn avatar(
    ctx: Context<'_>,
    #[description = "User to show (defaults to you)"] user: Option<serenity::User>,
) -> Result<(), Error> {
    let user = user.as_ref().unwrap_or_else(|| ctx.author());

    let embed = serenity::CreateEmbed::new()
        .title(format!("Avatar of {}", user.name))
        .color(0x5865F2)
        .image(user.face());

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Re-register the application command set (owner only).
///
/// Guild registration shows up immediately; global propagation can take up
/// to an hour, so default to the current guild while iterating.
#[poise::command(prefix_command, slash_command, owners_only, hide_in_help)]
pub async fn sync(
    ctx: Context<'_>,
    #[description = "Register globally instead of in this guild"] global: Option<bool>,
) -> Result<(), Error> {
    let global = global.unwrap_or(false);
    poise::builtins::register_application_commands(ctx, global).await?;

    let scope = if global { "globally" } else { "in this guild" };
    ctx.say(format!("Commands synced {scope}.")).await?;
    Ok(())
}
