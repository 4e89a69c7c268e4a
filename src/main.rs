// This is the entry point of the Tux Discord bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (database, cache)
// - `discord/` = Discord-specific adapters (commands, events)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Discord framework
// 4. Register commands and event handlers

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::core::afk::AfkService;
use crate::core::leveling::LevelingService;
use crate::core::moderation::PermissionTable;
use crate::core::tracking::MessageTracker;
use crate::discord::commands::presence;
use crate::discord::gateway;
use crate::discord::{Data, Error};
use crate::infra::afk::SqliteAfkStore;
use crate::infra::cache::RedisCache;
use crate::infra::db;
use crate::infra::leveling::SqliteLevelsStore;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

/// Central dispatcher for non-command Discord events.
/// Every arm delegates to a helper in `discord::gateway`.
async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Message { new_message } => {
            gateway::handle_message(ctx, data, new_message).await?;
        }
        serenity::FullEvent::MessageUpdate {
            old_if_available: _,
            new,
            event,
        } => {
            gateway::handle_message_update(ctx, data, new.as_ref(), event).await?;
        }
        serenity::FullEvent::MessageDelete {
            channel_id,
            deleted_message_id,
            guild_id,
        } => {
            gateway::handle_message_delete(ctx, data, *channel_id, *deleted_message_id, *guild_id)
                .await?;
        }
        serenity::FullEvent::MessageDeleteBulk {
            channel_id,
            multiple_deleted_messages_ids,
            guild_id,
        } => {
            gateway::handle_message_delete_bulk(
                ctx,
                data,
                *channel_id,
                multiple_deleted_messages_ids,
                *guild_id,
            )
            .await?;
        }
        serenity::FullEvent::GuildMemberAddition { new_member } => {
            gateway::handle_member_join(new_member);
        }
        serenity::FullEvent::GuildMemberRemoval {
            guild_id,
            user,
            member_data_if_available: _,
        } => {
            gateway::handle_member_remove(*guild_id, user);
        }
        serenity::FullEvent::GuildRoleDelete {
            guild_id,
            removed_role_id,
            removed_role_data_if_available,
        } => {
            gateway::handle_role_delete(
                *guild_id,
                *removed_role_id,
                removed_role_data_if_available.as_ref(),
            );
        }
        serenity::FullEvent::Ready { data_about_bot } => {
            tracing::info!(user = %data_about_bot.user.name, "Connected to Discord");
            presence::on_ready(ctx);
        }
        serenity::FullEvent::Resume { .. } => {
            tracing::info!("Gateway session resumed");
        }
        _ => {}
    }

    Ok(())
}

/// One generic user-facing message per failed command; the real error goes
/// to the log. Setup failures still abort startup.
async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => {
            panic!("Failed to start bot: {error:?}")
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            tracing::error!(
                command = %ctx.command().qualified_name,
                "Command failed: {error}"
            );
            let _ = ctx
                .say("Something went wrong while running that command.")
                .await;
        }
        error => {
            if let Err(err) = poise::builtins::on_error(error).await {
                tracing::error!("Error while handling error: {err}");
            }
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    // Get Discord bot token from environment
    let token = std::env::var("DISCORD_TOKEN").expect(
        "Missing DISCORD_TOKEN environment variable! Create a .env file with your bot token.",
    );

    // Keep the runtime database in a dedicated folder so the repo root stays tidy.
    let data_dir = "data";
    std::fs::create_dir_all(data_dir).expect("Failed to create data directory for SQLite files");
    let database_path = format!("{}/tux.db", data_dir);

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // Create our services with their dependencies.
    // This is the "composition root" where we wire everything together.

    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .connect(&format!("sqlite://{}?mode=rwc", database_path))
        .await
        .expect("Failed to connect to database");
    db::migrate_up(&pool)
        .await
        .expect("Failed to migrate database");

    let afk_service = Arc::new(AfkService::new(SqliteAfkStore::new(pool.clone())));
    let leveling_service = Arc::new(LevelingService::new(SqliteLevelsStore::new(pool)));
    let permissions = Arc::new(PermissionTable::with_defaults());
    let tracker = Arc::new(MessageTracker::new());

    // Optional Redis cache - the bot runs fine without it.
    let redis_url = std::env::var("REDIS_URL").ok();
    let cache = Arc::new(RedisCache::connect(redis_url.as_deref()).await);

    // Create the data structure that will be shared across all commands
    let data = Data {
        afk: Arc::clone(&afk_service),
        leveling: Arc::clone(&leveling_service),
        permissions: Arc::clone(&permissions),
        tracker: Arc::clone(&tracker),
        cache: Arc::clone(&cache),
    };

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================
    // Configure the poise framework with our commands and settings.

    let intents = serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT // Required to read message content
        | serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MEMBERS;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            // Register all our commands here
            commands: vec![
                discord::commands::utility::ping(),
                discord::commands::utility::avatar(),
                discord::commands::utility::sync(),
                discord::commands::moderation::clear(),
                discord::commands::moderation::roles(),
                discord::commands::moderation::report(),
                discord::commands::afk::afk(),
                discord::commands::afk::permafk(),
                discord::commands::afk::enforce_afk(),
                discord::commands::afk::release_afk(),
                discord::commands::leveling::level(),
                discord::commands::leveling::leaderboard(),
                discord::commands::leveling::blacklist(),
            ],
            // Event handler for messages and other events
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            on_error: |error| Box::pin(on_error(error)),
            // Hook to run after every command
            post_command: |ctx| {
                Box::pin(async move {
                    tracing::info!(
                        command = %ctx.command().qualified_name,
                        user = ctx.author().id.get(),
                        guild = ctx.guild_id().map(|g| g.get()).unwrap_or(0),
                        "Command completed"
                    );
                })
            },
            ..Default::default()
        })
        .setup(|ctx, _ready, framework| {
            Box::pin(async move {
                // Register slash commands globally (can take up to an hour to
                // propagate; use the `sync` command for per-guild updates).
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                tracing::info!("Commands registered");

                presence::spawn_rotation(ctx.clone());

                // Background AFK expiry sweep. Timed AFK entries are cleared
                // here rather than on some future message the member may
                // never send.
                let afk = Arc::clone(&afk_service);
                let http = ctx.http.clone();
                tokio::spawn(async move {
                    use std::time::Duration as StdDuration;
                    use tokio::time::sleep;

                    loop {
                        match afk.sweep_expired(chrono::Utc::now()).await {
                            Ok(expired) => {
                                for entry in expired {
                                    tracing::info!(
                                        member_id = entry.member_id,
                                        guild_id = entry.guild_id,
                                        "AFK entry expired"
                                    );
                                    discord::commands::afk::restore_nickname(
                                        &http,
                                        serenity::GuildId::new(entry.guild_id),
                                        serenity::UserId::new(entry.member_id),
                                        &entry.nickname,
                                    )
                                    .await;
                                }
                            }
                            Err(err) => tracing::warn!("AFK sweep failed: {err}"),
                        }

                        sleep(StdDuration::from_secs(60)).await;
                    }
                });

                Ok(data)
            })
        })
        .build();

    // Create the client and start the bot
    let mut settings = serenity::cache::Settings::default();
    settings.max_messages = 10000;

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .cache_settings(settings)
        .await
        .expect("Error creating client");

    client.start().await.expect("Error running bot");
}
