// This module handles bot presence and lifecycle events.
//
// Everything here is Discord-layer glue: we only work with SDK types
// (Context, ActivityData, OnlineStatus) and keep the logic short.

use poise::serenity_prelude as serenity;

/// Statuses the bot cycles through while idle.
const ROTATION: &[&str] = &["over the server", "for ghost pings", "for /report"];

/// How long each rotation entry stays up.
const ROTATION_INTERVAL_SECS: u64 = 300;

fn watching(status: &str) -> serenity::ActivityData {
    serenity::ActivityData::watching(status)
}

/// Called once the bot is ready so we announce a default presence
/// without repeating the setup code at every call site.
pub fn on_ready(ctx: &serenity::Context) {
    ctx.set_presence(Some(watching(ROTATION[0])), serenity::OnlineStatus::Online);
}

/// Spawn the background loop that rotates the presence line.
pub fn spawn_rotation(ctx: serenity::Context) {
    tokio::spawn(async move {
        use std::time::Duration as StdDuration;
        use tokio::time::sleep;

        for status in ROTATION.iter().cycle() {
            ctx.set_presence(Some(watching(status)), serenity::OnlineStatus::Online);
            sleep(StdDuration::from_secs(ROTATION_INTERVAL_SECS)).await;
        }
    });
}
