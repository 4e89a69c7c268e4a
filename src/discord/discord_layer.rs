// Discord layer - commands and event handlers.

#[path = "commands/command_catalog.rs"]
pub mod commands;

#[path = "gateway/events.rs"]
pub mod gateway;

// Re-export command types for convenience
pub use commands::{Context, Data, Error};
