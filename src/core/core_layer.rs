// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "afk/afk_service.rs"]
pub mod afk;

#[path = "leveling/leveling_service.rs"]
pub mod leveling;

#[path = "moderation/permission_service.rs"]
pub mod moderation;

#[path = "tracking/message_tracker.rs"]
pub mod tracking;
