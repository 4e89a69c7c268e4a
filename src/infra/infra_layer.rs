// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "afk/afk_store.rs"]
pub mod afk;

#[path = "leveling/leveling_store.rs"]
pub mod leveling;

#[path = "cache/redis_cache.rs"]
pub mod cache;

#[path = "db/migrations.rs"]
pub mod db;
