// Implementations for the AFK system.

pub mod in_memory;
pub mod sqlite_store;

// Re-export for convenience
pub use in_memory::InMemoryAfkStore;
pub use sqlite_store::SqliteAfkStore;
