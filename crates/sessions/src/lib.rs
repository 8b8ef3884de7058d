//! Session history stores for TableTalk.
//!
//! All stores implement the `tabletalk_core::SessionStore` trait.
//! The SQLite store additionally implements the `Database` capability
//! so its schema can be injected as completion context.

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
