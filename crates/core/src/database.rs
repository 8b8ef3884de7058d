//! Database capability — optional schema context for completions.
//!
//! The engine consumes this narrow interface to inject a description
//! of the caller's database schema as a system message, so the model
//! can answer questions about the data. Schema management itself is
//! not this crate's concern.

use crate::error::DatabaseError;
use async_trait::async_trait;

/// A database the engine can describe and query.
#[async_trait]
pub trait Database: Send + Sync {
    /// A human-readable description of the schema (tables, columns).
    async fn describe_schema(&self) -> std::result::Result<String, DatabaseError>;

    /// Run a read query and return the rows as JSON objects.
    async fn query(
        &self,
        statement: &str,
    ) -> std::result::Result<Vec<serde_json::Value>, DatabaseError>;
}
