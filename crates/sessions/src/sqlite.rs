//! SQLite store — durable session history in a single database file.
//!
//! One table holds every persisted message, keyed by session and
//! ordered by an autoincrement rowid (insertion order is turn order).
//! The same backend doubles as the [`Database`] capability: it can
//! describe its schema for context injection and run read queries.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Column, Row, SqlitePool, TypeInfo};
use std::str::FromStr;
use tabletalk_core::database::Database;
use tabletalk_core::error::{DatabaseError, SessionError};
use tabletalk_core::message::{Message, MessageToolCall, Role};
use tabletalk_core::session::{SessionId, SessionStore};
use tracing::{debug, info};

/// A durable SQLite session store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SQLite store from a file path.
    ///
    /// The database and tables are created automatically.
    pub async fn new(path: &str) -> Result<Self, SessionError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| SessionError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| SessionError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite session store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, SessionError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), SessionError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS session_messages (
                iid          INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id   TEXT NOT NULL,
                id           TEXT UNIQUE NOT NULL,
                role         TEXT NOT NULL,
                content      TEXT NOT NULL,
                tool_calls   TEXT NOT NULL DEFAULT '[]',
                tool_call_id TEXT,
                timestamp    TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| SessionError::Storage(format!("session_messages table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_session_messages_session
             ON session_messages(session_id, iid)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| SessionError::Storage(format!("session index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<Message, SessionError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| SessionError::QueryFailed(format!("id column: {e}")))?;
        let role_str: String = row
            .try_get("role")
            .map_err(|e| SessionError::QueryFailed(format!("role column: {e}")))?;
        let content: String = row
            .try_get("content")
            .map_err(|e| SessionError::QueryFailed(format!("content column: {e}")))?;
        let tool_calls_json: String = row
            .try_get("tool_calls")
            .map_err(|e| SessionError::QueryFailed(format!("tool_calls column: {e}")))?;
        let tool_call_id: Option<String> = row
            .try_get("tool_call_id")
            .map_err(|e| SessionError::QueryFailed(format!("tool_call_id column: {e}")))?;
        let timestamp_str: String = row
            .try_get("timestamp")
            .map_err(|e| SessionError::QueryFailed(format!("timestamp column: {e}")))?;

        let role = match role_str.as_str() {
            "system" => Role::System,
            "user" => Role::User,
            "assistant" => Role::Assistant,
            "tool" => Role::Tool,
            other => {
                return Err(SessionError::QueryFailed(format!("unknown role: {other}")));
            }
        };

        let tool_calls: Vec<MessageToolCall> =
            serde_json::from_str(&tool_calls_json).unwrap_or_default();

        let timestamp = chrono::DateTime::parse_from_rfc3339(&timestamp_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(Message {
            id,
            role,
            content,
            tool_calls,
            tool_call_id,
            timestamp,
        })
    }

    fn role_str(role: Role) -> &'static str {
        match role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

#[async_trait]
impl SessionStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn append(&self, session: &SessionId, message: Message) -> Result<(), SessionError> {
        let tool_calls_json = serde_json::to_string(&message.tool_calls)
            .map_err(|e| SessionError::Storage(format!("tool_calls encoding: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO session_messages
                (session_id, id, role, content, tool_calls, tool_call_id, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(session.to_string())
        .bind(&message.id)
        .bind(Self::role_str(message.role))
        .bind(&message.content)
        .bind(tool_calls_json)
        .bind(&message.tool_call_id)
        .bind(message.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| SessionError::Storage(format!("insert failed: {e}")))?;

        Ok(())
    }

    async fn load_recent(
        &self,
        session: &SessionId,
        limit: usize,
    ) -> Result<Vec<Message>, SessionError> {
        let rows = sqlx::query(
            r#"
            SELECT id, role, content, tool_calls, tool_call_id, timestamp
            FROM session_messages
            WHERE session_id = ?
            ORDER BY iid DESC
            LIMIT ?
            "#,
        )
        .bind(session.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SessionError::QueryFailed(format!("load_recent: {e}")))?;

        rows.iter().map(Self::row_to_message).collect()
    }

    async fn clear(&self, session: &SessionId) -> Result<(), SessionError> {
        sqlx::query("DELETE FROM session_messages WHERE session_id = ?")
            .bind(session.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| SessionError::Storage(format!("clear failed: {e}")))?;
        Ok(())
    }
}

/// One JSON value per column, best-effort typed by SQLite affinity.
fn column_to_json(row: &sqlx::sqlite::SqliteRow, index: usize) -> serde_json::Value {
    let type_name = row.column(index).type_info().name().to_uppercase();
    match type_name.as_str() {
        "INTEGER" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(serde_json::Value::from)
            .unwrap_or(serde_json::Value::Null),
        "REAL" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(serde_json::Value::from)
            .unwrap_or(serde_json::Value::Null),
        _ => row
            .try_get::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(serde_json::Value::from)
            .unwrap_or(serde_json::Value::Null),
    }
}

#[async_trait]
impl Database for SqliteStore {
    async fn describe_schema(&self) -> Result<String, DatabaseError> {
        let rows = sqlx::query(
            "SELECT name, sql FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::SchemaUnavailable(e.to_string()))?;

        if rows.is_empty() {
            return Err(DatabaseError::SchemaUnavailable("no tables".into()));
        }

        let mut description = String::from("Database schema:\n");
        for row in &rows {
            let sql: Option<String> = row
                .try_get("sql")
                .map_err(|e| DatabaseError::QueryFailed(format!("sql column: {e}")))?;
            if let Some(sql) = sql {
                description.push_str(&sql);
                description.push('\n');
            }
        }
        Ok(description)
    }

    async fn query(&self, statement: &str) -> Result<Vec<serde_json::Value>, DatabaseError> {
        let rows = sqlx::query(statement)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let result = rows
            .iter()
            .map(|row| {
                let mut object = serde_json::Map::new();
                for (i, column) in row.columns().iter().enumerate() {
                    object.insert(column.name().to_string(), column_to_json(row, i));
                }
                serde_json::Value::Object(object)
            })
            .collect();

        Ok(result)
    }
}
