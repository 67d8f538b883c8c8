//! SQLite store backing sessions, messages, and users.
//!
//! Uses a single database file with WAL journaling and foreign keys ON;
//! deleting a session cascades to its messages. All schema migrations are
//! idempotent `CREATE ... IF NOT EXISTS` statements run at pool creation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

use parley_core::error::StoreError;
use parley_core::message::{Message, MessageRole, MessageType, NewMessage};
use parley_core::session::{NewSession, Session, SessionId, SessionMode, SessionStatus};
use parley_core::store::{MessageStore, SessionStore, SortOrder, UserStore};
use parley_core::user::{NewUser, User, UserId};

/// SQLite-backed implementation of all Parley stores.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and run migrations.
    ///
    /// Pass `":memory:"` for an ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Unavailable(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        // An in-memory database exists per connection; a pool of them
        // would be a pool of unrelated empty databases.
        let max_connections = if path.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    /// Run schema migrations.
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id            TEXT PRIMARY KEY,
                username      TEXT UNIQUE NOT NULL,
                email         TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                created_at    TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Migration(format!("users table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id         TEXT PRIMARY KEY,
                owner_id   TEXT NOT NULL REFERENCES users(id),
                project_id TEXT,
                name       TEXT,
                mode       TEXT NOT NULL DEFAULT 'chat',
                role       TEXT,
                status     TEXT NOT NULL DEFAULT 'ACTIVE',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Migration(format!("sessions table: {e}")))?;

        // iid is the per-session ordering tiebreaker for same-millisecond
        // inserts; id stays the public identifier.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                iid          INTEGER PRIMARY KEY AUTOINCREMENT,
                id           TEXT UNIQUE NOT NULL,
                session_id   TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
                user_id      TEXT NOT NULL,
                role         TEXT NOT NULL,
                content      TEXT NOT NULL,
                message_type TEXT NOT NULL DEFAULT 'text',
                metadata     TEXT NOT NULL DEFAULT '{}',
                created_at   TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Migration(format!("messages table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id, iid)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Migration(format!("messages index: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_owner ON sessions(owner_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Migration(format!("sessions index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_session(row: &SqliteRow) -> Result<Session, StoreError> {
        Ok(Session {
            id: SessionId(get(row, "id")?),
            owner_id: UserId(get(row, "owner_id")?),
            project_id: get_opt(row, "project_id")?,
            name: get_opt(row, "name")?,
            mode: SessionMode::parse(&get(row, "mode")?),
            role: get_opt(row, "role")?,
            status: SessionStatus::parse(&get(row, "status")?),
            created_at: parse_ts(&get(row, "created_at")?)?,
            updated_at: parse_ts(&get(row, "updated_at")?)?,
        })
    }

    fn row_to_message(row: &SqliteRow) -> Result<Message, StoreError> {
        let metadata: String = get(row, "metadata")?;
        Ok(Message {
            id: get(row, "id")?,
            session_id: SessionId(get(row, "session_id")?),
            user_id: UserId(get(row, "user_id")?),
            role: MessageRole::parse(&get(row, "role")?),
            content: get(row, "content")?,
            message_type: MessageType::parse(&get(row, "message_type")?),
            metadata: serde_json::from_str(&metadata).unwrap_or_default(),
            created_at: parse_ts(&get(row, "created_at")?)?,
        })
    }

    fn row_to_user(row: &SqliteRow) -> Result<User, StoreError> {
        Ok(User {
            id: UserId(get(row, "id")?),
            username: get(row, "username")?,
            email: get(row, "email")?,
            password_hash: get(row, "password_hash")?,
            created_at: parse_ts(&get(row, "created_at")?)?,
        })
    }
}

fn get(row: &SqliteRow, column: &str) -> Result<String, StoreError> {
    row.try_get::<String, _>(column)
        .map_err(|e| StoreError::Query(format!("column {column}: {e}")))
}

fn get_opt(row: &SqliteRow, column: &str) -> Result<Option<String>, StoreError> {
    row.try_get::<Option<String>, _>(column)
        .map_err(|e| StoreError::Query(format!("column {column}: {e}")))
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Query(format!("bad timestamp '{s}': {e}")))
}

fn query_err(e: sqlx::Error) -> StoreError {
    StoreError::Query(e.to_string())
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn create(&self, new: NewSession) -> Result<Session, StoreError> {
        let session = Session {
            id: SessionId::new(),
            owner_id: new.owner_id,
            project_id: new.project_id,
            name: new.name,
            mode: new.mode,
            role: new.role,
            status: SessionStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO sessions (id, owner_id, project_id, name, mode, role, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&session.id.0)
        .bind(&session.owner_id.0)
        .bind(&session.project_id)
        .bind(&session.name)
        .bind(session.mode.as_str())
        .bind(&session.role)
        .bind(session.status.as_str())
        .bind(session.created_at.to_rfc3339())
        .bind(session.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(query_err)?;

        debug!(session_id = %session.id, owner = %session.owner_id, "Session created");
        Ok(session)
    }

    async fn get(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE id = ?1")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err)?;

        row.as_ref().map(Self::row_to_session).transpose()
    }

    async fn list_for_owner(
        &self,
        owner_id: &UserId,
        status: Option<SessionStatus>,
    ) -> Result<Vec<Session>, StoreError> {
        let rows = match status {
            Some(status) => {
                sqlx::query(
                    "SELECT * FROM sessions WHERE owner_id = ?1 AND status = ?2 ORDER BY created_at DESC",
                )
                .bind(&owner_id.0)
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query("SELECT * FROM sessions WHERE owner_id = ?1 ORDER BY created_at DESC")
                    .bind(&owner_id.0)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(query_err)?;

        rows.iter().map(Self::row_to_session).collect()
    }

    async fn set_mode(&self, id: &SessionId, mode: SessionMode) -> Result<Session, StoreError> {
        let result = sqlx::query("UPDATE sessions SET mode = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(mode.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(&id.0)
            .execute(&self.pool)
            .await
            .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Query(format!("no such session: {id}")));
        }
        SessionStore::get(self, id)
            .await?
            .ok_or_else(|| StoreError::Query(format!("no such session: {id}")))
    }

    async fn set_status(
        &self,
        id: &SessionId,
        status: SessionStatus,
    ) -> Result<Session, StoreError> {
        let result = sqlx::query("UPDATE sessions SET status = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(status.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(&id.0)
            .execute(&self.pool)
            .await
            .map_err(query_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Query(format!("no such session: {id}")));
        }
        SessionStore::get(self, id)
            .await?
            .ok_or_else(|| StoreError::Query(format!("no such session: {id}")))
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?1")
            .bind(&id.0)
            .execute(&self.pool)
            .await
            .map_err(query_err)?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn insert(&self, new: NewMessage) -> Result<Message, StoreError> {
        let message = Message::from_new(new);

        sqlx::query(
            r#"
            INSERT INTO messages (id, session_id, user_id, role, content, message_type, metadata, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&message.id)
        .bind(&message.session_id.0)
        .bind(&message.user_id.0)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(message.message_type.as_str())
        .bind(serde_json::to_string(&message.metadata).unwrap_or_else(|_| "{}".into()))
        .bind(message.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(query_err)?;

        Ok(message)
    }

    async fn list_recent(
        &self,
        session_id: &SessionId,
        limit: u32,
        order: SortOrder,
    ) -> Result<Vec<Message>, StoreError> {
        // The window is always the newest `limit` turns; Asc only flips
        // how that window is returned.
        let sql = match order {
            SortOrder::Asc => {
                r#"
                SELECT * FROM (
                    SELECT * FROM messages WHERE session_id = ?1
                    ORDER BY created_at DESC, iid DESC LIMIT ?2
                ) ORDER BY created_at ASC, iid ASC
                "#
            }
            SortOrder::Desc => {
                r#"
                SELECT * FROM messages WHERE session_id = ?1
                ORDER BY created_at DESC, iid DESC LIMIT ?2
                "#
            }
        };

        let rows = sqlx::query(sql)
            .bind(&session_id.0)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(query_err)?;

        rows.iter().map(Self::row_to_message).collect()
    }

    async fn list_page(
        &self,
        session_id: &SessionId,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM messages WHERE session_id = ?1
            ORDER BY created_at ASC, iid ASC LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(&session_id.0)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(query_err)?;

        rows.iter().map(Self::row_to_message).collect()
    }

    async fn count(&self, session_id: &SessionId) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) as cnt FROM messages WHERE session_id = ?1")
            .bind(&session_id.0)
            .fetch_one(&self.pool)
            .await
            .map_err(query_err)?;

        let count: i64 = row.try_get("cnt").map_err(query_err)?;
        Ok(count as u64)
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        let user = User {
            id: UserId::new(),
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&user.id.0)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(query_err)?;

        debug!(user_id = %user.id, username = %user.username, "User created");
        Ok(user)
    }

    async fn get(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?1")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err)?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT * FROM users WHERE username = ?1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err)?;

        row.as_ref().map(Self::row_to_user).transpose()
    }
}
