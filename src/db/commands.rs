//! Command queue repository.
//!
//! Durable, ordered, at-least-once store of commands for the game-server
//! consumer. The bridge only ever appends and reads; the consumer flips a
//! record to executed exactly once. Records are never deleted here -
//! retention is an external concern.

use super::DbError;
use serde::Serialize;
use sqlx::SqlitePool;

/// A queued command record.
#[derive(Debug, Clone, Serialize)]
pub struct CommandRecord {
    pub id: i64,
    /// The literal command string, without a leading prefix character.
    /// Opaque to the bridge; syntax is the consumer's problem.
    pub command: String,
    pub executed: bool,
    pub executed_at: Option<i64>,
    pub created_at: i64,
}

/// Execution status of a queued command, as seen by a status poll.
#[derive(Debug, Clone, Serialize)]
pub struct CommandStatus {
    pub executed: bool,
    pub executed_at: Option<i64>,
}

/// Repository for the command queue.
pub struct CommandRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CommandRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a new pending command and return the stored record.
    ///
    /// SQLite's rowid assignment makes ids unique and monotonic without any
    /// locking on our side. Duplicate submissions produce duplicate records
    /// by design; commands are operator-supervised or idempotent in game.
    pub async fn enqueue(&self, command: &str) -> Result<CommandRecord, DbError> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO pending_commands (command, executed, created_at)
            VALUES (?, 0, ?)
            "#,
        )
        .bind(command)
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(CommandRecord {
            id: result.last_insert_rowid(),
            command: command.to_string(),
            executed: false,
            executed_at: None,
            created_at: now,
        })
    }

    /// Look up the execution status of a record. Pure read, never blocks a
    /// writer (WAL mode).
    pub async fn status(&self, id: i64) -> Result<Option<CommandStatus>, DbError> {
        let row = sqlx::query_as::<_, (bool, Option<i64>)>(
            r#"
            SELECT executed, executed_at
            FROM pending_commands
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|(executed, executed_at)| CommandStatus {
            executed,
            executed_at,
        }))
    }

    /// All pending records, oldest first.
    ///
    /// FIFO order matters to the consumer: "mute" must land before "kick".
    /// Pending items stay visible until marked executed, so a consumer
    /// crash mid-execution causes redelivery (at-least-once).
    pub async fn pending(&self) -> Result<Vec<CommandRecord>, DbError> {
        let rows = sqlx::query_as::<_, (i64, String, bool, Option<i64>, i64)>(
            r#"
            SELECT id, command, executed, executed_at, created_at
            FROM pending_commands
            WHERE executed = 0
            ORDER BY id ASC
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, command, executed, executed_at, created_at)| CommandRecord {
                id,
                command,
                executed,
                executed_at,
                created_at,
            })
            .collect())
    }

    /// Mark a record executed. Returns false when the record does not exist
    /// or was already executed; the `executed = 0` guard makes the
    /// pending -> executed transition one-way and `executed_at` write-once.
    pub async fn mark_executed(&self, id: i64) -> Result<bool, DbError> {
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            UPDATE pending_commands
            SET executed = 1, executed_at = ?
            WHERE id = ? AND executed = 0
            "#,
        )
        .bind(now)
        .bind(id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Current number of unexecuted records, for the queue depth gauge.
    pub async fn pending_count(&self) -> Result<i64, DbError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM pending_commands WHERE executed = 0")
                .fetch_one(self.pool)
                .await?;
        Ok(count)
    }
}
