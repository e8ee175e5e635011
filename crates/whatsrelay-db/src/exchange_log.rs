use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, params};
use tracing::info;
use whatsrelay_common::{Error, Result};

/// Append-only record of answered exchanges, one row per (sender, query, answer).
///
/// Rows are never read back into conversation history.
pub struct ExchangeLog {
    conn: Mutex<Connection>,
}

impl ExchangeLog {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening exchange log at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                whatsapp_id TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS exchanges (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                query TEXT NOT NULL,
                answer TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_exchanges_user
                ON exchanges(user_id, created_at);",
        )
        .map_err(|e| Error::Database(format!("migration failed: {e}")))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Database("exchange log connection poisoned".into()))
    }

    /// Store one answered exchange, registering the sender on first sight.
    pub fn record(&self, sender_id: &str, query: &str, answer: &str) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| Error::Database(format!("failed to begin transaction: {e}")))?;

        tx.execute(
            "INSERT OR IGNORE INTO users (whatsapp_id) VALUES (?1)",
            params![sender_id],
        )
        .map_err(|e| Error::Database(format!("failed to insert user: {e}")))?;

        let user_id: i64 = tx
            .query_row(
                "SELECT id FROM users WHERE whatsapp_id = ?1",
                params![sender_id],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(format!("failed to look up user: {e}")))?;

        tx.execute(
            "INSERT INTO exchanges (user_id, query, answer) VALUES (?1, ?2, ?3)",
            params![user_id, query, answer],
        )
        .map_err(|e| Error::Database(format!("failed to insert exchange: {e}")))?;

        tx.commit()
            .map_err(|e| Error::Database(format!("failed to commit exchange: {e}")))?;
        Ok(())
    }

    /// Number of exchanges stored so far.
    pub fn exchange_count(&self) -> Result<u64> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM exchanges", [], |row| row.get(0))
            .map_err(|e| Error::Database(format!("failed to count exchanges: {e}")))?;
        Ok(count.max(0) as u64)
    }
}
