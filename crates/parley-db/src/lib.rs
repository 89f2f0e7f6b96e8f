pub mod error;
pub mod migrations;
pub mod models;
pub mod queries;

use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::AtomicI64;
use tracing::info;

use parley_types::models::{Message, User};

pub use error::{Result, StoreError};

/// Durable store for users and messages, implemented by [`Database`].
///
/// Every method is blocking; call it from `spawn_blocking`.
pub trait MessageStore: Send + Sync {
    /// Return the user with this username, creating it if absent.
    /// Concurrent calls with the same username all observe the same row.
    fn create_or_get_user(&self, username: &str) -> Result<User>;

    fn get_user(&self, id: i64) -> Result<Option<User>>;

    fn list_users(&self) -> Result<Vec<User>>;

    /// Persist one message and return it with its server-assigned id and timestamp.
    fn record_message(&self, sender_id: i64, receiver_id: i64, content: &str) -> Result<Message>;

    /// All messages between `user_a` and `user_b`, oldest first.
    fn get_conversation(&self, user_a: i64, user_b: i64) -> Result<Vec<Message>>;
}

pub struct Database {
    conn: Mutex<Connection>,
    /// Latest timestamp handed out, in microseconds since the epoch.
    /// Only advanced while `conn` is held.
    clock: AtomicI64,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let db = Self::init(conn)?;
        info!("Database opened at {}", path.display());
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;

        let latest: i64 = conn.query_row(
            "SELECT COALESCE(MAX(created_at), 0) FROM messages",
            [],
            |row| row.get(0),
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            clock: AtomicI64::new(latest),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Persistence(format!("DB lock poisoned: {}", e)))?;
        f(&conn)
    }
}
