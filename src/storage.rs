//! Local persistence for the search service.
//!
//! Everything that must survive a process restart lives in one `SQLite`
//! file as a flat key/value table:
//!
//! ```text
//! <root>/state.sqlite
//!   prefs(key TEXT PRIMARY KEY, value)
//! ```
//!
//! Every write is a single statement on a single key: last writer wins,
//! no merging. Reads fall back to well-defined defaults when a key is absent.

mod location;
mod place;
mod session;
mod settings;

use std::{fs, io, path::PathBuf};

use rusqlite::{Connection, OptionalExtension, ToSql, types::FromSql};

/// Default POI search radius in meters.
pub const DEFAULT_SEARCH_RADIUS: u32 = 1000;

/// Logical keys, as persisted.
mod keys {
    pub const SEARCH_RADIUS: &str = "poiSearchRadius";
    pub const SERVICE_RUNNING: &str = "isServiceRunning";
    pub const PLACE_DETAILS: &str = "placeDetails";
    pub const LAST_KNOWN_LOCATION: &str = "last_known_location";
    pub const LAST_LOCATION_UPDATE_TIME: &str = "last_location_update_time";
    pub const SEARCH_PHASE: &str = "searchPhase";
    pub const PENDING_WAKE: &str = "pendingWake";
    pub const SEARCH_SUSPENDED: &str = "searchSuspended";
}

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupt value for {key}: {reason}")]
    Corrupt { key: &'static str, reason: String },
}

pub type Result<T> = core::result::Result<T, StorageError>;

/// Key/value state store backed by a single `SQLite` file.
///
/// Cheap to clone: each operation opens its own connection, so clones can
/// be handed to the scheduler and the state machine independently.
#[derive(Debug, Clone)]
pub struct Storage {
    path: PathBuf,
    default_radius: u32,
}

impl Storage {
    /// Creates a storage instance rooted at the given directory.
    ///
    /// The directory and the database schema are created if missing.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let storage = Self {
            path: root.join("state.sqlite"),
            default_radius: DEFAULT_SEARCH_RADIUS,
        };
        storage
            .open_db()?
            .execute_batch("CREATE TABLE IF NOT EXISTS prefs (key TEXT PRIMARY KEY, value)")?;
        Ok(storage)
    }

    /// Overrides the radius reported when none has been stored.
    #[must_use]
    pub fn with_default_radius(mut self, radius: u32) -> Self {
        self.default_radius = radius;
        self
    }

    /// Returns the default storage root: `~/.spotnear/`.
    pub fn default_root() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".spotnear"))
    }

    /// File locked by the process hosting the service for this store.
    pub fn instance_lock_path(&self) -> PathBuf {
        self.path.with_file_name("spotnear.lock")
    }

    fn open_db(&self) -> Result<Connection> {
        Ok(Connection::open(&self.path)?)
    }

    fn get<T: FromSql>(&self, key: &str) -> Result<Option<T>> {
        let conn = self.open_db()?;
        let value = conn
            .query_row("SELECT value FROM prefs WHERE key = ?1", [key], |row| {
                row.get::<_, T>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn put(&self, key: &str, value: &dyn ToSql) -> Result<()> {
        let conn = self.open_db()?;
        conn.execute(
            "INSERT INTO prefs (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let conn = self.open_db()?;
        conn.execute("DELETE FROM prefs WHERE key = ?1", [key])?;
        Ok(())
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, key: &'static str) -> Result<Option<T>> {
        let Some(json) = self.get::<String>(key)? else {
            return Ok(None);
        };
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| StorageError::Corrupt {
                key,
                reason: e.to_string(),
            })
    }

    fn put_json<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.put(key, &json)
    }
}
