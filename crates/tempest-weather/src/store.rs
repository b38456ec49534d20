//! SQLite key-value store for the last weather result.
//!
//! Three slots: the snapshot as a JSON blob, the status as an integer and
//! the last geocoded coordinates as JSON. Written once at shutdown, read once
//! at startup.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tempest_core::error::RusqliteErrorExt;
use tempest_core::StorageError;

use crate::types::{Coordinates, FetchStatus, WeatherSnapshot};

const KEY_LAST_SNAPSHOT: &str = "last_snapshot";
const KEY_LAST_STATUS: &str = "last_status";
const KEY_LAST_COORDINATES: &str = "last_coordinates";

/// What survives a restart
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedWeather {
    pub snapshot: WeatherSnapshot,
    pub status: FetchStatus,
    /// Last geocoded place, reused for named locations at startup
    pub coordinates: Option<Coordinates>,
}

pub struct WeatherStore {
    conn: Connection,
}

impl WeatherStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::OpenFailed(e.to_string()))?;
        }
        let conn = Connection::open(path).map_err(|e| e.into_storage_error())?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory store; nothing survives the process.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(|e| e.into_storage_error())?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        self.conn
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS weather_state (
                    key TEXT PRIMARY KEY,
                    value BLOB NOT NULL
                );
                "#,
            )
            .map_err(|e| e.into_storage_error())
    }

    /// Read the last result, filling defaults for missing or unreadable slots.
    pub fn load(&self) -> Result<PersistedWeather, StorageError> {
        let status = match self.get_status()? {
            Some(FetchStatus::Pending) => {
                tracing::debug!("Stored status was Pending; no request survives a restart");
                FetchStatus::NotYetFetched
            }
            Some(status) => status,
            None => FetchStatus::NotYetFetched,
        };

        let snapshot = match self.get_blob(KEY_LAST_SNAPSHOT)? {
            Some(blob) => match serde_json::from_slice::<WeatherSnapshot>(&blob) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    tracing::warn!("Discarding unreadable stored snapshot: {}", e);
                    WeatherSnapshot::default()
                }
            },
            None => WeatherSnapshot::default(),
        };

        let coordinates = match self.get_blob(KEY_LAST_COORDINATES)? {
            Some(blob) => match serde_json::from_slice::<Coordinates>(&blob) {
                Ok(coordinates) => Some(coordinates),
                Err(e) => {
                    tracing::warn!("Discarding unreadable stored coordinates: {}", e);
                    None
                }
            },
            None => None,
        };

        tracing::info!(
            ?status,
            captured_at = %snapshot.timestamp,
            has_coordinates = coordinates.is_some(),
            "Loaded stored weather"
        );
        Ok(PersistedWeather {
            snapshot,
            status,
            coordinates,
        })
    }

    /// Write every slot in one transaction.
    pub fn save(&self, weather: &PersistedWeather) -> Result<(), StorageError> {
        let snapshot = serde_json::to_vec(&weather.snapshot)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let coordinates = weather
            .coordinates
            .map(|c| serde_json::to_vec(&c))
            .transpose()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| e.into_storage_error())?;

        tx.execute(
            "INSERT OR REPLACE INTO weather_state (key, value) VALUES (?1, ?2)",
            params![KEY_LAST_SNAPSHOT, snapshot],
        )
        .map_err(|e| e.into_storage_error())?;
        tx.execute(
            "INSERT OR REPLACE INTO weather_state (key, value) VALUES (?1, ?2)",
            params![KEY_LAST_STATUS, i64::from(weather.status.code())],
        )
        .map_err(|e| e.into_storage_error())?;
        match coordinates {
            Some(blob) => tx.execute(
                "INSERT OR REPLACE INTO weather_state (key, value) VALUES (?1, ?2)",
                params![KEY_LAST_COORDINATES, blob],
            ),
            None => tx.execute(
                "DELETE FROM weather_state WHERE key = ?1",
                params![KEY_LAST_COORDINATES],
            ),
        }
        .map_err(|e| e.into_storage_error())?;

        tx.commit().map_err(|e| e.into_storage_error())?;

        tracing::info!(status = ?weather.status, "Saved weather state");
        Ok(())
    }

    fn get_blob(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.conn
            .query_row(
                "SELECT value FROM weather_state WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| e.into_storage_error())
    }

    fn get_status(&self) -> Result<Option<FetchStatus>, StorageError> {
        let code: Option<i64> = self
            .conn
            .query_row(
                "SELECT value FROM weather_state WHERE key = ?1",
                params![KEY_LAST_STATUS],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| e.into_storage_error())?;

        Ok(code.and_then(|c| {
            let status = u8::try_from(c).ok().and_then(FetchStatus::from_code);
            if status.is_none() {
                tracing::warn!(code = c, "Ignoring unknown stored weather status");
            }
            status
        }))
    }
}

impl std::fmt::Debug for WeatherStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherStore")
            .field("path", &self.conn.path())
            .finish()
    }
}
