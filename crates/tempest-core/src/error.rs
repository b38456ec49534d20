//! Centralized error types for Tempest.
//!
//! Every error has a `user_message()` that a watch face can show in place of
//! weather data; the `Display` form keeps the detail for logs.

use thiserror::Error;

/// Top-level application error type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Weather service error: {0}")]
    Weather(#[from] WeatherError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a short message suitable for display on the watch face.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Network(e) => e.user_message(),
            AppError::Storage(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Weather(e) => e.user_message(),
            AppError::Io(_) => "A file operation failed.",
            AppError::Other(_) => "An unexpected error occurred.",
        }
    }
}

/// Network-related errors (HTTP, connectivity).
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl NetworkError {
    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkError::ConnectionFailed(_) => "No connection.",
            NetworkError::Timeout => "Request timed out.",
            NetworkError::ServerError { status, .. } if *status >= 500 => {
                "Service is having issues."
            }
            NetworkError::ServerError { .. } => "Request failed.",
            NetworkError::InvalidResponse(_) => "Unexpected response.",
        }
    }
}

/// Durable storage errors (the SQLite key-value store).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage open failed: {0}")]
    OpenFailed(String),

    #[error("Storage query failed: {0}")]
    QueryFailed(String),

    #[error("Stored data is corrupt: {0}")]
    Corruption(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl StorageError {
    pub fn user_message(&self) -> &'static str {
        match self {
            StorageError::OpenFailed(_) => "Unable to access saved weather.",
            StorageError::QueryFailed(_) => "Saving weather failed.",
            StorageError::Corruption(_) => "Saved weather was corrupt.",
            StorageError::Serialization(_) => "Saving weather failed.",
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),

    #[error("Configuration file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::NotFound(_) => "Settings not found. Using defaults.",
            ConfigError::Invalid(_) => "Invalid settings.",
            ConfigError::ParseError(_) => "Settings file is malformed.",
            ConfigError::Io(_) => "Unable to read or write settings.",
        }
    }
}

/// Weather acquisition errors.
#[derive(Debug, Error)]
pub enum WeatherError {
    /// No usable provider credential is configured. Fatal at startup.
    #[error("No weather API keys configured")]
    NoCredentials,

    #[error("Provider rejected the API key")]
    BadCredential,

    #[error("Location unavailable")]
    LocationUnavailable,

    #[error("Weather provider error: {0}")]
    Provider(String),

    #[error("Geocoding failed: {0}")]
    Geocode(String),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The scheduler task is no longer running.
    #[error("Weather service stopped")]
    ServiceStopped,
}

impl WeatherError {
    pub fn user_message(&self) -> &'static str {
        match self {
            WeatherError::NoCredentials => "Weather API key missing. Check settings.",
            WeatherError::BadCredential => "Weather API key is invalid.",
            WeatherError::LocationUnavailable => "Location unavailable.",
            WeatherError::Provider(_) => "Weather unavailable.",
            WeatherError::Geocode(_) => "Location not found. Using GPS.",
            WeatherError::Network(e) => e.user_message(),
            WeatherError::Storage(e) => e.user_message(),
            WeatherError::ServiceStopped => "Weather service stopped.",
        }
    }
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            NetworkError::Timeout
        } else if self.is_connect() {
            NetworkError::ConnectionFailed(self.to_string())
        } else if let Some(status) = self.status() {
            NetworkError::ServerError {
                status: status.as_u16(),
                message: self.to_string(),
            }
        } else if self.is_decode() {
            NetworkError::InvalidResponse(self.to_string())
        } else {
            NetworkError::ConnectionFailed(self.to_string())
        }
    }
}

/// Extension trait for converting rusqlite errors to our error types.
pub trait RusqliteErrorExt {
    fn into_storage_error(self) -> StorageError;
}

impl RusqliteErrorExt for rusqlite::Error {
    fn into_storage_error(self) -> StorageError {
        match &self {
            rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains("corrupt") => {
                StorageError::Corruption(self.to_string())
            }
            rusqlite::Error::SqliteFailure(code, _)
                if code.code == rusqlite::ErrorCode::CannotOpen =>
            {
                StorageError::OpenFailed(self.to_string())
            }
            _ => StorageError::QueryFailed(self.to_string()),
        }
    }
}
