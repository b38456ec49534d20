use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Lowest refresh interval the scheduler will honour, in minutes.
pub const MIN_REFRESH_MINUTES: u32 = 15;

/// Number of API key slots that are read from the config.
pub const MAX_API_KEYS: usize = 10;

const APP_DIR: &str = "tempest";
const CONFIG_FILE: &str = "config.toml";
const WEATHER_DB_FILE: &str = "weather.db";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// All errors joined into one line
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the config file and the weather store
    pub config_dir: PathBuf,

    /// Weather settings
    #[serde(default)]
    pub weather: WeatherConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Refresh interval in minutes (clamped to `MIN_REFRESH_MINUTES`)
    #[serde(default = "default_refresh_minutes")]
    pub refresh_minutes: u32,

    /// Let the provider locate the device instead of using `location_name`
    #[serde(default = "default_use_gps")]
    pub use_gps: bool,

    /// Place name to geocode when `use_gps` is off
    #[serde(default)]
    pub location_name: String,

    /// Provider API keys, rotated per fetch. Blank entries are skipped.
    #[serde(default)]
    pub api_keys: Vec<String>,
}

fn default_refresh_minutes() -> u32 {
    30
}

fn default_use_gps() -> bool {
    true
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            refresh_minutes: default_refresh_minutes(),
            use_gps: default_use_gps(),
            location_name: String::new(),
            api_keys: Vec::new(),
        }
    }
}

impl WeatherConfig {
    /// Refresh interval after applying the floor.
    pub fn effective_refresh_minutes(&self) -> u32 {
        self.refresh_minutes.max(MIN_REFRESH_MINUTES)
    }

    /// Key slots as the rotator sees them: at most `MAX_API_KEYS`, blanks as `None`.
    pub fn api_key_slots(&self) -> Vec<Option<String>> {
        self.api_keys
            .iter()
            .take(MAX_API_KEYS)
            .map(|k| {
                let k = k.trim();
                (!k.is_empty()).then(|| k.to_string())
            })
            .collect()
    }

    fn configured_key_count(&self) -> usize {
        self.api_key_slots().iter().flatten().count()
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);

        Self {
            config_dir,
            weather: WeatherConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, writing defaults there if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let mut config = Self::default();
            if let Some(parent) = path.parent() {
                config.config_dir = parent.to_path_buf();
            }
            config.save_to(path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path)?;

        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))
    }

    /// Load configuration and validate it
    ///
    /// Warnings are logged; errors fail the load.
    pub fn load_validated() -> Result<(Self, ValidationResult), ConfigError> {
        Self::load_validated_from(&Self::config_path()?)
    }

    pub fn load_validated_from(path: &Path) -> Result<(Self, ValidationResult), ConfigError> {
        let config = Self::load_from(path)?;
        let validation = config.ensure_valid()?;
        Ok((config, validation))
    }

    /// Validate, log warnings, and fail with `ConfigError::Invalid` on errors.
    pub fn ensure_valid(&self) -> Result<ValidationResult, ConfigError> {
        let validation = self.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()));
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok(validation)
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();
        let weather = &self.weather;

        if weather.configured_key_count() == 0 {
            result.add_error(
                "weather.api_keys",
                "At least one weather API key is required",
            );
        }

        if weather.api_keys.len() > MAX_API_KEYS {
            result.add_warning(
                "weather.api_keys",
                format!(
                    "Only the first {} API keys are used ({} configured)",
                    MAX_API_KEYS,
                    weather.api_keys.len()
                ),
            );
        }

        if weather.refresh_minutes < MIN_REFRESH_MINUTES {
            result.add_warning(
                "weather.refresh_minutes",
                format!(
                    "Refresh interval below {} minutes; using {}",
                    MIN_REFRESH_MINUTES, MIN_REFRESH_MINUTES
                ),
            );
        }

        if !weather.use_gps && weather.location_name.trim().is_empty() {
            result.add_warning(
                "weather.location_name",
                "GPS disabled but no location name set; falling back to GPS",
            );
        }

        result
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        std::fs::write(path, contents)?;

        Ok(())
    }

    /// Location of the durable weather store
    pub fn weather_db_path(&self) -> PathBuf {
        self.config_dir.join(WEATHER_DB_FILE)
    }

    fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ConfigError::NotFound("no user config directory".into()))?
            .join(APP_DIR);

        Ok(config_dir.join(CONFIG_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> Config {
        let mut config = Config::default();
        config.weather.api_keys = vec!["KEY_A".to_string()];
        config
    }

    #[test]
    fn test_default_config_requires_api_key() {
        let result = Config::default().validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "weather.api_keys"));
    }

    #[test]
    fn test_configured_default_is_valid() {
        let result = configured().validate();
        assert!(result.is_valid(), "unexpected errors: {:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_blank_keys_do_not_count() {
        let mut config = Config::default();
        config.weather.api_keys = vec!["".into(), "   ".into()];
        assert!(!config.validate().is_valid());
    }

    #[test]
    fn test_short_interval_is_warning_and_clamped() {
        let mut config = configured();
        config.weather.refresh_minutes = 5;
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "weather.refresh_minutes"));
        assert_eq!(config.weather.effective_refresh_minutes(), MIN_REFRESH_MINUTES);
    }

    #[test]
    fn test_named_mode_without_name_warns() {
        let mut config = configured();
        config.weather.use_gps = false;
        let result = config.validate();
        assert!(result.warnings.iter().any(|w| w.field == "weather.location_name"));
    }

    #[test]
    fn test_key_slots_cap_and_blanks() {
        let mut config = Config::default();
        config.weather.api_keys = (0..12).map(|i| format!("K{i}")).collect();
        config.weather.api_keys[1] = " ".into();
        let slots = config.weather.api_key_slots();
        assert_eq!(slots.len(), MAX_API_KEYS);
        assert_eq!(slots[0].as_deref(), Some("K0"));
        assert_eq!(slots[1], None);
        assert!(config
            .validate()
            .warnings
            .iter()
            .any(|w| w.field == "weather.api_keys"));
    }

    #[test]
    fn test_load_from_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.config_dir, dir.path());
        assert_eq!(config.weather, WeatherConfig::default());
        assert_eq!(config.weather_db_path(), dir.path().join("weather.db"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = configured();
        config.config_dir = dir.path().to_path_buf();
        config.weather.use_gps = false;
        config.weather.location_name = "Lisbon".into();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.weather, config.weather);
    }

    #[test]
    fn test_partial_weather_section_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "config_dir = \"/tmp/tempest\"\n[weather]\napi_keys = [\"A\", \"B\"]\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.weather.refresh_minutes, 30);
        assert!(config.weather.use_gps);
        assert_eq!(config.weather.api_keys.len(), 2);
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[weather\nrefresh_minutes = 30\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
        assert_eq!(err.user_message(), "Settings file is malformed.");
    }

    #[test]
    fn test_load_validated_rejects_missing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let err = Config::load_validated_from(&path).unwrap_err();
        match err {
            ConfigError::Invalid(summary) => assert!(summary.contains("weather.api_keys")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_load_validated_accepts_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = configured();
        config.weather.refresh_minutes = 1;
        config.save_to(&path).unwrap();

        let (loaded, validation) = Config::load_validated_from(&path).unwrap();
        assert_eq!(loaded.weather.effective_refresh_minutes(), MIN_REFRESH_MINUTES);
        assert_eq!(validation.warnings.len(), 1);
    }
}
