//! Turns "configuration changed" signals into the specific scheduler changes.

use std::time::Duration;

use tempest_core::WeatherConfig;

use crate::location::LocationMode;

/// The part of the configuration the scheduler reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherSettings {
    pub interval: Duration,
    pub location: LocationMode,
}

impl From<&WeatherConfig> for WeatherSettings {
    fn from(config: &WeatherConfig) -> Self {
        Self {
            interval: Duration::from_secs(u64::from(config.effective_refresh_minutes()) * 60),
            location: LocationMode::from_settings(config.use_gps, &config.location_name),
        }
    }
}

/// Fields that actually changed since the previous signal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsDelta {
    pub interval: Option<Duration>,
    pub location: Option<LocationMode>,
}

impl SettingsDelta {
    pub fn is_empty(&self) -> bool {
        self.interval.is_none() && self.location.is_none()
    }
}

/// Caches the last seen settings so unrelated edits cause no refetch.
#[derive(Debug, Clone)]
pub struct SettingsGlue {
    current: WeatherSettings,
}

impl SettingsGlue {
    pub fn new(initial: WeatherSettings) -> Self {
        Self { current: initial }
    }

    pub fn current(&self) -> &WeatherSettings {
        &self.current
    }

    pub fn diff(&mut self, incoming: WeatherSettings) -> SettingsDelta {
        let mut delta = SettingsDelta::default();

        if incoming.interval != self.current.interval {
            delta.interval = Some(incoming.interval);
        }
        if incoming.location != self.current.location {
            delta.location = Some(incoming.location.clone());
        }

        if delta.is_empty() {
            tracing::debug!("Settings changed, nothing weather-related");
        }
        self.current = incoming;
        delta
    }
}
