use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Weather condition categories shown by the watch face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    ClearSky,
    FewClouds,
    ScatteredClouds,
    BrokenClouds,
    ShowerRain,
    Rain,
    Thunderstorm,
    Snow,
    Mist,
    #[default]
    Unknown,
}

impl WeatherCondition {
    pub fn description(&self) -> &'static str {
        match self {
            Self::ClearSky => "Clear",
            Self::FewClouds => "Few Clouds",
            Self::ScatteredClouds => "Scattered Clouds",
            Self::BrokenClouds => "Cloudy",
            Self::ShowerRain => "Showers",
            Self::Rain => "Rain",
            Self::Thunderstorm => "Thunderstorm",
            Self::Snow => "Snow",
            Self::Mist => "Mist",
            Self::Unknown => "Unknown",
        }
    }

    /// Icon name; day and night variants differ only for clear and few clouds
    pub fn icon_name(&self, is_day: bool) -> &'static str {
        match (self, is_day) {
            (Self::ClearSky, true) => "sun",
            (Self::ClearSky, false) => "moon",
            (Self::FewClouds, true) => "cloud_sun",
            (Self::FewClouds, false) => "cloud_moon",
            (Self::ScatteredClouds | Self::BrokenClouds, _) => "cloud",
            (Self::ShowerRain | Self::Rain, _) => "cloud_rain",
            (Self::Thunderstorm, _) => "cloud_lightning",
            (Self::Snow, _) => "cloud_snow",
            (Self::Mist, _) => "cloud_fog",
            (Self::Unknown, _) => "question",
        }
    }
}

/// A temperature in both unit systems the face can display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Temperature {
    pub celsius: i16,
    pub fahrenheit: i16,
}

impl Temperature {
    pub fn from_celsius(celsius: f64) -> Self {
        Self {
            celsius: celsius.round() as i16,
            fahrenheit: (celsius * 9.0 / 5.0 + 32.0).round() as i16,
        }
    }
}

/// Geographic coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Where the provider should fetch weather for
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum LocationTarget {
    /// Let the provider locate the device
    #[default]
    Gps,
    Fixed(Coordinates),
}

/// The most recently retrieved weather sample.
///
/// `Default` is the zero-value snapshot: captured at the Unix epoch, so any
/// interval considers it stale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub temperature: Temperature,
    pub feels_like: Temperature,
    pub low: Temperature,
    pub high: Temperature,
    pub humidity: u8,
    pub condition: WeatherCondition,
    pub is_day: bool,
    pub sunrise: Option<DateTime<Utc>>,
    pub sunset: Option<DateTime<Utc>>,
    #[serde(default)]
    pub place_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Default for WeatherSnapshot {
    fn default() -> Self {
        Self {
            temperature: Temperature::default(),
            feels_like: Temperature::default(),
            low: Temperature::default(),
            high: Temperature::default(),
            humidity: 0,
            condition: WeatherCondition::default(),
            is_day: true,
            sunrise: None,
            sunset: None,
            place_name: None,
            description: None,
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

/// Outcome of the latest fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FetchStatus {
    #[default]
    NotYetFetched,
    Pending,
    Available,
    Failed,
    /// Provider rejected the credential
    BadCredential,
    /// Provider could not resolve the requested location
    LocationUnavailable,
}

impl FetchStatus {
    /// Failure statuses; all of them are treated alike by the scheduler.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Self::Failed | Self::BadCredential | Self::LocationUnavailable
        )
    }

    /// Stable integer code used in the durable store
    pub fn code(self) -> u8 {
        match self {
            Self::NotYetFetched => 0,
            Self::Pending => 1,
            Self::Available => 2,
            Self::Failed => 3,
            Self::BadCredential => 4,
            Self::LocationUnavailable => 5,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::NotYetFetched),
            1 => Some(Self::Pending),
            2 => Some(Self::Available),
            3 => Some(Self::Failed),
            4 => Some(Self::BadCredential),
            5 => Some(Self::LocationUnavailable),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_snapshot_is_epoch() {
        let snapshot = WeatherSnapshot::default();
        assert_eq!(snapshot.timestamp.timestamp(), 0);
        assert_eq!(snapshot.condition, WeatherCondition::Unknown);
    }

    #[test]
    fn test_temperature_conversion() {
        assert_eq!(
            Temperature::from_celsius(0.0),
            Temperature {
                celsius: 0,
                fahrenheit: 32
            }
        );
        assert_eq!(Temperature::from_celsius(21.6).fahrenheit, 71);
        assert_eq!(Temperature::from_celsius(-40.0).fahrenheit, -40);
    }

    #[test]
    fn test_failure_statuses() {
        assert!(FetchStatus::Failed.is_failure());
        assert!(FetchStatus::BadCredential.is_failure());
        assert!(FetchStatus::LocationUnavailable.is_failure());
        assert!(!FetchStatus::Available.is_failure());
        assert!(!FetchStatus::Pending.is_failure());
    }

    #[test]
    fn test_status_codes_are_stable() {
        assert_eq!(FetchStatus::NotYetFetched.code(), 0);
        assert_eq!(FetchStatus::Available.code(), 2);
        assert_eq!(FetchStatus::from_code(3), Some(FetchStatus::Failed));
        assert_eq!(FetchStatus::from_code(42), None);
    }

    #[test]
    fn test_icon_day_night() {
        assert_eq!(WeatherCondition::ClearSky.icon_name(true), "sun");
        assert_eq!(WeatherCondition::ClearSky.icon_name(false), "moon");
        assert_eq!(WeatherCondition::Rain.icon_name(false), "cloud_rain");
    }
}
