//! Weather acquisition for the Tempest watch face.
//!
//! Decides when to contact the weather provider, which API key to use, and
//! how to react to connectivity, subscribers, location and settings changes.
//! The last result is kept across restarts in a small SQLite store.

pub mod credentials;
pub mod geocode;
pub mod location;
pub mod provider;
pub mod scheduler;
pub mod service;
pub mod settings;
pub mod store;
pub mod subscribers;
pub mod types;

pub use credentials::{Credential, CredentialPool};
pub use geocode::NominatimGeocoder;
pub use location::LocationMode;
pub use provider::{FetchClient, FetchRequest, GeocodeClient, GeocodeResult};
pub use scheduler::{Phase, Scheduler};
pub use service::{ServiceClients, WeatherHandle, WeatherService, WeatherView};
pub use settings::WeatherSettings;
pub use store::{PersistedWeather, WeatherStore};
pub use subscribers::SubscriberHandle;
pub use types::*;
