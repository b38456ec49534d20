//! Tracks where weather is fetched for and whether a geocoding lookup is
//! still outstanding.

use crate::provider::{GeocodeResult, Geocoder};
use crate::types::LocationTarget;

/// How the fetch location is chosen
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LocationMode {
    #[default]
    Gps,
    /// Geocode this place name
    Named(String),
}

impl LocationMode {
    /// Named mode needs GPS off and a non-blank name; anything else is GPS.
    pub fn from_settings(use_gps: bool, location_name: &str) -> Self {
        let name = location_name.trim();
        if use_gps || name.is_empty() {
            Self::Gps
        } else {
            Self::Named(name.to_string())
        }
    }
}

#[derive(Debug)]
pub struct LocationBridge {
    mode: LocationMode,
    target: LocationTarget,
    resolving: bool,
    fetch_owed: bool,
}

impl LocationBridge {
    /// Restore the target at startup.
    ///
    /// Named mode reuses the geocoder's cached coordinates; without them a
    /// lookup is started and fetching waits for its result.
    pub fn new(mode: LocationMode, geocoder: &mut dyn Geocoder) -> Self {
        let mut bridge = Self {
            mode,
            target: LocationTarget::Gps,
            resolving: false,
            fetch_owed: false,
        };

        if let LocationMode::Named(name) = &bridge.mode {
            match geocoder.peek() {
                Some(coordinates) => bridge.target = LocationTarget::Fixed(coordinates),
                None => {
                    tracing::info!(location = %name, "No cached coordinates, geocoding");
                    geocoder.request(name);
                    bridge.resolving = true;
                }
            }
        }
        bridge
    }

    pub fn mode(&self) -> &LocationMode {
        &self.mode
    }

    pub fn target(&self) -> LocationTarget {
        self.target
    }

    /// True while a lookup is outstanding; fetching must wait.
    pub fn is_resolving(&self) -> bool {
        self.resolving
    }

    /// Remember that a fetch was skipped because resolution is pending.
    pub fn defer_fetch(&mut self) {
        self.fetch_owed = true;
    }

    /// Switch mode. Returns true if a fetch should happen right away (GPS);
    /// for named mode a lookup is started and the fetch is owed until it lands.
    pub fn change_mode(&mut self, mode: LocationMode, geocoder: &mut dyn Geocoder) -> bool {
        self.mode = mode;
        match &self.mode {
            LocationMode::Gps => {
                tracing::info!("Location mode changed to GPS");
                if self.resolving {
                    geocoder.cancel();
                }
                self.target = LocationTarget::Gps;
                self.resolving = false;
                self.fetch_owed = false;
                true
            }
            LocationMode::Named(name) => {
                tracing::info!(location = %name, "Location changed, geocoding");
                geocoder.request(name);
                self.resolving = true;
                self.fetch_owed = true;
                false
            }
        }
    }

    /// Apply a geocoding result. Returns true if a deferred fetch is now due.
    ///
    /// Results are only taken while a lookup is outstanding in named mode.
    pub fn on_geocode(&mut self, result: GeocodeResult) -> bool {
        let target = match result {
            GeocodeResult::Pending => return false,
            GeocodeResult::Available(coordinates) => LocationTarget::Fixed(coordinates),
            GeocodeResult::Unavailable => LocationTarget::Gps,
        };
        if !self.resolving || self.mode == LocationMode::Gps {
            tracing::debug!(?result, "Ignoring geocode result with no lookup outstanding");
            return false;
        }

        match target {
            LocationTarget::Fixed(coordinates) => {
                tracing::debug!(?coordinates, "Geocoding resolved");
            }
            LocationTarget::Gps => {
                tracing::warn!("Geocoding failed, falling back to GPS location");
            }
        }
        self.target = target;
        self.resolving = false;
        std::mem::take(&mut self.fetch_owed)
    }
}
