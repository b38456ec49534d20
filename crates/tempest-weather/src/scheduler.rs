//! The weather fetch state machine.
//!
//! The scheduler is synchronous and single-owner: every signal (subscriber
//! churn, connectivity, readiness, settings, geocoding, timer expiry, fetch
//! completion) is a method call from one event loop. It runs while
//! `ready && connected && subscribers > 0` and stays idle otherwise.

use chrono::Duration as ChronoDuration;
use std::time::Duration;

use tempest_core::StorageError;

use crate::credentials::CredentialPool;
use crate::location::{LocationBridge, LocationMode};
use crate::provider::{Clock, FetchRequest, GeocodeResult, Geocoder, Timer, WeatherProvider};
use crate::settings::{SettingsGlue, WeatherSettings};
use crate::store::{PersistedWeather, WeatherStore};
use crate::subscribers::{SubscriberHandle, SubscriberRegistry, WeatherHandler};
use crate::types::{Coordinates, FetchStatus, WeatherSnapshot};

/// Where the scheduler is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No timer armed and no request in flight
    #[default]
    Idle,
    /// Timer armed, counting down to the next fetch
    Scheduled,
    /// Request issued, waiting for the provider
    Fetching,
}

/// External collaborators the scheduler drives
pub struct Collaborators {
    pub provider: Box<dyn WeatherProvider>,
    pub geocoder: Box<dyn Geocoder>,
    pub timer: Box<dyn Timer>,
    pub clock: Box<dyn Clock>,
}

pub struct Scheduler {
    registry: SubscriberRegistry,
    credentials: CredentialPool,
    location: LocationBridge,
    settings: SettingsGlue,

    provider: Box<dyn WeatherProvider>,
    geocoder: Box<dyn Geocoder>,
    timer: Box<dyn Timer>,
    clock: Box<dyn Clock>,

    snapshot: WeatherSnapshot,
    status: FetchStatus,

    connected: bool,
    ready: bool,
    timer_armed: bool,
    in_flight: bool,
    refetch_owed: bool,
}

impl Scheduler {
    /// Build the scheduler from restored state.
    ///
    /// `connected` is the connectivity at startup. Nothing is fetched until
    /// the host signals readiness. Restored coordinates are not read here;
    /// the geocoder in `parts` is expected to already hold them.
    pub fn new(
        settings: WeatherSettings,
        credentials: CredentialPool,
        mut parts: Collaborators,
        persisted: PersistedWeather,
        connected: bool,
    ) -> Self {
        let location = LocationBridge::new(settings.location.clone(), parts.geocoder.as_mut());

        tracing::info!(
            interval_secs = settings.interval.as_secs(),
            keys = credentials.len(),
            connected,
            "Weather scheduler created"
        );

        Self {
            registry: SubscriberRegistry::new(),
            credentials,
            location,
            settings: SettingsGlue::new(settings),
            provider: parts.provider,
            geocoder: parts.geocoder,
            timer: parts.timer,
            clock: parts.clock,
            snapshot: persisted.snapshot,
            status: persisted.status,
            connected,
            ready: false,
            timer_armed: false,
            in_flight: false,
            refetch_owed: false,
        }
    }

    // --- queries ---

    /// Derived from the timer and in-flight flags.
    pub fn phase(&self) -> Phase {
        if self.timer_armed {
            Phase::Scheduled
        } else if self.in_flight {
            Phase::Fetching
        } else {
            Phase::Idle
        }
    }

    /// Outcome of the last fetch, `Pending` while one is in flight.
    pub fn status(&self) -> FetchStatus {
        self.status
    }

    /// Last good sample; kept across failed fetches.
    pub fn snapshot(&self) -> &WeatherSnapshot {
        &self.snapshot
    }

    /// Effective refresh interval.
    pub fn interval(&self) -> Duration {
        self.settings.current().interval
    }

    pub fn location_mode(&self) -> &LocationMode {
        self.location.mode()
    }

    /// Coordinates of the last successful geocode lookup.
    pub fn coordinates(&self) -> Option<Coordinates> {
        self.geocoder.peek()
    }

    pub fn is_timer_armed(&self) -> bool {
        self.timer_armed
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    /// The conditions under which the scheduler keeps a timer running.
    pub fn should_run(&self) -> bool {
        self.ready && self.connected && !self.registry.is_empty()
    }

    /// State to write to the store so the next start can pick up from here.
    pub fn persisted(&self) -> PersistedWeather {
        PersistedWeather {
            snapshot: self.snapshot.clone(),
            status: self.status,
            coordinates: self.coordinates(),
        }
    }

    // --- external signals ---

    pub fn subscribe(&mut self, handler: WeatherHandler) -> SubscriberHandle {
        let was_empty = self.registry.is_empty();
        let handle = self.registry.subscribe(handler);
        if was_empty {
            self.fetch_or_schedule();
        }
        handle
    }

    /// Returns false if `handle` was not subscribed.
    pub fn unsubscribe(&mut self, handle: SubscriberHandle) -> bool {
        let removed = self.registry.unsubscribe(handle);
        if removed && self.registry.is_empty() {
            tracing::debug!("Last weather subscriber gone");
            self.cancel_timer();
        }
        removed
    }

    pub fn set_connected(&mut self, connected: bool) {
        if connected == self.connected {
            return;
        }
        self.connected = connected;
        if connected {
            tracing::info!("Connection restored");
            self.fetch_or_schedule();
        } else {
            tracing::info!("Connection lost, pausing weather updates");
            self.cancel_timer();
        }
    }

    /// The host can now talk to us. Only the first call has an effect.
    pub fn mark_ready(&mut self) {
        if self.ready {
            return;
        }
        tracing::info!("Host ready");
        self.ready = true;
        self.fetch_or_schedule();
    }

    /// Apply a configuration change.
    ///
    /// A location change wins over an interval change in the same signal:
    /// GPS fetches right away, a named place waits for its geocode result.
    /// Only an interval change on its own goes through the age check.
    pub fn on_settings_changed(&mut self, settings: WeatherSettings) {
        let delta = self.settings.diff(settings);

        if let Some(interval) = delta.interval {
            tracing::info!(interval_secs = interval.as_secs(), "Weather interval changed");
        }

        if let Some(mode) = delta.location {
            self.cancel_timer();
            if self.location.change_mode(mode, self.geocoder.as_mut()) {
                self.fetch_now();
            }
        } else if delta.interval.is_some() {
            self.cancel_timer();
            self.fetch_or_schedule();
        }
    }

    pub fn on_geocode(&mut self, result: GeocodeResult) {
        if self.location.on_geocode(result) {
            self.cancel_timer();
            self.fetch_now();
        }
    }

    pub fn on_timer_fired(&mut self) {
        if !self.timer_armed {
            tracing::debug!("Ignoring expiry of a cancelled timer");
            return;
        }
        self.timer_armed = false;
        if self.should_run() {
            self.start_fetch();
        }
    }

    /// Provider callback. `None` means the provider has nothing newer than
    /// the last snapshot.
    ///
    /// The result is recorded and delivered even if conditions changed while
    /// the request was in flight; only the re-arm is gated on them.
    pub fn on_fetch_complete(&mut self, snapshot: Option<WeatherSnapshot>, status: FetchStatus) {
        if !self.in_flight {
            tracing::warn!(?status, "Fetch completion without a request in flight");
        }
        self.in_flight = false;

        if let Some(snapshot) = snapshot {
            self.snapshot = snapshot;
        }
        self.status = status;
        if status.is_failure() {
            tracing::warn!(?status, "Weather fetch failed");
        } else {
            tracing::info!(?status, captured_at = %self.snapshot.timestamp, "Weather fetched");
        }

        self.registry.notify_all(&self.snapshot, self.status);

        if !self.should_run() {
            self.refetch_owed = false;
            return;
        }
        if std::mem::take(&mut self.refetch_owed) {
            self.start_fetch();
        } else {
            self.arm_timer(self.interval());
        }
    }

    /// Stop the timer and write the last result to `store`.
    pub fn shutdown(&mut self, store: &WeatherStore) -> Result<(), StorageError> {
        tracing::info!("Weather scheduler shutting down");
        self.cancel_timer();
        store.save(&self.persisted())
    }

    // --- internals ---

    /// Fetch now if the snapshot is at least one interval old, otherwise arm
    /// the timer for the remainder.
    fn fetch_or_schedule(&mut self) {
        if !self.should_run() {
            return;
        }
        if self.in_flight {
            tracing::debug!("Fetch already in flight; its completion re-arms the timer");
            return;
        }

        let remaining = self.remaining_until_due();
        if remaining.is_zero() {
            self.start_fetch();
        } else {
            self.arm_timer(remaining);
        }
    }

    /// Time left until the snapshot is one interval old. A timestamp in the
    /// future counts as due.
    fn remaining_until_due(&self) -> Duration {
        let now = self.clock.now();
        let age = now.signed_duration_since(self.snapshot.timestamp);
        if age < ChronoDuration::zero() {
            tracing::warn!(captured_at = %self.snapshot.timestamp, "Snapshot is from the future");
            return Duration::ZERO;
        }
        let age = age.to_std().unwrap_or(Duration::MAX);
        self.interval().saturating_sub(age)
    }

    /// Location changed: fetch without looking at the snapshot age.
    fn fetch_now(&mut self) {
        if !self.should_run() {
            return;
        }
        if self.in_flight {
            self.refetch_owed = true;
            return;
        }
        self.start_fetch();
    }

    fn start_fetch(&mut self) {
        if self.in_flight {
            self.refetch_owed = true;
            return;
        }
        if self.location.is_resolving() {
            tracing::debug!("Location still resolving, fetch deferred");
            self.location.defer_fetch();
            return;
        }

        self.cancel_timer();
        let request = FetchRequest {
            credential: self.credentials.next(),
            location: self.location.target(),
        };
        tracing::info!(location = ?request.location, "Fetching weather");

        self.status = FetchStatus::Pending;
        self.in_flight = true;
        self.provider.fetch(request);
    }

    fn arm_timer(&mut self, delay: Duration) {
        self.cancel_timer();
        tracing::debug!(delay_secs = delay.as_secs(), "Arming weather timer");
        self.timer.arm(delay);
        self.timer_armed = true;
    }

    fn cancel_timer(&mut self) {
        if self.timer_armed {
            tracing::debug!("Cancelling weather timer");
            self.timer.cancel();
            self.timer_armed = false;
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("phase", &self.phase())
            .field("status", &self.status)
            .field("connected", &self.connected)
            .field("ready", &self.ready)
            .field("subscribers", &self.registry.len())
            .field("location", &self.location)
            .finish()
    }
}
