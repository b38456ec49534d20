//! Seams between the scheduler and the outside world.
//!
//! The scheduler only issues requests through these traits. Results come back
//! as calls on the scheduler (`on_fetch_complete`, `on_geocode`,
//! `on_timer_fired`) from the same event loop that owns it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tempest_core::WeatherError;

use crate::credentials::Credential;
use crate::types::{Coordinates, LocationTarget, WeatherSnapshot};

/// Everything the provider needs for one fetch
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub credential: Credential,
    pub location: LocationTarget,
}

/// Weather provider client.
///
/// `fetch` must not block; the result is delivered later through
/// `Scheduler::on_fetch_complete`. There is no cancellation.
pub trait WeatherProvider: Send {
    fn fetch(&mut self, request: FetchRequest);
}

/// Result of a geocoding lookup, possibly delivered more than once per
/// request (`Pending` first).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeocodeResult {
    Pending,
    Available(Coordinates),
    Unavailable,
}

/// Forward geocoder for named locations.
pub trait Geocoder: Send {
    fn request(&mut self, location_name: &str);

    /// Abandon the outstanding lookup; its result must not be delivered.
    fn cancel(&mut self);

    /// Coordinates of the last successful lookup, if any
    fn peek(&self) -> Option<Coordinates>;
}

/// Single-shot delay that ends in `Scheduler::on_timer_fired`.
///
/// Arming replaces any earlier arm.
pub trait Timer: Send {
    fn arm(&mut self, delay: Duration);
    fn cancel(&mut self);
}

pub trait Clock: Send {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Async weather client used by the runtime driver.
///
/// Errors map onto failure statuses: `BadCredential` and
/// `LocationUnavailable` keep their meaning, everything else is `Failed`.
#[async_trait]
pub trait FetchClient: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<WeatherSnapshot, WeatherError>;
}

/// Async forward geocoding used by the runtime driver.
///
/// `Ok(None)` means the name matched nothing.
#[async_trait]
pub trait GeocodeClient: Send + Sync {
    async fn lookup(&self, location_name: &str) -> Result<Option<Coordinates>, WeatherError>;
}
