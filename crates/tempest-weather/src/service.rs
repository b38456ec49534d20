//! Runtime driver: hosts the scheduler in a single tokio task.
//!
//! Every signal becomes an event on one channel, so the scheduler is only ever
//! touched by its own task. Provider and geocoder calls run in spawned tasks
//! and report back through the same channel. Timers are a sleep raced
//! against a cancellation token; each arm gets a generation number so an
//! expiry from a superseded arm is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tempest_core::{AppError, Config, StorageError, WeatherConfig, WeatherError};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::credentials::CredentialPool;
use crate::provider::{
    FetchClient, FetchRequest, GeocodeClient, GeocodeResult, Geocoder, SystemClock, Timer,
    WeatherProvider,
};
use crate::scheduler::{Collaborators, Phase, Scheduler};
use crate::settings::WeatherSettings;
use crate::store::WeatherStore;
use crate::subscribers::{SubscriberHandle, WeatherHandler};
use crate::types::{Coordinates, FetchStatus, WeatherSnapshot};

type EventSender = mpsc::UnboundedSender<WeatherEvent>;
type WeakEventSender = mpsc::WeakUnboundedSender<WeatherEvent>;

enum WeatherEvent {
    Subscribe {
        handler: WeatherHandler,
        reply: oneshot::Sender<SubscriberHandle>,
    },
    Unsubscribe {
        handle: SubscriberHandle,
        reply: oneshot::Sender<bool>,
    },
    Connectivity(bool),
    Ready,
    SettingsChanged(WeatherSettings),
    Geocoded {
        seq: u64,
        result: GeocodeResult,
    },
    FetchCompleted {
        snapshot: Option<WeatherSnapshot>,
        status: FetchStatus,
    },
    TimerFired {
        generation: u64,
    },
    Inspect(oneshot::Sender<WeatherView>),
    Shutdown(oneshot::Sender<Result<(), StorageError>>),
}

/// Point-in-time view of the scheduler
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherView {
    pub phase: Phase,
    pub status: FetchStatus,
    pub snapshot: WeatherSnapshot,
    pub interval: Duration,
    /// Last geocoded place, if any
    pub coordinates: Option<Coordinates>,
}

/// Async clients the service fetches through
#[derive(Clone)]
pub struct ServiceClients {
    pub weather: Arc<dyn FetchClient>,
    pub geocoder: Arc<dyn GeocodeClient>,
}

/// Cloneable handle to a running weather service.
///
/// The service stops when `shutdown` is called or the last handle is
/// dropped; either way the last result is written to the store.
#[derive(Debug, Clone)]
pub struct WeatherHandle {
    tx: EventSender,
}

pub struct WeatherService;

impl WeatherService {
    /// Start from the application config: validate it, open the store next
    /// to the config file and spawn the service.
    pub fn launch(
        config: &Config,
        clients: ServiceClients,
        connected: bool,
    ) -> Result<(WeatherHandle, JoinHandle<()>), AppError> {
        config.ensure_valid()?;
        let store = WeatherStore::open(config.weather_db_path())?;
        Ok(Self::start(&config.weather, clients, store, connected)?)
    }

    /// Build the scheduler from `config` and the stored state, and spawn it.
    ///
    /// Must be called from within a tokio runtime. Fails when no API key is
    /// configured or the store cannot be read.
    pub fn start(
        config: &WeatherConfig,
        clients: ServiceClients,
        store: WeatherStore,
        connected: bool,
    ) -> Result<(WeatherHandle, JoinHandle<()>), WeatherError> {
        let credentials = CredentialPool::new(config.api_key_slots())?;
        let persisted = store.load()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let weak = tx.downgrade();

        let timer_generation = Arc::new(AtomicU64::new(0));
        let geocode_seq = Arc::new(AtomicU64::new(0));

        let parts = Collaborators {
            provider: Box::new(ClientProvider {
                client: clients.weather,
                tx: weak.clone(),
            }),
            geocoder: Box::new(ClientGeocoder {
                client: clients.geocoder,
                tx: weak.clone(),
                seq: geocode_seq.clone(),
                last: Arc::new(Mutex::new(persisted.coordinates)),
            }),
            timer: Box::new(TokioTimer {
                tx: weak,
                generation: timer_generation.clone(),
                token: None,
            }),
            clock: Box::new(SystemClock),
        };

        let scheduler = Scheduler::new(
            WeatherSettings::from(config),
            credentials,
            parts,
            persisted,
            connected,
        );

        let task = tokio::spawn(run(scheduler, rx, store, timer_generation, geocode_seq));
        tracing::info!("Weather service started");
        Ok((WeatherHandle { tx }, task))
    }
}

async fn run(
    mut scheduler: Scheduler,
    mut rx: mpsc::UnboundedReceiver<WeatherEvent>,
    store: WeatherStore,
    timer_generation: Arc<AtomicU64>,
    geocode_seq: Arc<AtomicU64>,
) {
    while let Some(event) = rx.recv().await {
        match event {
            WeatherEvent::Subscribe { handler, reply } => {
                let handle = scheduler.subscribe(handler);
                let _ = reply.send(handle);
            }
            WeatherEvent::Unsubscribe { handle, reply } => {
                let _ = reply.send(scheduler.unsubscribe(handle));
            }
            WeatherEvent::Connectivity(connected) => scheduler.set_connected(connected),
            WeatherEvent::Ready => scheduler.mark_ready(),
            WeatherEvent::SettingsChanged(settings) => scheduler.on_settings_changed(settings),
            WeatherEvent::Geocoded { seq, result } => {
                if seq == geocode_seq.load(Ordering::SeqCst) {
                    scheduler.on_geocode(result);
                } else {
                    tracing::debug!(seq, "Dropping result of a superseded geocode lookup");
                }
            }
            WeatherEvent::FetchCompleted { snapshot, status } => {
                scheduler.on_fetch_complete(snapshot, status);
            }
            WeatherEvent::TimerFired { generation } => {
                if generation == timer_generation.load(Ordering::SeqCst) {
                    scheduler.on_timer_fired();
                } else {
                    tracing::debug!(generation, "Dropping expiry of a superseded timer");
                }
            }
            WeatherEvent::Inspect(reply) => {
                let _ = reply.send(WeatherView {
                    phase: scheduler.phase(),
                    status: scheduler.status(),
                    snapshot: scheduler.snapshot().clone(),
                    interval: scheduler.interval(),
                    coordinates: scheduler.coordinates(),
                });
            }
            WeatherEvent::Shutdown(reply) => {
                let _ = reply.send(scheduler.shutdown(&store));
                tracing::info!("Weather service stopped");
                return;
            }
        }
    }

    // Every handle was dropped without an explicit shutdown.
    if let Err(e) = scheduler.shutdown(&store) {
        tracing::error!("Failed to save weather state: {}", e);
    }
    tracing::info!("Weather service stopped");
}

impl WeatherHandle {
    fn send(&self, event: WeatherEvent) -> Result<(), WeatherError> {
        self.tx
            .send(event)
            .map_err(|_| WeatherError::ServiceStopped)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> WeatherEvent,
    ) -> Result<T, WeatherError> {
        let (reply, rx) = oneshot::channel();
        self.send(build(reply))?;
        rx.await.map_err(|_| WeatherError::ServiceStopped)
    }

    /// Register a consumer; it is called on every completed fetch.
    pub async fn subscribe<F>(&self, handler: F) -> Result<SubscriberHandle, WeatherError>
    where
        F: Fn(&WeatherSnapshot, FetchStatus) + Send + 'static,
    {
        let handler: WeatherHandler = Box::new(handler);
        self.request(|reply| WeatherEvent::Subscribe { handler, reply })
            .await
    }

    /// Returns false if `handle` was not subscribed.
    pub async fn unsubscribe(&self, handle: SubscriberHandle) -> Result<bool, WeatherError> {
        self.request(|reply| WeatherEvent::Unsubscribe { handle, reply })
            .await
    }

    pub fn set_connected(&self, connected: bool) -> Result<(), WeatherError> {
        self.send(WeatherEvent::Connectivity(connected))
    }

    pub fn mark_ready(&self) -> Result<(), WeatherError> {
        self.send(WeatherEvent::Ready)
    }

    /// Configuration was edited; only weather-relevant changes have an effect.
    pub fn settings_changed(&self, config: &WeatherConfig) -> Result<(), WeatherError> {
        self.send(WeatherEvent::SettingsChanged(WeatherSettings::from(config)))
    }

    pub async fn view(&self) -> Result<WeatherView, WeatherError> {
        self.request(WeatherEvent::Inspect).await
    }

    pub async fn status(&self) -> Result<FetchStatus, WeatherError> {
        Ok(self.view().await?.status)
    }

    /// Stop the scheduler and persist the last result.
    pub async fn shutdown(self) -> Result<(), WeatherError> {
        self.request(WeatherEvent::Shutdown).await??;
        Ok(())
    }
}

fn deliver(tx: &WeakEventSender, event: WeatherEvent) {
    match tx.upgrade() {
        Some(tx) => {
            let _ = tx.send(event);
        }
        None => tracing::debug!("Weather service gone, dropping event"),
    }
}

fn status_for_error(error: &WeatherError) -> FetchStatus {
    match error {
        WeatherError::BadCredential => FetchStatus::BadCredential,
        WeatherError::LocationUnavailable => FetchStatus::LocationUnavailable,
        _ => FetchStatus::Failed,
    }
}

struct ClientProvider {
    client: Arc<dyn FetchClient>,
    tx: WeakEventSender,
}

impl WeatherProvider for ClientProvider {
    fn fetch(&mut self, request: FetchRequest) {
        let client = self.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let event = match client.fetch(&request).await {
                Ok(snapshot) => WeatherEvent::FetchCompleted {
                    snapshot: Some(snapshot),
                    status: FetchStatus::Available,
                },
                Err(e) => {
                    tracing::warn!("Weather request failed: {}", e);
                    WeatherEvent::FetchCompleted {
                        snapshot: None,
                        status: status_for_error(&e),
                    }
                }
            };
            deliver(&tx, event);
        });
    }
}

struct ClientGeocoder {
    client: Arc<dyn GeocodeClient>,
    tx: WeakEventSender,
    seq: Arc<AtomicU64>,
    last: Arc<Mutex<Option<Coordinates>>>,
}

impl Geocoder for ClientGeocoder {
    fn request(&mut self, location_name: &str) {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        deliver(
            &self.tx,
            WeatherEvent::Geocoded {
                seq,
                result: GeocodeResult::Pending,
            },
        );

        let client = self.client.clone();
        let tx = self.tx.clone();
        let current = self.seq.clone();
        let last = self.last.clone();
        let name = location_name.to_string();
        tokio::spawn(async move {
            let result = match client.lookup(&name).await {
                Ok(Some(coordinates)) => {
                    if current.load(Ordering::SeqCst) == seq {
                        *last.lock() = Some(coordinates);
                    }
                    GeocodeResult::Available(coordinates)
                }
                Ok(None) => GeocodeResult::Unavailable,
                Err(e) => {
                    tracing::warn!("Geocoding '{}' failed: {}", name, e);
                    GeocodeResult::Unavailable
                }
            };
            deliver(&tx, WeatherEvent::Geocoded { seq, result });
        });
    }

    fn cancel(&mut self) {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(seq, "Geocode lookup abandoned");
    }

    fn peek(&self) -> Option<Coordinates> {
        *self.last.lock()
    }
}

struct TokioTimer {
    tx: WeakEventSender,
    generation: Arc<AtomicU64>,
    token: Option<CancellationToken>,
}

impl Timer for TokioTimer {
    fn arm(&mut self, delay: Duration) {
        self.cancel();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let tx = self.tx.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    deliver(&tx, WeatherEvent::TimerFired { generation });
                }
            }
        });
        self.token = Some(token);
    }

    fn cancel(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_statuses() {
        assert_eq!(
            status_for_error(&WeatherError::BadCredential),
            FetchStatus::BadCredential
        );
        assert_eq!(
            status_for_error(&WeatherError::LocationUnavailable),
            FetchStatus::LocationUnavailable
        );
        assert_eq!(
            status_for_error(&WeatherError::Provider("boom".into())),
            FetchStatus::Failed
        );
    }
}
