use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Instant,
};

use script::ScriptGenerator;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::{
    config::ServerConfig,
    store::{PersistError, Store, encode_snapshot, load_snapshot_from_disk, write_bytes_to_disk},
    weather::{WeatherClient, WeatherError},
};

#[derive(Clone)]
pub struct AppState {
    pub(crate) inner: Arc<RwLock<Store>>,
    pub(crate) metrics: Arc<ServerMetrics>,
    pub(crate) generator: ScriptGenerator,
    pub(crate) weather: WeatherClient,
    sequence: Arc<AtomicU64>,
    persist_lock: Arc<Mutex<()>>,
    config: Arc<ServerConfig>,
}

pub(crate) struct ServerMetrics {
    pub started_at: Instant,
    pub scripts_served_total: AtomicU64,
    pub script_errors_total: AtomicU64,
    pub weather_requests_total: AtomicU64,
    pub weather_upstream_errors_total: AtomicU64,
    pub previews_total: AtomicU64,
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self {
            started_at: Instant::now(),
            scripts_served_total: AtomicU64::new(0),
            script_errors_total: AtomicU64::new(0),
            weather_requests_total: AtomicU64::new(0),
            weather_upstream_errors_total: AtomicU64::new(0),
            previews_total: AtomicU64::new(0),
        }
    }
}

impl AppState {
    /// Restores the snapshot at `config.state_path`, if any.
    pub fn new(config: ServerConfig) -> Result<Self, WeatherError> {
        let weather = WeatherClient::new(&config.weather)?;
        let (store, sequence) = load_snapshot_from_disk(config.state_path.as_deref());
        Ok(Self {
            inner: Arc::new(RwLock::new(store)),
            metrics: Arc::new(ServerMetrics::default()),
            generator: ScriptGenerator::new(config.generator_options()),
            weather,
            sequence: Arc::new(AtomicU64::new(sequence)),
            persist_lock: Arc::new(Mutex::new(())),
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub(crate) fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }

    pub(crate) async fn persist_snapshot(&self) -> Result<(), PersistError> {
        let Some(path) = self.config.state_path.as_deref() else {
            return Ok(());
        };
        let _save_guard = self.persist_lock.lock().await;
        let bytes = {
            let guard = self.inner.read().await;
            encode_snapshot(&guard, self.sequence.load(Ordering::Relaxed))?
        };
        write_bytes_to_disk(path, &bytes)
    }
}
