use solarreg_core::{EngineConfig, RegulationState, RegulationWindows};
use solarreg_modbus::{ModbusPort, RegisterTransport};
use solarreg_telemetry::TelemetryPublisher;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// The port used by the daemon itself; boxed so integration tests can swap
/// in an in-memory fake without the app's types changing shape.
pub type DaemonModbusPort = ModbusPort<Box<dyn RegisterTransport>>;

/// Everything the HTTP handler, the periodic task and the watchdog share.
/// Cloning an `AppState` only clones `Arc`s; the guarded data stays single-owned.
#[derive(Clone)]
pub struct AppState {
    pub state: Arc<Mutex<RegulationState>>,
    pub modbus: Arc<Mutex<DaemonModbusPort>>,
    pub telemetry: Arc<TelemetryPublisher>,
    pub engine_cfg: Arc<EngineConfig>,
    pub windows: Arc<RegulationWindows>,
    pub last_measurement_at: Arc<Mutex<Option<Instant>>>,
    pub watchdog_timeout: Duration,
}

impl AppState {
    pub async fn note_measurement_received(&self) {
        *self.last_measurement_at.lock().await = Some(Instant::now());
    }

    pub async fn silence_duration(&self) -> Option<Duration> {
        self.last_measurement_at.lock().await.map(|at| at.elapsed())
    }
}
