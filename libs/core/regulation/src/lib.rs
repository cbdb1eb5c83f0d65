//! Data model, control engine and in-memory state for the solar power
//! regulator. Deliberately free of I/O and of any async runtime: everything
//! here is a pure function over plain data so it can be exercised without a
//! Modbus device, an MQTT broker or a clock.

pub mod constants;
pub mod engine;
pub mod error;
pub mod model;
pub mod state;
pub mod threshold;
pub mod window;

pub use engine::{decide, EngineConfig, FastDropConfig, FastRiseConfig};
pub use error::CoreError;
pub use model::{Decision, Measurement, RegulatorEvent, ReturnCode};
pub use state::RegulationState;
pub use threshold::{ThresholdRow, ThresholdTable};
pub use window::{RegulationWindow, RegulationWindows};
