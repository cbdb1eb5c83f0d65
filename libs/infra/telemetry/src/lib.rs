//! MQTT telemetry: a run-sample stream and a discrete-event stream,
//! published best-effort and never on the control loop's critical path.

pub mod error;
pub mod publisher;

pub use error::TelemetryError;
pub use publisher::{TelemetryMode, TelemetryPublisher};
