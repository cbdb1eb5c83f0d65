//! Modbus/TCP access to the APSystems ECU's power-limit registers.

pub mod error;
pub mod port;
pub mod transport;

pub use error::{ModbusError, ModbusStatus};
pub use port::{ModbusPort, ReadOutcome};
pub use transport::{RegisterTransport, TcpTransport};

#[cfg(any(test, feature = "test-util"))]
pub use transport::FakeTransport;
