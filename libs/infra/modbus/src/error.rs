use thiserror::Error;

/// Coarse classification of a failed Modbus/TCP transaction, used for
/// logging and for deciding whether a reconnect is worth attempting.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ModbusStatus {
    #[error("could not establish a TCP connection to the ECU")]
    ConnectionError,
    #[error("the ECU returned a Modbus exception")]
    ExecutionError,
    #[error("the Modbus transaction timed out or the link was reset")]
    CommunicationError,
}

#[derive(Debug, Error)]
pub enum ModbusError {
    #[error("{0}")]
    Status(ModbusStatus),
    #[error("modbus I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("modbus exception: {0:?}")]
    Exception(tokio_modbus::ExceptionCode),
    #[error("connect to {0} timed out")]
    ConnectTimeout(std::net::SocketAddr),
}

impl ModbusError {
    pub fn status(&self) -> ModbusStatus {
        match self {
            ModbusError::Status(s) => *s,
            ModbusError::ConnectTimeout(_) => ModbusStatus::ConnectionError,
            ModbusError::Exception(_) => ModbusStatus::ExecutionError,
            ModbusError::Io(_) => ModbusStatus::CommunicationError,
        }
    }
}
