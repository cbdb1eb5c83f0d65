use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("mqtt client error: {0}")]
    Client(#[from] rumqttc::ClientError),
}
