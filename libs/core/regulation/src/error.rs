use thiserror::Error;

/// Failures that can arise while validating an inbound measurement or
/// constructing configuration, independent of any I/O.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` must be an integer, got `{value}`")]
    NotAnInteger { field: &'static str, value: String },

    #[error("invalid regulation window `{0}`: expected HH:MM-HH:MM")]
    InvalidWindow(String),

    #[error("invalid time `{0}`: expected HH:MM")]
    InvalidTime(String),
}
