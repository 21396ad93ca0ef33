use thiserror::Error;

/// Failure talking to the telemetry server.
#[derive(Debug, Error)]
pub(crate) enum TransportError {
    #[error("API error: {status} {status_text}")]
    Status { status: u16, status_text: String },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("invalid endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
    #[error("invalid client id: {0:?}")]
    InvalidClientId(String),
}

#[derive(Debug, Error)]
pub(crate) enum TelemetryError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("client {0} not found")]
    NotFound(String),
    #[error("invalid config content: {0}")]
    Validation(String),
    #[error("operation not allowed while session is {0}")]
    InvalidState(&'static str),
}

impl TransportError {
    pub(crate) fn status(status: u16, status_text: impl Into<String>) -> Self {
        TransportError::Status {
            status,
            status_text: status_text.into(),
        }
    }
}
