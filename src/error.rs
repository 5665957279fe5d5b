use reqwest::header::{InvalidHeaderName, InvalidHeaderValue};
use thiserror::Error;

/// Raised when a TLS context and a client key store are both configured.
pub const TLS_CONFLICT: &str = "You may only configure a SSLContext OR a Keystore, but not both";

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Rejected configuration change. The message is surfaced verbatim.
    #[error("{0}")]
    Config(String),
    #[error("invalid default header: {0}")]
    InvalidHeader(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    pub(crate) fn tls_conflict() -> Self {
        Self::Config(TLS_CONFLICT.to_string())
    }

    /// Returns `true` for configuration-time rejections.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

impl From<InvalidHeaderName> for Error {
    fn from(err: InvalidHeaderName) -> Self {
        Self::InvalidHeader(format!("bad name: {err}"))
    }
}

impl From<InvalidHeaderValue> for Error {
    fn from(err: InvalidHeaderValue) -> Self {
        Self::InvalidHeader(format!("bad value: {err}"))
    }
}
