//! Configuration holder for an HTTP client: timeouts, proxy, compression and
//! retry toggles, mutually exclusive TLS credentials, and a lazily built,
//! cached `reqwest`-backed client.

mod client;
mod config;
mod error;
mod tls;
mod types;

pub use crate::client::{Client, ClientFactory, HttpClient};
pub use crate::config::{
    Config, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_PER_ROUTE, DEFAULT_MAX_RETRIES,
};
pub use crate::error::{Error, Result, TLS_CONFLICT};
pub use crate::tls::{KeyStore, KeyStoreSource, SslContext, TlsCredentials};
pub use crate::types::{Proxy, Settings, TimeUnit};
