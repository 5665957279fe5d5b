//! TLS credentials a [`Config`](crate::Config) can carry.
//!
//! A configuration holds either a fully prepared rustls context or a client
//! key store, never both.

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use reqwest::{ClientBuilder, Identity};

use crate::error::{Error, Result};

/// Preconfigured rustls client context handed straight to the HTTP library.
#[derive(Debug, Clone)]
pub struct SslContext(Arc<rustls::ClientConfig>);

impl SslContext {
    pub fn new(config: rustls::ClientConfig) -> Self {
        Self(Arc::new(config))
    }

    pub fn rustls_config(&self) -> &rustls::ClientConfig {
        self.0.as_ref()
    }
}

impl From<Arc<rustls::ClientConfig>> for SslContext {
    fn from(config: Arc<rustls::ClientConfig>) -> Self {
        Self(config)
    }
}

/// In-memory client key store: a PEM bundle with the certificate chain and private key.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyStore {
    pem: Vec<u8>,
}

impl KeyStore {
    pub fn from_pem(pem: impl Into<Vec<u8>>) -> Self {
        Self { pem: pem.into() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pem
    }
}

impl fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStore")
            .field("len", &self.pem.len())
            .finish()
    }
}

/// Where a key store comes from. Paths are only read when a client is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyStoreSource {
    Loaded(KeyStore),
    Path(PathBuf),
}

impl KeyStoreSource {
    pub fn load(&self) -> Result<KeyStore> {
        match self {
            KeyStoreSource::Loaded(store) => Ok(store.clone()),
            KeyStoreSource::Path(path) => Ok(KeyStore::from_pem(fs::read(path)?)),
        }
    }
}

#[derive(Clone, Default)]
pub enum TlsCredentials {
    #[default]
    None,
    SslContext(SslContext),
    KeyStore {
        source: KeyStoreSource,
        password: String,
    },
}

impl TlsCredentials {
    /// Stores `context`, unless a key store is already configured.
    pub(crate) fn select_ssl_context(&mut self, context: SslContext) -> Result<()> {
        if matches!(self, TlsCredentials::KeyStore { .. }) {
            return Err(Error::tls_conflict());
        }
        *self = TlsCredentials::SslContext(context);
        Ok(())
    }

    /// Stores a key store, unless a TLS context is already configured.
    pub(crate) fn select_key_store(
        &mut self,
        source: KeyStoreSource,
        password: String,
    ) -> Result<()> {
        if matches!(self, TlsCredentials::SslContext(_)) {
            return Err(Error::tls_conflict());
        }
        *self = TlsCredentials::KeyStore { source, password };
        Ok(())
    }

    pub fn is_none(&self) -> bool {
        matches!(self, TlsCredentials::None)
    }

    pub fn ssl_context(&self) -> Option<&SslContext> {
        match self {
            TlsCredentials::SslContext(context) => Some(context),
            _ => None,
        }
    }

    pub fn key_store(&self) -> Option<(&KeyStoreSource, &str)> {
        match self {
            TlsCredentials::KeyStore { source, password } => Some((source, password.as_str())),
            _ => None,
        }
    }

    /// Short label used in settings snapshots and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TlsCredentials::None => "none",
            TlsCredentials::SslContext(_) => "ssl-context",
            TlsCredentials::KeyStore { .. } => "key-store",
        }
    }

    pub(crate) fn apply(&self, builder: ClientBuilder) -> Result<ClientBuilder> {
        match self {
            TlsCredentials::None => Ok(builder),
            TlsCredentials::SslContext(context) => {
                Ok(builder.use_preconfigured_tls(context.rustls_config().clone()))
            }
            // The PEM loader does not take a passphrase; keys must be unencrypted.
            TlsCredentials::KeyStore { source, .. } => {
                let store = source.load()?;
                let identity = Identity::from_pem(store.as_bytes())?;
                Ok(builder.identity(identity))
            }
        }
    }
}

impl fmt::Debug for TlsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TlsCredentials::None => f.write_str("None"),
            TlsCredentials::SslContext(_) => f.write_str("SslContext(..)"),
            TlsCredentials::KeyStore { source, .. } => f
                .debug_struct("KeyStore")
                .field("source", source)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}
