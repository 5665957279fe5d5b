use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, info, warn};

use crate::client::{Client, ClientFactory, default_factory};
use crate::error::Result;
use crate::tls::{KeyStore, KeyStoreSource, SslContext, TlsCredentials};
use crate::types::{Proxy, Settings, TimeUnit};

/// Connect timeout used until [`Config::with_connect_timeout`] is called.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(10_000);
/// Idle connections kept per host by the default client.
pub const DEFAULT_MAX_PER_ROUTE: usize = 20;
/// Retry budget reported by [`Config::max_retries`] until overridden.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Mutable settings for an HTTP client plus the lazily built client itself.
///
/// Setters return `&mut Self` so they can be chained. Any setter whose value is
/// consumed while building the client drops the cached client; the next call
/// to [`Config::client`] builds a fresh one.
pub struct Config {
    connect_timeout: Duration,
    request_timeout: Option<Duration>,
    ttl_millis: Option<u64>,
    request_compression: bool,
    automatic_retries: bool,
    max_retries: u32,
    follow_redirects: bool,
    verify_ssl: bool,
    cookie_management: bool,
    max_idle_per_host: usize,
    proxy: Option<Proxy>,
    tls: TlsCredentials,
    default_headers: HeaderMap,
    user_agent: Option<String>,
    default_base_url: Option<String>,
    factory: Option<ClientFactory>,
    client: Mutex<Option<Arc<dyn Client>>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: None,
            ttl_millis: None,
            request_compression: true,
            automatic_retries: true,
            max_retries: DEFAULT_MAX_RETRIES,
            follow_redirects: true,
            verify_ssl: true,
            cookie_management: false,
            max_idle_per_host: DEFAULT_MAX_PER_ROUTE,
            proxy: None,
            tls: TlsCredentials::None,
            default_headers: HeaderMap::new(),
            user_agent: None,
            default_base_url: None,
            factory: None,
            client: Mutex::new(None),
        }
    }
}

impl Config {
    /// Creates a configuration with every default applied and no client built.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides how long the client waits for a connection to open.
    pub fn with_connect_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.connect_timeout = timeout;
        self.invalidate("connect timeout")
    }

    /// Returns [`DEFAULT_CONNECT_TIMEOUT`] unless overridden.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Overrides the total per-request timeout. Use `None` to disable it.
    pub fn with_request_timeout(&mut self, timeout: Option<Duration>) -> &mut Self {
        self.request_timeout = timeout;
        self.invalidate("request timeout")
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    /// Sets how long pooled connections may live, stored in milliseconds.
    pub fn with_connection_ttl(&mut self, ttl: Duration) -> &mut Self {
        self.ttl_millis = Some(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX));
        self.invalidate("connection ttl")
    }

    /// Same as [`Config::with_connection_ttl`] for an amount in `unit`.
    pub fn with_connection_ttl_in(&mut self, amount: u64, unit: TimeUnit) -> &mut Self {
        self.with_connection_ttl(unit.to_duration(amount))
    }

    /// Connection TTL in milliseconds, or `-1` when none was set.
    pub fn ttl(&self) -> i64 {
        self.ttl_millis.map_or(-1, |millis| i64::try_from(millis).unwrap_or(i64::MAX))
    }

    pub fn ttl_duration(&self) -> Option<Duration> {
        self.ttl_millis.map(Duration::from_millis)
    }

    /// Installs a custom client constructor. Nothing is built until [`Config::client`].
    ///
    /// The factory runs while the client cache is locked, so it must not call
    /// [`Config::client`], [`Config::is_running`] or [`Config::settings`].
    pub fn with_http_client<F, C>(&mut self, factory: F) -> &mut Self
    where
        F: Fn(&Config) -> Result<Arc<C>> + Send + Sync + 'static,
        C: Client,
    {
        self.with_client_factory(Arc::new(move |config: &Config| -> Result<Arc<dyn Client>> {
            let client: Arc<dyn Client> = factory(config)?;
            Ok(client)
        }))
    }

    /// Like [`Config::with_http_client`] for factories that already hand out `Arc<dyn Client>`.
    pub fn with_client_factory(&mut self, factory: ClientFactory) -> &mut Self {
        self.factory = Some(factory);
        self.invalidate("client factory")
    }

    pub fn has_custom_client_factory(&self) -> bool {
        self.factory.is_some()
    }

    /// Returns the cached client, building one first if none is cached or the
    /// cached one stopped running.
    pub fn client(&self) -> Result<Arc<dyn Client>> {
        let mut slot = self.client.lock();
        if let Some(client) = slot.as_ref() {
            if client.is_running() {
                return Ok(Arc::clone(client));
            }
            debug!("cached client is no longer running, rebuilding");
        }

        let client = match self.factory.as_ref() {
            Some(factory) => factory(self)?,
            None => default_factory(self)?,
        };
        *slot = Some(Arc::clone(&client));
        Ok(client)
    }

    /// `true` once a client was built and for as long as it keeps running.
    pub fn is_running(&self) -> bool {
        self.client
            .lock()
            .as_ref()
            .is_some_and(|client| client.is_running())
    }

    pub fn with_request_compression(&mut self, enabled: bool) -> &mut Self {
        self.request_compression = enabled;
        self.invalidate("request compression")
    }

    pub fn is_request_compression_on(&self) -> bool {
        self.request_compression
    }

    /// Read by callers when a request fails; the client is not rebuilt.
    pub fn with_automatic_retries(&mut self, enabled: bool) -> &mut Self {
        self.automatic_retries = enabled;
        self
    }

    pub fn is_automatic_retries(&self) -> bool {
        self.automatic_retries
    }

    /// Sets how many attempts callers make before giving up. Does not rebuild the client.
    pub fn with_max_retries(&mut self, max_retries: u32) -> &mut Self {
        self.max_retries = max_retries;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Replaces the proxy as a whole.
    pub fn with_proxy(&mut self, proxy: Proxy) -> &mut Self {
        self.proxy = Some(proxy);
        self.invalidate("proxy")
    }

    /// Routes through `host:port` without credentials.
    pub fn with_proxy_at(&mut self, host: impl Into<String>, port: u16) -> &mut Self {
        self.with_proxy(Proxy::new(host, port))
    }

    /// Routes through `host:port` with basic-auth credentials.
    pub fn with_proxy_auth(
        &mut self,
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> &mut Self {
        self.with_proxy(Proxy::with_credentials(host, port, username, password))
    }

    /// The configured proxy, if any.
    pub fn proxy(&self) -> Option<&Proxy> {
        self.proxy.as_ref()
    }

    /// Fails without changing anything if a key store is already configured.
    pub fn with_ssl_context(&mut self, context: SslContext) -> Result<&mut Self> {
        if let Err(err) = self.tls.select_ssl_context(context) {
            warn!(current = self.tls.kind(), "rejected ssl context");
            return Err(err);
        }
        Ok(self.invalidate("ssl context"))
    }

    /// Fails without changing anything if a TLS context is already configured.
    pub fn with_client_certificate_store(
        &mut self,
        store: KeyStore,
        password: impl Into<String>,
    ) -> Result<&mut Self> {
        self.select_key_store(KeyStoreSource::Loaded(store), password.into())
    }

    /// Like [`Config::with_client_certificate_store`], reading the file when the client is built.
    pub fn with_client_certificate_path(
        &mut self,
        path: impl Into<PathBuf>,
        password: impl Into<String>,
    ) -> Result<&mut Self> {
        self.select_key_store(KeyStoreSource::Path(path.into()), password.into())
    }

    fn select_key_store(&mut self, source: KeyStoreSource, password: String) -> Result<&mut Self> {
        if let Err(err) = self.tls.select_key_store(source, password) {
            warn!(current = self.tls.kind(), "rejected client key store");
            return Err(err);
        }
        Ok(self.invalidate("client key store"))
    }

    pub fn tls_credentials(&self) -> &TlsCredentials {
        &self.tls
    }

    /// `false` stops the default client from following redirects.
    pub fn with_follow_redirects(&mut self, enabled: bool) -> &mut Self {
        self.follow_redirects = enabled;
        self.invalidate("follow redirects")
    }

    pub fn follow_redirects(&self) -> bool {
        self.follow_redirects
    }

    /// `false` makes the default client accept invalid certificates.
    ///
    /// Ignored when an [`SslContext`] is configured: verification is then up
    /// to that context.
    pub fn with_verify_ssl(&mut self, enabled: bool) -> &mut Self {
        self.verify_ssl = enabled;
        self.invalidate("verify ssl")
    }

    pub fn verify_ssl(&self) -> bool {
        self.verify_ssl
    }

    /// Keeps a cookie store across requests.
    pub fn with_cookie_management(&mut self, enabled: bool) -> &mut Self {
        self.cookie_management = enabled;
        self.invalidate("cookie management")
    }

    pub fn cookie_management(&self) -> bool {
        self.cookie_management
    }

    /// Caps idle pooled connections per host.
    pub fn with_max_idle_per_host(&mut self, max: usize) -> &mut Self {
        self.max_idle_per_host = max;
        self.invalidate("max idle per host")
    }

    pub fn max_idle_per_host(&self) -> usize {
        self.max_idle_per_host
    }

    /// Adds a header sent with every request, replacing earlier values for `name`.
    pub fn with_default_header(
        &mut self,
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> Result<&mut Self> {
        let name = HeaderName::from_bytes(name.as_ref().as_bytes())?;
        let value = HeaderValue::from_str(value.as_ref())?;
        self.default_headers.insert(name, value);
        Ok(self.invalidate("default headers"))
    }

    pub fn default_headers(&self) -> &HeaderMap {
        &self.default_headers
    }

    /// Sets the `User-Agent` sent with every request.
    pub fn with_user_agent(&mut self, agent: impl Into<String>) -> &mut Self {
        self.user_agent = Some(agent.into());
        self.invalidate("user agent")
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    /// Prefix for relative request paths; applied per request, not by the client.
    pub fn with_default_base_url(&mut self, url: impl Into<String>) -> &mut Self {
        self.default_base_url = Some(url.into());
        self
    }

    pub fn default_base_url(&self) -> Option<&str> {
        self.default_base_url.as_deref()
    }

    /// Closes the cached client, if any, and empties the cache.
    pub fn shutdown(&mut self) {
        if let Some(client) = self.client.get_mut().take() {
            client.close();
            info!("http client shut down");
        }
    }

    /// Shuts down and restores every default, dropping any custom factory.
    pub fn reset(&mut self) {
        self.shutdown();
        *self = Self::default();
        info!("configuration reset to defaults");
    }

    pub fn settings(&self) -> Settings {
        Settings {
            connect_timeout_ms: duration_millis(self.connect_timeout),
            request_timeout_ms: self.request_timeout.map(duration_millis),
            ttl_ms: self.ttl(),
            request_compression: self.request_compression,
            automatic_retries: self.automatic_retries,
            max_retries: self.max_retries,
            follow_redirects: self.follow_redirects,
            verify_ssl: self.verify_ssl,
            cookie_management: self.cookie_management,
            max_idle_per_host: self.max_idle_per_host,
            proxy: self.proxy.clone(),
            tls: self.tls.kind(),
            default_header_names: self
                .default_headers
                .keys()
                .map(|name| name.as_str().to_string())
                .collect(),
            user_agent: self.user_agent.clone(),
            default_base_url: self.default_base_url.clone(),
            custom_client_factory: self.factory.is_some(),
            running: self.is_running(),
        }
    }

    fn invalidate(&mut self, reason: &str) -> &mut Self {
        if self.client.get_mut().take().is_some() {
            debug!(reason, "configuration changed, dropping cached client");
        }
        self
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("ttl", &self.ttl())
            .field("request_compression", &self.request_compression)
            .field("automatic_retries", &self.automatic_retries)
            .field("proxy", &self.proxy)
            .field("tls", &self.tls)
            .field("custom_client_factory", &self.factory.is_some())
            .finish_non_exhaustive()
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
