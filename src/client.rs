use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use reqwest::redirect::Policy;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::Result;

/// Delegate client handed out by [`Config::client`].
pub trait Client: Send + Sync + 'static {
    /// Whether the client can still serve requests.
    fn is_running(&self) -> bool;

    /// Stops the client. Later calls to [`Client::is_running`] return `false`.
    fn close(&self) {}

    /// Allows callers to reach the concrete client type.
    fn as_any(&self) -> &dyn Any;
}

/// Builds a client from the configuration it is installed on.
pub type ClientFactory = Arc<dyn Fn(&Config) -> Result<Arc<dyn Client>> + Send + Sync>;

/// Default client: a `reqwest::Client` built from every setting of a [`Config`].
pub struct HttpClient {
    inner: reqwest::Client,
    running: AtomicBool,
}

impl HttpClient {
    /// Translates `config` into a `reqwest` client builder and builds it.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .gzip(config.is_request_compression_on())
            .danger_accept_invalid_certs(!config.verify_ssl())
            .cookie_store(config.cookie_management())
            .pool_max_idle_per_host(config.max_idle_per_host())
            .default_headers(config.default_headers().clone());

        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        if let Some(ttl) = config.ttl_duration() {
            builder = builder.pool_idle_timeout(ttl);
        }
        builder = if config.follow_redirects() {
            builder.redirect(Policy::default())
        } else {
            builder.redirect(Policy::none())
        };
        if let Some(agent) = config.user_agent() {
            builder = builder.user_agent(agent);
        }

        builder = match config.proxy() {
            Some(proxy) => {
                let mut upstream = reqwest::Proxy::all(proxy.url())?;
                if let (Some(username), Some(password)) = (proxy.username(), proxy.password()) {
                    upstream = upstream.basic_auth(username, password);
                }
                builder.proxy(upstream)
            }
            None => builder.no_proxy(),
        };

        if !config.verify_ssl() && config.tls_credentials().ssl_context().is_some() {
            warn!("verify_ssl(false) has no effect with a preconfigured ssl context");
        }
        builder = config.tls_credentials().apply(builder)?;

        let inner = builder.build()?;
        debug!(
            tls = config.tls_credentials().kind(),
            proxy = config.proxy().is_some(),
            "built http client"
        );
        Ok(Self {
            inner,
            running: AtomicBool::new(true),
        })
    }

    /// The underlying `reqwest` client, for issuing requests.
    pub fn inner(&self) -> &reqwest::Client {
        &self.inner
    }
}

impl Client for HttpClient {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn close(&self) {
        self.running.store(false, Ordering::Release);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub(crate) fn default_factory(config: &Config) -> Result<Arc<dyn Client>> {
    Ok(Arc::new(HttpClient::from_config(config)?))
}
