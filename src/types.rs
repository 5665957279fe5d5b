use std::fmt;
use std::net::Ipv6Addr;
use std::time::Duration;

use serde::Serialize;

/// Proxy endpoint with optional basic-auth credentials.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Proxy {
    host: String,
    port: u16,
    username: Option<String>,
    #[serde(skip)]
    password: Option<String>,
}

impl Proxy {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            username: None,
            password: None,
        }
    }

    pub fn with_credentials(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Both a username and a password are present.
    pub fn is_authenticated(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    /// Returns `http://host:port`, the form handed to the HTTP library.
    /// IPv6 literals are bracketed.
    pub fn url(&self) -> String {
        if self.host.parse::<Ipv6Addr>().is_ok() {
            format!("http://[{}]:{}", self.host, self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Unit for amounts passed to [`Config::with_connection_ttl_in`](crate::Config::with_connection_ttl_in).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    /// Converts `amount` of this unit into a [`Duration`], saturating on overflow.
    pub fn to_duration(self, amount: u64) -> Duration {
        match self {
            TimeUnit::Nanoseconds => Duration::from_nanos(amount),
            TimeUnit::Microseconds => Duration::from_micros(amount),
            TimeUnit::Milliseconds => Duration::from_millis(amount),
            TimeUnit::Seconds => Duration::from_secs(amount),
            TimeUnit::Minutes => Duration::from_secs(amount.saturating_mul(60)),
            TimeUnit::Hours => Duration::from_secs(amount.saturating_mul(3_600)),
            TimeUnit::Days => Duration::from_secs(amount.saturating_mul(86_400)),
        }
    }
}

/// Serializable snapshot of a [`Config`](crate::Config). Secrets are left out.
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: Option<u64>,
    pub ttl_ms: i64,
    pub request_compression: bool,
    pub automatic_retries: bool,
    pub max_retries: u32,
    pub follow_redirects: bool,
    pub verify_ssl: bool,
    pub cookie_management: bool,
    pub max_idle_per_host: usize,
    pub proxy: Option<Proxy>,
    pub tls: &'static str,
    pub default_header_names: Vec<String>,
    pub user_agent: Option<String>,
    pub default_base_url: Option<String>,
    pub custom_client_factory: bool,
    pub running: bool,
}
