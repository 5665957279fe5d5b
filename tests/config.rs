use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use restwire::{
    Client, ClientFactory, Config, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_PER_ROUTE, DEFAULT_MAX_RETRIES, Proxy,
    TimeUnit,
};

struct StubClient {
    running: AtomicBool,
}

impl StubClient {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            running: AtomicBool::new(true),
        })
    }
}

impl Client for StubClient {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Installs a factory that builds a new stub each call and counts the builds.
fn counting_config() -> (Config, Arc<AtomicUsize>) {
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&builds);
    let mut config = Config::new();
    config.with_http_client(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(StubClient::new())
    });
    (config, builds)
}

fn assert_proxy(
    config: &Config,
    host: &str,
    port: u16,
    username: Option<&str>,
    password: Option<&str>,
) {
    let proxy = config.proxy().expect("proxy configured");
    assert_eq!(proxy.host(), host);
    assert_eq!(proxy.port(), port);
    assert_eq!(proxy.username(), username);
    assert_eq!(proxy.password(), password);
}

#[test]
fn keeps_connect_timeout_default() {
    let config = Config::new();
    assert_eq!(config.connect_timeout(), DEFAULT_CONNECT_TIMEOUT);
}

#[test]
fn reuses_cached_client() {
    let config = Config::new();
    let first = config.client().expect("first build");
    let second = config.client().expect("cached client");
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn connection_ttl_is_normalized_to_millis() {
    let mut config = Config::new();
    assert_eq!(config.ttl(), -1);

    assert_eq!(config.with_connection_ttl_in(42, TimeUnit::Milliseconds).ttl(), 42);
    assert_eq!(config.with_connection_ttl_in(42, TimeUnit::Minutes).ttl(), 2_520_000);

    assert_eq!(config.with_connection_ttl(Duration::from_millis(43)).ttl(), 43);
    assert_eq!(config.with_connection_ttl(Duration::from_secs(43 * 60)).ttl(), 2_580_000);
}

#[test]
fn connection_ttl_truncates_sub_millisecond_units() {
    let mut config = Config::new();
    assert_eq!(config.with_connection_ttl_in(1_500, TimeUnit::Microseconds).ttl(), 1);
    assert_eq!(config.with_connection_ttl_in(2, TimeUnit::Hours).ttl(), 7_200_000);
    assert_eq!(config.ttl_duration(), Some(Duration::from_secs(7_200)));
}

#[test]
fn custom_factory_result_is_returned() {
    let stub = StubClient::new();
    let expected: Arc<dyn Client> = stub.clone();
    let mut config = Config::new();

    config.with_http_client(move |_| Ok(stub.clone()));

    let client = config.client().expect("custom client");
    assert!(Arc::ptr_eq(&expected, &client));
    assert!(client.as_any().downcast_ref::<StubClient>().is_some());
}

#[test]
fn installing_a_factory_does_not_build() {
    let (config, builds) = counting_config();
    assert_eq!(builds.load(Ordering::SeqCst), 0);
    assert!(!config.is_running());

    config.client().expect("client");
    config.client().expect("client");
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[test]
fn factory_sees_current_settings() {
    let mut config = Config::new();
    let seen = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&seen);
    config
        .with_request_compression(false)
        .with_http_client(move |config| {
            flag.store(config.is_request_compression_on(), Ordering::SeqCst);
            Ok(StubClient::new())
        });

    config.client().expect("client");
    assert!(!seen.load(Ordering::SeqCst));
}

#[test]
fn can_disable_request_compression() {
    let mut config = Config::new();
    assert!(config.is_request_compression_on());
    config.with_request_compression(false);
    assert!(!config.is_request_compression_on());
}

#[test]
fn can_disable_automatic_retries() {
    let mut config = Config::new();
    assert!(config.is_automatic_retries());
    config.with_automatic_retries(false);
    assert!(!config.is_automatic_retries());
}

#[test]
fn proxy_is_replaced_wholesale() {
    let mut config = Config::new();
    assert!(config.proxy().is_none());

    config.with_proxy(Proxy::with_credentials("localhost", 8080, "ryan", "password"));
    assert_proxy(&config, "localhost", 8080, Some("ryan"), Some("password"));

    config.with_proxy_at("local2", 8888);
    assert_proxy(&config, "local2", 8888, None, None);

    config.with_proxy_auth("local3", 7777, "barb", "12345");
    assert_proxy(&config, "local3", 7777, Some("barb"), Some("12345"));
}

#[test]
fn proxy_helpers() {
    let proxy = Proxy::new("local2", 8888);
    assert!(!proxy.is_authenticated());
    assert_eq!(proxy.url(), "http://local2:8888");

    let proxy = Proxy::with_credentials("localhost", 8080, "ryan", "hunter2");
    assert!(proxy.is_authenticated());
    assert!(!format!("{proxy:?}").contains("hunter2"));
}

#[test]
fn is_running_after_first_client() {
    let config = Config::new();
    assert!(!config.is_running());
    config.client().expect("client");
    assert!(config.is_running());
}

#[test]
fn rebuilds_when_cached_client_stops_running() {
    let (config, builds) = counting_config();
    let first = config.client().expect("client");
    first.close();
    assert!(!config.is_running());

    let second = config.client().expect("rebuilt client");
    assert!(!Arc::ptr_eq(&first, &second));
    assert!(config.is_running());
    assert_eq!(builds.load(Ordering::SeqCst), 2);
}

#[test]
fn client_settings_invalidate_cache() {
    let (mut config, builds) = counting_config();
    let first = config.client().expect("client");

    config.with_connect_timeout(Duration::from_secs(1));
    assert!(!config.is_running());

    let second = config.client().expect("client");
    assert!(!Arc::ptr_eq(&first, &second));

    config.with_proxy_at("localhost", 3128);
    config.client().expect("client");
    config.with_request_compression(false);
    config.client().expect("client");
    assert_eq!(builds.load(Ordering::SeqCst), 4);
}

#[test]
fn every_client_setting_invalidates_cache() {
    let setters: &[(&str, fn(&mut Config))] = &[
        ("connect timeout", |c: &mut Config| {
            c.with_connect_timeout(Duration::from_secs(1));
        }),
        ("request timeout", |c: &mut Config| {
            c.with_request_timeout(Some(Duration::from_secs(5)));
        }),
        ("ttl", |c: &mut Config| {
            c.with_connection_ttl(Duration::from_secs(60));
        }),
        ("ttl in unit", |c: &mut Config| {
            c.with_connection_ttl_in(2, TimeUnit::Minutes);
        }),
        ("compression", |c: &mut Config| {
            c.with_request_compression(false);
        }),
        ("proxy", |c: &mut Config| {
            c.with_proxy(Proxy::new("localhost", 3128));
        }),
        ("proxy at", |c: &mut Config| {
            c.with_proxy_at("local2", 8888);
        }),
        ("proxy auth", |c: &mut Config| {
            c.with_proxy_auth("local3", 7777, "barb", "12345");
        }),
        ("verify ssl", |c: &mut Config| {
            c.with_verify_ssl(false);
        }),
        ("follow redirects", |c: &mut Config| {
            c.with_follow_redirects(false);
        }),
        ("cookie management", |c: &mut Config| {
            c.with_cookie_management(true);
        }),
        ("max idle per host", |c: &mut Config| {
            c.with_max_idle_per_host(2);
        }),
        ("default header", |c: &mut Config| {
            c.with_default_header("X-Trace", "abc").expect("valid header");
        }),
        ("user agent", |c: &mut Config| {
            c.with_user_agent("restwire-test");
        }),
    ];

    for (name, apply) in setters {
        let (mut config, builds) = counting_config();
        let first = config.client().expect("client");

        apply(&mut config);
        assert!(!config.is_running(), "{name} should drop the cached client");

        let second = config.client().expect("client");
        assert!(!Arc::ptr_eq(&first, &second), "{name} should force a rebuild");
        assert_eq!(builds.load(Ordering::SeqCst), 2, "{name}");
    }
}

#[test]
fn installing_a_factory_replaces_cached_client() {
    let (mut config, builds) = counting_config();
    let first = config.client().expect("client");

    let stub = StubClient::new();
    let expected: Arc<dyn Client> = stub.clone();
    config.with_http_client(move |_| Ok(stub.clone()));
    assert!(!config.is_running());

    let second = config.client().expect("client");
    assert!(Arc::ptr_eq(&expected, &second));
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[test]
fn factory_can_hand_out_shared_trait_object() {
    let shared: Arc<dyn Client> = StubClient::new();
    let handed_out = Arc::clone(&shared);
    let factory: ClientFactory = Arc::new(move |_: &Config| Ok(Arc::clone(&handed_out)));

    let mut config = Config::new();
    config.with_client_factory(factory);
    assert!(config.has_custom_client_factory());
    assert!(!config.is_running());

    let client = config.client().expect("client");
    assert!(Arc::ptr_eq(&shared, &client));
    assert!(config.is_running());
}

#[test]
fn request_time_settings_keep_cache() {
    let (mut config, builds) = counting_config();
    let first = config.client().expect("client");

    config
        .with_automatic_retries(false)
        .with_max_retries(7)
        .with_default_base_url("http://localhost:8080");

    let second = config.client().expect("client");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert_eq!(config.max_retries(), 7);
    assert_eq!(config.default_base_url(), Some("http://localhost:8080"));
}

#[test]
fn shutdown_closes_cached_client() {
    let (mut config, _) = counting_config();
    let client = config.client().expect("client");
    assert!(config.is_running());

    config.shutdown();
    assert!(!client.is_running());
    assert!(!config.is_running());
}

#[test]
fn reset_restores_defaults() {
    let (mut config, _) = counting_config();
    config
        .with_connect_timeout(Duration::from_secs(1))
        .with_connection_ttl_in(5, TimeUnit::Seconds)
        .with_request_compression(false)
        .with_automatic_retries(false)
        .with_proxy_at("localhost", 8080);
    let client = config.client().expect("client");

    config.reset();

    assert!(!client.is_running());
    assert!(!config.is_running());
    assert!(!config.has_custom_client_factory());
    assert_eq!(config.connect_timeout(), DEFAULT_CONNECT_TIMEOUT);
    assert_eq!(config.ttl(), -1);
    assert!(config.is_request_compression_on());
    assert!(config.is_automatic_retries());
    assert!(config.proxy().is_none());
    assert_eq!(config.max_retries(), DEFAULT_MAX_RETRIES);
    assert_eq!(config.max_idle_per_host(), DEFAULT_MAX_PER_ROUTE);
}

#[test]
fn default_headers_are_validated() {
    let mut config = Config::new();
    config
        .with_default_header("X-Trace", "abc")
        .expect("valid header");
    assert_eq!(config.default_headers()["x-trace"], "abc");

    let err = config
        .with_default_header("bad header", "abc")
        .expect_err("space in header name");
    assert!(!err.is_config());

    let err = config
        .with_default_header("X-Other", "line\nbreak")
        .expect_err("newline in header value");
    assert!(err.to_string().starts_with("invalid default header"));
    assert_eq!(config.default_headers().len(), 1);
}

#[test]
fn settings_snapshot_redacts_secrets() {
    let mut config = Config::new();
    config
        .with_proxy_auth("localhost", 8080, "ryan", "password")
        .with_connection_ttl_in(42, TimeUnit::Milliseconds)
        .with_user_agent("restwire-test");
    config
        .with_default_header("Authorization", "Bearer secret")
        .expect("valid header");

    let settings = config.settings();
    assert_eq!(settings.ttl_ms, 42);
    assert_eq!(settings.tls, "none");
    assert!(!settings.running);
    assert_eq!(settings.default_header_names, vec!["authorization".to_string()]);

    let json = serde_json::to_string(&settings).expect("serialize settings");
    assert!(json.contains("\"host\":\"localhost\""));
    assert!(json.contains("\"username\":\"ryan\""));
    assert!(!json.contains("password"));
    assert!(!json.contains("secret"));
}

#[test]
fn concurrent_first_calls_build_once() {
    let (config, builds) = counting_config();
    let config = Arc::new(config);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let config = Arc::clone(&config);
            std::thread::spawn(move || config.client().expect("client"))
        })
        .collect();
    let clients: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread"))
        .collect();

    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert!(clients.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}
