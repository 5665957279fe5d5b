use std::env;
use std::time::Duration;

use clap::{Parser, Subcommand};
use restwire::{Config, HttpClient};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "restwire",
    version,
    about = "Inspect an HTTP client configuration and issue requests with it"
)]
struct Cli {
    /// Override RESTWIRE_PROXY_HOST
    #[arg(long)]
    proxy_host: Option<String>,
    /// Override RESTWIRE_PROXY_PORT
    #[arg(long)]
    proxy_port: Option<u16>,
    /// Override RESTWIRE_PROXY_USER
    #[arg(long)]
    proxy_user: Option<String>,
    /// Override RESTWIRE_PROXY_PASSWORD
    #[arg(long)]
    proxy_password: Option<String>,
    /// Override RESTWIRE_CONNECT_TIMEOUT_MS
    #[arg(long)]
    connect_timeout_ms: Option<u64>,
    /// Override RESTWIRE_TTL_MS
    #[arg(long)]
    ttl_ms: Option<u64>,
    /// Disable gzip request compression.
    #[arg(long)]
    no_compression: bool,
    /// Accept invalid TLS certificates.
    #[arg(long)]
    insecure: bool,
    /// PEM bundle with the client certificate chain and private key.
    #[arg(long)]
    client_cert: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the effective configuration as JSON.
    Show,
    /// Issue a GET request and print the response.
    Get {
        url: String,
        /// Extra header in `name: value` form.
        #[arg(long = "header", short = 'H', value_name = "HEADER")]
        headers: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = resolve_config(&cli)?;

    match cli.command {
        Commands::Show => {
            println!("{}", serde_json::to_string_pretty(&config.settings())?);
        }
        Commands::Get { url, headers } => {
            for header in &headers {
                let (name, value) = header
                    .split_once(':')
                    .ok_or_else(|| format!("header `{header}` is not in `name: value` form"))?;
                config.with_default_header(name.trim(), value.trim())?;
            }

            let client = config.client()?;
            let http = client
                .as_any()
                .downcast_ref::<HttpClient>()
                .ok_or("configured client is not an HttpClient")?;
            let response = http.inner().get(&url).send().await?;
            println!("{}", response.status());
            println!("{}", response.text().await?);
            config.shutdown();
        }
    }

    Ok(())
}

fn resolve_config(cli: &Cli) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = Config::new();

    let proxy_host = cli
        .proxy_host
        .clone()
        .or_else(|| env::var("RESTWIRE_PROXY_HOST").ok());
    if let Some(host) = proxy_host {
        let port = cli
            .proxy_port
            .or_else(|| env_parse("RESTWIRE_PROXY_PORT"))
            .ok_or_else(|| "RESTWIRE_PROXY_PORT missing (set env or use --proxy-port)".to_string())?;
        let user = cli
            .proxy_user
            .clone()
            .or_else(|| env::var("RESTWIRE_PROXY_USER").ok());
        let password = cli
            .proxy_password
            .clone()
            .or_else(|| env::var("RESTWIRE_PROXY_PASSWORD").ok());
        match (user, password) {
            (Some(user), Some(password)) => config.with_proxy_auth(host, port, user, password),
            _ => config.with_proxy_at(host, port),
        };
    }

    if let Some(millis) = cli
        .connect_timeout_ms
        .or_else(|| env_parse("RESTWIRE_CONNECT_TIMEOUT_MS"))
    {
        config.with_connect_timeout(Duration::from_millis(millis));
    }
    if let Some(millis) = cli.ttl_ms.or_else(|| env_parse("RESTWIRE_TTL_MS")) {
        config.with_connection_ttl(Duration::from_millis(millis));
    }

    config
        .with_request_compression(!cli.no_compression)
        .with_verify_ssl(!cli.insecure);

    if let Some(path) = cli.client_cert.as_deref() {
        config.with_client_certificate_path(path, "")?;
    }

    Ok(config)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}
