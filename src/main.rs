//! `streamtap` CLI - configure a session and print its effective options

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, bail, Result};
use clap::Parser;
use indexmap::IndexMap;
use tracing::debug;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use streamtap::config::load_options;
use streamtap::options::catalog;
use streamtap::{OptionValue, Session};

#[derive(Parser)]
#[command(name = "streamtap")]
#[command(about = "Configure a stream extraction session and inspect its options")]
#[command(version)]
struct Cli {
    /// Read options from this TOML file instead of the default location
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Do not read any config file
    #[arg(long, conflicts_with = "config")]
    no_config: bool,

    /// Set an option (repeatable). VALUE is parsed like the option's default
    #[arg(long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,

    /// Print a single option as JSON instead of all options
    #[arg(long, value_name = "KEY")]
    get: Option<String>,

    /// Bind outgoing connections to this local address
    #[arg(long, value_name = "ADDRESS")]
    interface: Option<String>,

    /// Resolve hostnames to IPv4 addresses only
    #[arg(short = '4', long)]
    ipv4: bool,

    /// Resolve hostnames to IPv6 addresses only
    #[arg(short = '6', long)]
    ipv6: bool,

    /// Proxy for both HTTP and HTTPS requests
    #[arg(long, value_name = "URL")]
    http_proxy: Option<String>,

    #[arg(long, value_name = "URL", hide = true)]
    https_proxy: Option<String>,

    /// Add a default cookie (repeatable)
    #[arg(long = "http-cookie", value_name = "KEY=VALUE")]
    http_cookies: Vec<String>,

    /// Add a default header (repeatable)
    #[arg(long = "http-header", value_name = "KEY=VALUE")]
    http_headers: Vec<String>,

    /// Add a default query parameter (repeatable)
    #[arg(long = "http-query-param", value_name = "KEY=VALUE")]
    http_query_params: Vec<String>,

    /// Ignore proxy environment variables
    #[arg(long)]
    http_ignore_env: bool,

    /// Do not verify TLS certificates
    #[arg(long)]
    http_no_ssl_verify: bool,

    /// Refuse Diffie-Hellman key exchange for HTTPS
    #[arg(long)]
    http_disable_dh: bool,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    http_timeout: Option<f64>,

    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "info", value_name = "LEVEL")]
    loglevel: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.loglevel));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let session = Session::new();

    if !cli.no_config {
        for (key, value) in load_options(cli.config.as_deref())? {
            debug!(key = %key, "Applying option from config file");
            session.set_option(&key, value)?;
        }
    }
    apply_flags(&session, cli)?;
    for raw in &cli.set {
        let (key, value) = parse_assignment(&session, raw)?;
        session.set_option(&key, value)?;
    }

    let output = match &cli.get {
        Some(key) => {
            let value = session
                .get_option(key)
                .ok_or_else(|| anyhow!("unknown option `{key}`"))?;
            serde_json::to_string_pretty(&value)?
        }
        None => {
            let items: IndexMap<String, OptionValue> =
                session.options().items().into_iter().collect();
            serde_json::to_string_pretty(&items)?
        }
    };
    println!("{output}");

    session.close();
    Ok(())
}

fn apply_flags(session: &Session, cli: &Cli) -> Result<()> {
    if let Some(interface) = &cli.interface {
        session.set_option("interface", interface.as_str())?;
    }
    if cli.ipv4 {
        session.set_option("ipv4", true)?;
    }
    if cli.ipv6 {
        session.set_option("ipv6", true)?;
    }
    if let Some(proxy) = &cli.http_proxy {
        session.set_option("http-proxy", proxy.as_str())?;
    }
    if let Some(proxy) = &cli.https_proxy {
        session.set_option("https-proxy", proxy.as_str())?;
    }
    for (key, pairs) in [
        ("http-cookies", &cli.http_cookies),
        ("http-headers", &cli.http_headers),
        ("http-query-params", &cli.http_query_params),
    ] {
        for pair in pairs {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("expected KEY=VALUE for `{key}`, got {pair:?}"))?;
            let map = [(name.trim().to_string(), value.trim().to_string())]
                .into_iter()
                .collect::<streamtap::OrderedMap>();
            session.set_option(key, map)?;
        }
    }
    if cli.http_ignore_env {
        session.set_option("http-trust-env", false)?;
    }
    if cli.http_no_ssl_verify {
        session.set_option("http-ssl-verify", false)?;
    }
    if cli.http_disable_dh {
        session.set_option("http-disable-dh", true)?;
    }
    if let Some(timeout) = cli.http_timeout {
        session.set_option("http-timeout", timeout)?;
    }
    Ok(())
}

/// Split `KEY=VALUE` and parse VALUE like the key's default.
fn parse_assignment(session: &Session, raw: &str) -> Result<(String, OptionValue)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("expected KEY=VALUE, got {raw:?}");
    };
    let key = key.trim();
    let canonical = catalog::alias_for(key).map_or(key, |alias| alias.new);
    // Booleans win even when the verify default is a bundle path.
    let value = if canonical == "http-ssl-verify" {
        OptionValue::parse_verify(value)
    } else {
        let default = session.options().default_value(canonical).cloned();
        OptionValue::parse_for(default.as_ref(), value)
            .map_err(|message| anyhow!("invalid value for `{key}`: {message}"))?
    };
    Ok((key.to_string(), value))
}
