//! Transport adapters and their connection pools.
//!
//! An adapter is mounted at a URL prefix inside the [`HttpClient`]. The
//! built-in [`HttpAdapter`] owns a [`ConnectionPool`]: a lazily built
//! `reqwest::Client` keyed on the settings it was built with. Changing
//! any of those settings (proxies, verification, client certificate,
//! source address) rebuilds the client and drops the old pool.
//!
//! [`HttpClient`]: super::HttpClient

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::Client;
use tracing::{debug, info};

use super::tls::{self, ClientCert, TlsProfile, Verify};
use crate::error::HttpError;
use crate::resolver::{PolicyResolver, ResolverPolicy};

type Result<T> = std::result::Result<T, HttpError>;

/// Client-level settings a pool's `reqwest::Client` is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    pub http_proxy: Option<String>,
    pub https_proxy: Option<String>,
    pub trust_env: bool,
    pub verify: Verify,
    pub cert: Option<ClientCert>,
}

/// Everything an adapter needs to hand out a client.
#[derive(Debug, Clone)]
pub struct PoolContext {
    pub settings: PoolSettings,
    pub resolver: Arc<ResolverPolicy>,
}

/// A transport mounted at a URL prefix.
pub trait Transport: Send + Sync + fmt::Debug {
    /// Short lowercase adapter name (e.g. `"default"`, `"no-dh"`).
    fn name(&self) -> &'static str;

    /// The connection pool backing this adapter, if it has one.
    fn pool(&self) -> Option<&ConnectionPool> {
        None
    }

    /// A client for issuing a request with the given settings.
    fn client(&self, ctx: &PoolContext) -> Result<Client>;

    /// Drop pooled connections. The adapter must not serve new requests.
    fn close(&self);
}

#[derive(Debug)]
enum PoolState {
    Idle,
    Open {
        settings: PoolSettings,
        source_address: Option<IpAddr>,
        client: Client,
    },
    Closed,
}

/// Lazily built, settings-keyed `reqwest::Client`.
#[derive(Debug)]
pub struct ConnectionPool {
    source_address: Mutex<Option<IpAddr>>,
    state: Mutex<PoolState>,
}

impl ConnectionPool {
    pub fn new() -> Self {
        Self {
            source_address: Mutex::new(None),
            state: Mutex::new(PoolState::Idle),
        }
    }

    /// Local address outgoing connections bind to, with an ephemeral port.
    pub fn source_address(&self) -> Option<SocketAddr> {
        self.source_address.lock().map(|ip| SocketAddr::new(ip, 0))
    }

    /// Bind (or with `None`, unbind) outgoing connections. Takes effect on
    /// the next request.
    pub fn set_source_address(&self, address: Option<IpAddr>) {
        *self.source_address.lock() = address;
    }

    pub fn is_open(&self) -> bool {
        matches!(*self.state.lock(), PoolState::Open { .. })
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self.state.lock(), PoolState::Closed)
    }

    /// Return the cached client, rebuilding it when `settings` or the
    /// source address changed since it was built.
    pub fn get_or_build<F>(&self, prefix: &str, settings: &PoolSettings, build: F) -> Result<Client>
    where
        F: FnOnce(&PoolSettings, Option<IpAddr>) -> Result<Client>,
    {
        let source_address = *self.source_address.lock();
        let mut state = self.state.lock();
        match &*state {
            PoolState::Closed => {
                return Err(HttpError::PoolClosed {
                    prefix: prefix.to_string(),
                })
            }
            PoolState::Open {
                settings: built_with,
                source_address: bound,
                client,
            } if built_with == settings && *bound == source_address => {
                return Ok(client.clone());
            }
            PoolState::Open { .. } => debug!(prefix, "Pool settings changed, rebuilding client"),
            PoolState::Idle => debug!(prefix, "Building pool client"),
        }

        let client = build(settings, source_address)?;
        *state = PoolState::Open {
            settings: settings.clone(),
            source_address,
            client: client.clone(),
        };
        Ok(client)
    }

    /// Drop the pooled client. Requests already holding it finish normally.
    pub fn close(&self) {
        *self.state.lock() = PoolState::Closed;
    }
}

impl Default for ConnectionPool {
    fn default() -> Self {
        Self::new()
    }
}

/// The built-in pool-backed adapter.
#[derive(Debug)]
pub struct HttpAdapter {
    profile: TlsProfile,
    pool: ConnectionPool,
}

impl HttpAdapter {
    /// Adapter using reqwest's default rustls setup.
    pub fn new() -> Self {
        Self::with_profile(TlsProfile::Default)
    }

    /// Adapter that refuses finite-field Diffie-Hellman key exchange.
    pub fn no_dh() -> Self {
        Self::with_profile(TlsProfile::NoDiffieHellman)
    }

    pub fn with_profile(profile: TlsProfile) -> Self {
        Self {
            profile,
            pool: ConnectionPool::new(),
        }
    }

    pub fn profile(&self) -> TlsProfile {
        self.profile
    }

    fn build(&self, ctx: &PoolContext, source_address: Option<IpAddr>) -> Result<Client> {
        let settings = &ctx.settings;
        let mut builder = Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            .brotli(true)
            .zstd(true)
            .gzip(true)
            .deflate(true)
            .connect_timeout(Duration::from_secs(10))
            .redirect(reqwest::redirect::Policy::limited(10))
            .local_address(source_address)
            .dns_resolver(Arc::new(PolicyResolver::new(Arc::clone(&ctx.resolver))));

        if !settings.trust_env {
            builder = builder.no_proxy();
        }
        if let Some(proxy) = &settings.http_proxy {
            builder = builder.proxy(reqwest::Proxy::http(proxy)?);
        }
        if let Some(proxy) = &settings.https_proxy {
            builder = builder.proxy(reqwest::Proxy::https(proxy)?);
        }

        builder = match self.profile {
            TlsProfile::Default => {
                tls::configure_default(builder, &settings.verify, settings.cert.as_ref())?
            }
            TlsProfile::NoDiffieHellman => builder.use_preconfigured_tls(tls::no_dh_config(
                &settings.verify,
                settings.cert.as_ref(),
            )?),
        };

        info!(adapter = self.name(), source = ?source_address, "Opened connection pool");
        Ok(builder.build()?)
    }
}

impl Default for HttpAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpAdapter {
    fn name(&self) -> &'static str {
        match self.profile {
            TlsProfile::Default => "default",
            TlsProfile::NoDiffieHellman => "no-dh",
        }
    }

    fn pool(&self) -> Option<&ConnectionPool> {
        Some(&self.pool)
    }

    fn client(&self, ctx: &PoolContext) -> Result<Client> {
        self.pool
            .get_or_build(self.name(), &ctx.settings, |_, source| self.build(ctx, source))
    }

    fn close(&self) {
        self.pool.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn settings() -> PoolSettings {
        PoolSettings {
            http_proxy: None,
            https_proxy: None,
            trust_env: false,
            verify: Verify::System,
            cert: None,
        }
    }

    fn counting_build(
        count: &AtomicUsize,
    ) -> impl FnOnce(&PoolSettings, Option<IpAddr>) -> Result<Client> + '_ {
        move |_, _| {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(Client::new())
        }
    }

    #[test]
    fn pool_reuses_client_for_same_settings() {
        let pool = ConnectionPool::new();
        let builds = AtomicUsize::new(0);
        pool.get_or_build("https://", &settings(), counting_build(&builds)).unwrap();
        pool.get_or_build("https://", &settings(), counting_build(&builds)).unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(pool.is_open());
    }

    #[test]
    fn pool_rebuilds_on_settings_change() {
        let pool = ConnectionPool::new();
        let builds = AtomicUsize::new(0);
        pool.get_or_build("https://", &settings(), counting_build(&builds)).unwrap();
        let mut changed = settings();
        changed.verify = Verify::Disabled;
        pool.get_or_build("https://", &changed, counting_build(&builds)).unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn pool_rebuilds_on_source_address_change() {
        let pool = ConnectionPool::new();
        let builds = AtomicUsize::new(0);
        pool.get_or_build("https://", &settings(), counting_build(&builds)).unwrap();
        pool.set_source_address(Some(IpAddr::V4(Ipv4Addr::LOCALHOST)));
        pool.get_or_build("https://", &settings(), counting_build(&builds)).unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn source_address_uses_ephemeral_port() {
        let pool = ConnectionPool::new();
        assert_eq!(pool.source_address(), None);
        pool.set_source_address(Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))));
        assert_eq!(
            pool.source_address(),
            Some(SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)), 0))
        );
    }

    #[test]
    fn closed_pool_refuses_new_clients() {
        let pool = ConnectionPool::new();
        pool.close();
        assert!(pool.is_closed());
        let err = pool
            .get_or_build("https://", &settings(), |_, _| Ok(Client::new()))
            .unwrap_err();
        assert!(matches!(err, HttpError::PoolClosed { .. }));
    }

    #[test]
    fn adapter_names() {
        assert_eq!(HttpAdapter::new().name(), "default");
        assert_eq!(HttpAdapter::no_dh().name(), "no-dh");
        assert_eq!(HttpAdapter::no_dh().profile(), TlsProfile::NoDiffieHellman);
    }

    #[test]
    fn adapter_builds_client_lazily() {
        let adapter = HttpAdapter::new();
        assert!(!adapter.pool.is_open());
        let ctx = PoolContext {
            settings: settings(),
            resolver: Arc::new(ResolverPolicy::new()),
        };
        adapter.client(&ctx).unwrap();
        assert!(adapter.pool.is_open());
    }
}
