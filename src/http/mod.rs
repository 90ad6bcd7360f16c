//! Session HTTP client
//!
//! Features:
//! - Shared proxy table (http and https slots always equal)
//! - Default headers, cookies and query params merged into every request
//! - Per-request timeout, TLS verification and client certificates
//! - Swappable transport adapters mounted at URL prefixes
//! - Source address binding and address-family-aware DNS per pool
//!
//! Plugins reach the client through [`Session::http`](crate::Session::http).
//! Every mutator takes `&self` and is idempotent; changes apply to the
//! next request.

pub mod adapter;
pub mod tls;

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, COOKIE};
use reqwest::{Method, Response};
use tracing::{debug, info, instrument};
use url::Url;

pub use adapter::{ConnectionPool, HttpAdapter, PoolContext, PoolSettings, Transport};
pub use tls::{ClientCert, TlsProfile, Verify};

use crate::error::HttpError;
use crate::resolver::ResolverPolicy;
use crate::value::OrderedMap;

type Result<T> = std::result::Result<T, HttpError>;

/// User-Agent sent unless a plugin or option overrides it.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT: f64 = 20.0;

/// URL scheme of a proxy slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyScheme {
    Http,
    Https,
}

/// The proxy table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Proxies {
    pub http: Option<String>,
    pub https: Option<String>,
}

impl Proxies {
    pub fn get(&self, scheme: ProxyScheme) -> Option<&str> {
        match scheme {
            ProxyScheme::Http => self.http.as_deref(),
            ProxyScheme::Https => self.https.as_deref(),
        }
    }
}

/// Per-request overrides; every field wins over the client state.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: OrderedMap,
    pub cookies: OrderedMap,
    pub params: OrderedMap,
    pub timeout: Option<Duration>,
    pub body: Option<Vec<u8>>,
    pub json: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
struct ClientState {
    proxies: Proxies,
    headers: OrderedMap,
    cookies: OrderedMap,
    params: OrderedMap,
    verify: Verify,
    cert: Option<ClientCert>,
    timeout: f64,
    trust_env: bool,
    source_address: Option<IpAddr>,
}

impl ClientState {
    fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            http_proxy: self.proxies.http.clone(),
            https_proxy: self.proxies.https.clone(),
            trust_env: self.trust_env,
            verify: self.verify.clone(),
            cert: self.cert.clone(),
        }
    }
}

/// HTTP client owned by a session.
#[derive(Debug)]
pub struct HttpClient {
    state: RwLock<ClientState>,
    /// Mounted adapters, longest prefix first.
    adapters: RwLock<Vec<(String, Arc<dyn Transport>)>>,
    resolver: Arc<ResolverPolicy>,
}

impl HttpClient {
    /// Create a client with default adapters mounted at `https://` and
    /// `http://`.
    pub fn new(resolver: Arc<ResolverPolicy>, verify: Verify) -> Self {
        let mut headers = OrderedMap::new();
        headers.insert("User-Agent".to_string(), DEFAULT_USER_AGENT.to_string());
        headers.insert("Accept".to_string(), "*/*".to_string());

        let client = Self {
            state: RwLock::new(ClientState {
                proxies: Proxies::default(),
                headers,
                cookies: OrderedMap::new(),
                params: OrderedMap::new(),
                verify,
                cert: None,
                timeout: DEFAULT_TIMEOUT,
                trust_env: true,
                source_address: None,
            }),
            adapters: RwLock::new(Vec::new()),
            resolver,
        };
        client.mount("https://", Arc::new(HttpAdapter::new()));
        client.mount("http://", Arc::new(HttpAdapter::new()));
        client
    }

    pub fn resolver(&self) -> &Arc<ResolverPolicy> {
        &self.resolver
    }

    // ─── Proxies ────────────────────────────────────────────────────────────

    pub fn proxies(&self) -> Proxies {
        self.state.read().proxies.clone()
    }

    pub fn proxy(&self, scheme: ProxyScheme) -> Option<String> {
        self.state.read().proxies.get(scheme).map(str::to_string)
    }

    /// Route both http and https traffic through `proxy`, or neither.
    pub fn set_proxy(&self, proxy: Option<String>) {
        let mut state = self.state.write();
        state.proxies = Proxies {
            http: proxy.clone(),
            https: proxy,
        };
    }

    // ─── Headers, cookies, params ───────────────────────────────────────────

    pub fn headers(&self) -> OrderedMap {
        self.state.read().headers.clone()
    }

    /// Merge into the default headers; existing names are overwritten.
    pub fn merge_headers(&self, headers: OrderedMap) {
        self.state.write().headers.extend(headers);
    }

    pub fn cookies(&self) -> OrderedMap {
        self.state.read().cookies.clone()
    }

    pub fn merge_cookies(&self, cookies: OrderedMap) {
        self.state.write().cookies.extend(cookies);
    }

    pub fn params(&self) -> OrderedMap {
        self.state.read().params.clone()
    }

    pub fn merge_params(&self, params: OrderedMap) {
        self.state.write().params.extend(params);
    }

    // ─── TLS, environment, timeout ──────────────────────────────────────────

    pub fn verify(&self) -> Verify {
        self.state.read().verify.clone()
    }

    pub fn set_verify(&self, verify: Verify) {
        self.state.write().verify = verify;
    }

    pub fn cert(&self) -> Option<ClientCert> {
        self.state.read().cert.clone()
    }

    pub fn set_cert(&self, cert: Option<ClientCert>) {
        self.state.write().cert = cert;
    }

    pub fn trust_env(&self) -> bool {
        self.state.read().trust_env
    }

    /// Whether proxy environment variables are honored.
    pub fn set_trust_env(&self, trust_env: bool) {
        self.state.write().trust_env = trust_env;
    }

    /// Timeout in seconds.
    pub fn timeout(&self) -> f64 {
        self.state.read().timeout
    }

    pub fn set_timeout(&self, seconds: f64) {
        self.state.write().timeout = seconds;
    }

    // ─── Adapters ───────────────────────────────────────────────────────────

    pub fn source_address(&self) -> Option<IpAddr> {
        self.state.read().source_address
    }

    /// Bind every pool-backed adapter to `address` (port 0), or clear the
    /// binding. Adapters mounted later inherit it.
    pub fn set_source_address(&self, address: Option<IpAddr>) {
        self.state.write().source_address = address;
        for (_, adapter) in self.adapters.read().iter() {
            if let Some(pool) = adapter.pool() {
                pool.set_source_address(address);
            }
        }
    }

    /// Mount `adapter` at `prefix`, closing the adapter it displaces.
    pub fn mount(&self, prefix: &str, adapter: Arc<dyn Transport>) {
        if let Some(pool) = adapter.pool() {
            pool.set_source_address(self.source_address());
        }

        let displaced = {
            let mut adapters = self.adapters.write();
            if let Some(slot) = adapters.iter_mut().find(|(p, _)| p == prefix) {
                Some(std::mem::replace(&mut slot.1, Arc::clone(&adapter)))
            } else {
                adapters.push((prefix.to_string(), Arc::clone(&adapter)));
                adapters.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
                None
            }
        };

        if let Some(old) = displaced {
            old.close();
            info!(prefix, old = old.name(), new = adapter.name(), "Swapped transport adapter");
        } else {
            debug!(prefix, adapter = adapter.name(), "Mounted transport adapter");
        }
    }

    /// The adapter mounted exactly at `prefix`.
    pub fn adapter(&self, prefix: &str) -> Option<Arc<dyn Transport>> {
        self.adapters
            .read()
            .iter()
            .find(|(p, _)| p == prefix)
            .map(|(_, adapter)| Arc::clone(adapter))
    }

    /// All mounted adapters, longest prefix first.
    pub fn adapters(&self) -> Vec<(String, Arc<dyn Transport>)> {
        self.adapters.read().clone()
    }

    /// The adapter with the longest prefix matching `url`.
    pub fn adapter_for(&self, url: &str) -> Result<Arc<dyn Transport>> {
        let lowered = url.to_ascii_lowercase();
        self.adapters
            .read()
            .iter()
            .find(|(prefix, _)| lowered.starts_with(&prefix.to_ascii_lowercase()))
            .map(|(_, adapter)| Arc::clone(adapter))
            .ok_or_else(|| HttpError::NoAdapter {
                url: url.to_string(),
            })
    }

    /// Close every mounted adapter.
    pub fn close(&self) {
        for (prefix, adapter) in self.adapters.read().iter() {
            debug!(prefix, "Closing transport adapter");
            adapter.close();
        }
    }

    // ─── Requests ───────────────────────────────────────────────────────────

    /// Issue a request. `overlay` wins over client state per key.
    ///
    /// Cookies set by the response are merged back into the client.
    #[instrument(skip(self, overlay), fields(method = %method, url = %url))]
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        overlay: RequestOptions,
    ) -> Result<Response> {
        let mut target = Url::parse(url).map_err(|source| HttpError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        let (settings, mut headers, mut cookies, mut params, timeout) = {
            let state = self.state.read();
            (
                state.pool_settings(),
                state.headers.clone(),
                state.cookies.clone(),
                state.params.clone(),
                Duration::try_from_secs_f64(state.timeout)
                    .unwrap_or(Duration::from_secs_f64(DEFAULT_TIMEOUT)),
            )
        };
        headers.extend(overlay.headers);
        cookies.extend(overlay.cookies);
        params.extend(overlay.params);
        let timeout = overlay.timeout.unwrap_or(timeout);

        if !params.is_empty() {
            target.query_pairs_mut().extend_pairs(params.iter());
        }

        let adapter = self.adapter_for(target.as_str())?;
        let client = adapter.client(&PoolContext {
            settings,
            resolver: Arc::clone(&self.resolver),
        })?;

        let mut header_map = to_header_map(&headers)?;
        if !cookies.is_empty() && !header_map.contains_key(COOKIE) {
            let cookie = cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; ");
            header_map.insert(COOKIE, header_value(COOKIE.as_str(), &cookie)?);
        }

        let mut builder = client
            .request(method, target)
            .headers(header_map)
            .timeout(timeout);
        if let Some(json) = overlay.json {
            builder = builder.json(&json);
        } else if let Some(body) = overlay.body {
            builder = builder.body(body);
        }

        debug!(adapter = adapter.name(), "Sending request");
        let response = builder.send().await?;

        let received: OrderedMap = response
            .cookies()
            .map(|cookie| (cookie.name().to_string(), cookie.value().to_string()))
            .collect();
        if !received.is_empty() {
            self.merge_cookies(received);
        }

        info!(
            status = %response.status(),
            version = ?response.version(),
            "Response received"
        );
        Ok(response)
    }

    pub async fn get(&self, url: &str) -> Result<Response> {
        self.request(Method::GET, url, RequestOptions::default()).await
    }

    pub async fn post(&self, url: &str, overlay: RequestOptions) -> Result<Response> {
        self.request(Method::POST, url, overlay).await
    }

    /// Fetch and return body as string
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        Ok(self.get(url).await?.text().await?)
    }
}

/// Validate a header name/value pair.
pub(crate) fn validate_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| HttpError::InvalidHeader {
        name: name.to_string(),
        message: e.to_string(),
    })?;
    Ok((header_name, header_value(name, value)?))
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| HttpError::InvalidHeader {
        name: name.to_string(),
        message: e.to_string(),
    })
}

fn to_header_map(headers: &OrderedMap) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let (name, value) = validate_header(name, value)?;
        map.insert(name, value);
    }
    Ok(map)
}
