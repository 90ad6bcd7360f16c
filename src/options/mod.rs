//! Session options.
//!
//! [`SessionOptions`] layers the option catalog, the hook tables and the
//! deprecated-key table over a plain [`OptionStore`]:
//!
//! - deprecated keys are routed to their replacement with a
//!   [`DeprecationWarning`](crate::deprecation::DeprecationWarning);
//! - keys with a setter hook mutate the [`HttpClient`] or the resolver
//!   policy before anything is recorded;
//! - keys whose value lives in the HTTP client are always read from it, so
//!   a plugin that changes the client directly is reflected in `get`.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use streamtap::http::{HttpClient, Verify};
//! use streamtap::options::SessionOptions;
//! use streamtap::resolver::ResolverPolicy;
//!
//! # fn example() -> streamtap::error::Result<()> {
//! let http = Arc::new(HttpClient::new(Arc::new(ResolverPolicy::new()), Verify::System));
//! let mut options = SessionOptions::new(Arc::clone(&http));
//! options.set("http-proxy", "proxy.example:8080")?;
//! assert_eq!(http.proxies().https.as_deref(), Some("https://proxy.example:8080"));
//! # Ok(())
//! # }
//! ```

pub mod catalog;
mod hooks;
pub mod store;

use std::sync::Arc;

use tracing::debug;

pub use catalog::{Alias, Category, DefaultValue, OptionSpec, ALIASES, CATALOG};
pub use hooks::normalize_proxy_url;
pub use store::OptionStore;

use crate::deprecation::{CallSite, DeprecationReporter, WarningPath};
use crate::error::{OptionError, Result};
use crate::http::HttpClient;
use crate::resolver::{AddressFamily, FamilyLease};
use crate::value::OptionValue;

/// The option store of one session, bound to that session's HTTP client.
#[derive(Debug)]
pub struct SessionOptions {
    store: OptionStore,
    http: Arc<HttpClient>,
    lease: FamilyLease,
    reporter: Arc<DeprecationReporter>,
}

impl SessionOptions {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self::with_reporter(http, Arc::new(DeprecationReporter::new()))
    }

    pub fn with_reporter(http: Arc<HttpClient>, reporter: Arc<DeprecationReporter>) -> Self {
        let lease = http.resolver().lease();
        let mut options = Self {
            store: OptionStore::default(),
            http,
            lease,
            reporter,
        };
        let site = CallSite::here();
        let defaults: Vec<(&str, OptionValue)> = CATALOG
            .iter()
            .map(|spec| {
                let value = spec.default.to_value().unwrap_or_else(|| {
                    hooks::getter(spec.key)
                        .map_or(OptionValue::Null, |get| get(&options, spec.key, site))
                });
                (spec.key, value)
            })
            .collect();
        options.store = OptionStore::new(defaults);
        options
    }

    /// Current value of `key`; `None` if the key is unknown.
    #[track_caller]
    pub fn get(&self, key: &str) -> Option<OptionValue> {
        self.get_at(key, CallSite::here())
    }

    /// Write `key`, running its setter hook if it has one.
    #[track_caller]
    pub fn set(&mut self, key: &str, value: impl Into<OptionValue>) -> Result<()> {
        self.set_at(key, value.into(), CallSite::here())
    }

    /// Write straight to the store, skipping hooks and aliases.
    pub fn set_explicit(&mut self, key: &str, value: impl Into<OptionValue>) {
        self.store.set_explicit(key, value.into());
    }

    /// [`set`](Self::set) every pair in order, stopping at the first error.
    #[track_caller]
    pub fn update<K, V, I>(&mut self, values: I) -> Result<()>
    where
        K: AsRef<str>,
        V: Into<OptionValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        let site = CallSite::here();
        for (key, value) in values {
            self.set_at(key.as_ref(), value.into(), site)?;
        }
        Ok(())
    }

    /// Every known key with its current value, defaults included.
    pub fn items(&self) -> Vec<(String, OptionValue)> {
        let site = CallSite::here();
        self.store
            .items()
            .map(|(key, value)| {
                let value = match hooks::getter(key) {
                    Some(get) => get(self, key, site),
                    None => value.clone(),
                };
                (key.to_string(), value)
            })
            .collect()
    }

    /// Whether `key` has been written since the session was created.
    pub fn is_explicit(&self, key: &str) -> bool {
        let key = catalog::alias_for(key).map_or(key, |alias| alias.new);
        self.store.is_explicit(key)
    }

    pub fn default_value(&self, key: &str) -> Option<&OptionValue> {
        self.store.default_value(key)
    }

    pub fn defaults(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.store.defaults()
    }

    pub fn http(&self) -> &Arc<HttpClient> {
        &self.http
    }

    pub fn reporter(&self) -> &Arc<DeprecationReporter> {
        &self.reporter
    }

    /// The address family this session pinned, if any.
    pub fn address_family(&self) -> Option<AddressFamily> {
        self.lease.family()
    }

    pub(crate) fn get_at(&self, key: &str, site: CallSite) -> Option<OptionValue> {
        if let Some(alias) = catalog::alias_for(key) {
            let value = (alias.read)(self.get_at(alias.new, site)?).ok()?;
            self.reporter
                .report(alias.old, Some(alias.new), WarningPath::Get, site);
            return Some(value);
        }
        match hooks::getter(key) {
            Some(get) => Some(get(self, key, site)),
            None => self.store.get(key),
        }
    }

    pub(crate) fn set_at(&mut self, key: &str, value: OptionValue, site: CallSite) -> Result<()> {
        let (key, value) = match catalog::alias_for(key) {
            Some(alias) => {
                let value = (alias.transform)(value)
                    .map_err(|message| OptionError::invalid(alias.old, message))?;
                self.reporter
                    .report(alias.old, Some(alias.new), WarningPath::Set, site);
                (alias.new, value)
            }
            None => (key, value),
        };

        match hooks::setter(key) {
            Some(set) => {
                debug!(key, "Dispatching option setter");
                set(self, key, value, site)?;
                self.store.mark_explicit(key);
            }
            None => self.store.set(key, value),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{ProxyScheme, Verify};
    use crate::resolver::ResolverPolicy;
    use crate::value::OrderedMap;

    fn options() -> SessionOptions {
        let http = HttpClient::new(Arc::new(ResolverPolicy::new()), Verify::System);
        SessionOptions::new(Arc::new(http))
    }

    #[test]
    fn catalog_defaults() {
        let options = options();
        assert_eq!(options.get("hls-live-edge"), Some(OptionValue::Int(3)));
        assert_eq!(options.get("ipv4"), Some(OptionValue::Bool(false)));
        assert_eq!(options.get("interface"), Some(OptionValue::Null));
        assert_eq!(options.get("http-timeout"), Some(OptionValue::Float(20.0)));
        assert_eq!(options.get("http-ssl-verify"), Some(OptionValue::Bool(true)));
        assert_eq!(options.get("http-proxy"), Some(OptionValue::Null));
        assert_eq!(options.get("no-such-option"), None);
    }

    #[test]
    fn client_defaults_are_snapshotted() {
        let options = options();
        assert_eq!(options.default_value("http-trust-env"), Some(&OptionValue::Bool(true)));
        assert!(matches!(
            options.default_value("http-headers"),
            Some(OptionValue::Map(m)) if m.contains_key("User-Agent")
        ));
    }

    #[test]
    fn plain_keys_use_store() {
        let mut options = options();
        options.set("hls-live-edge", 5).unwrap();
        assert_eq!(options.get("hls-live-edge"), Some(OptionValue::Int(5)));
        assert!(options.is_explicit("hls-live-edge"));
        assert!(!options.is_explicit("hls-live-restart"));
    }

    #[test]
    fn hooked_keys_are_marked_explicit() {
        let mut options = options();
        options.set("http-timeout", 5.0).unwrap();
        assert!(options.is_explicit("http-timeout"));
    }

    #[test]
    fn http_keys_read_through_to_client() {
        let options = options();
        options.http().set_timeout(42.0);
        let mut cookies = OrderedMap::new();
        cookies.insert("sid".into(), "x".into());
        options.http().merge_cookies(cookies.clone());
        assert_eq!(options.get("http-timeout"), Some(OptionValue::Float(42.0)));
        assert_eq!(options.get("http-cookies"), Some(OptionValue::Map(cookies)));
    }

    #[test]
    fn invalid_value_leaves_store_untouched() {
        let mut options = options();
        let err = options.set("ipv4", "yes").unwrap_err();
        assert_eq!(err.key(), "ipv4");
        assert!(!options.is_explicit("ipv4"));
        assert_eq!(options.get("ipv4"), Some(OptionValue::Bool(false)));
    }

    #[test]
    fn timeout_must_be_positive() {
        let mut options = options();
        assert!(options.set("http-timeout", 0.0).is_err());
        assert!(options.set("http-timeout", -1).is_err());
        options.set("http-timeout", 3).unwrap();
        assert_eq!(options.get("http-timeout"), Some(OptionValue::Float(3.0)));
    }

    #[test]
    fn empty_proxy_clears_both_slots() {
        let mut options = options();
        options.set("http-proxy", "p:1").unwrap();
        options.set("http-proxy", "").unwrap();
        assert_eq!(options.http().proxy(ProxyScheme::Http), None);
        assert_eq!(options.http().proxy(ProxyScheme::Https), None);
        options.set("http-proxy", "p:1").unwrap();
        options.set("http-proxy", OptionValue::Null).unwrap();
        assert_eq!(options.get("http-proxy"), Some(OptionValue::Null));
    }

    #[test]
    fn non_string_proxy_is_rejected() {
        let mut options = options();
        assert!(matches!(
            options.set("http-proxy", 8080),
            Err(OptionError::InvalidValue { .. })
        ));
    }

    #[test]
    fn unsupported_proxy_scheme_is_rejected() {
        let mut options = options();
        options.set("http-proxy", "socks5h://127.0.0.1:9050").unwrap();
        let err = options.set("http-proxy", "ftp://p:21").unwrap_err();
        assert!(err.to_string().contains("unsupported proxy scheme `ftp`"), "{err}");
        assert_eq!(
            options.get("http-proxy"),
            Some(OptionValue::from("socks5h://127.0.0.1:9050"))
        );
    }

    #[test]
    fn query_params_use_ampersand() {
        let mut options = options();
        options.set("http-query-params", "a=1&b=2").unwrap();
        assert_eq!(options.http().params().get("b").map(String::as_str), Some("2"));
    }

    #[test]
    fn invalid_header_is_rejected_before_merge() {
        let mut options = options();
        let before = options.http().headers();
        assert!(options.set("http-headers", "Good=1; Bad Name=2").is_err());
        assert_eq!(options.http().headers(), before);
    }

    #[test]
    fn ssl_cert_shapes() {
        let mut options = options();
        options.set("http-ssl-cert", "/tmp/client.pem").unwrap();
        assert_eq!(options.get("http-ssl-cert"), Some(OptionValue::from("/tmp/client.pem")));
        options
            .set("http-ssl-cert", vec!["/tmp/c.crt", "/tmp/c.key"])
            .unwrap();
        assert_eq!(
            options.get("http-ssl-cert"),
            Some(OptionValue::from(vec!["/tmp/c.crt", "/tmp/c.key"]))
        );
        assert!(options.set("http-ssl-cert", vec!["/only/one"]).is_err());
        options.set("http-ssl-cert", OptionValue::Null).unwrap();
        assert_eq!(options.get("http-ssl-cert"), Some(OptionValue::Null));
    }

    #[test]
    fn ssl_verify_accepts_bundle_path() {
        let mut options = options();
        options.set("http-ssl-verify", "/etc/ssl/ca.pem").unwrap();
        assert_eq!(
            options.http().verify(),
            Verify::Bundle("/etc/ssl/ca.pem".into())
        );
        assert_eq!(options.get("http-ssl-verify"), Some(OptionValue::from("/etc/ssl/ca.pem")));
    }

    #[test]
    fn negated_alias_reads_back_negated() {
        let mut options = options();
        options.set("http-no-ssl-verify", true).unwrap();
        assert_eq!(options.get("http-ssl-verify"), Some(OptionValue::Bool(false)));
        assert_eq!(options.get("http-no-ssl-verify"), Some(OptionValue::Bool(true)));
        assert!(options.is_explicit("http-no-ssl-verify"));
    }

    #[test]
    fn ad_hoc_keys_round_trip() {
        let mut options = options();
        options.set("twitch-api-header", "Client-ID=abc").unwrap();
        assert_eq!(options.get("twitch-api-header"), Some(OptionValue::from("Client-ID=abc")));
        assert!(options.items().iter().any(|(k, _)| k == "twitch-api-header"));
    }

    #[test]
    fn update_stops_at_first_error() {
        let mut options = options();
        let result = options.update([
            ("hls-live-edge", OptionValue::Int(9)),
            ("ipv6", OptionValue::from("nope")),
            ("hls-duration", OptionValue::Float(1.0)),
        ]);
        assert!(result.is_err());
        assert_eq!(options.get("hls-live-edge"), Some(OptionValue::Int(9)));
        assert_eq!(options.get("hls-duration"), Some(OptionValue::Null));
    }

    #[test]
    fn items_reflect_client_state() {
        let mut options = options();
        options.set("http-trust-env", false).unwrap();
        let items = options.items();
        let trust = items.iter().find(|(k, _)| k == "http-trust-env").map(|(_, v)| v);
        assert_eq!(trust, Some(&OptionValue::Bool(false)));
        assert_eq!(items.len(), CATALOG.len());
    }

    #[test]
    fn list_option_wraps_scalar() {
        let mut options = options();
        options.set("hls-audio-select", "en").unwrap();
        assert_eq!(options.get("hls-audio-select"), Some(OptionValue::from(vec!["en"])));
    }
}
