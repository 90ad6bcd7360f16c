//! The session façade plugins receive.
//!
//! A [`Session`] owns one [`HttpClient`], the [`SessionOptions`] bound to
//! it and a [`PluginRegistry`]. Every method takes `&self`, so a session
//! can be shared with plugins by reference while they configure it.
//!
//! # Example
//!
//! ```rust,no_run
//! use streamtap::Session;
//!
//! # fn example() -> streamtap::error::Result<()> {
//! let session = Session::new();
//! session.set_option("http-headers", "Referer=https://example.com/")?;
//! session.set_option("ipv4", true)?;
//! assert_eq!(session.get_option("ipv6").and_then(|v| v.as_bool()), Some(false));
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result as AnyResult;
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::deprecation::{CallSite, DeprecationReporter, DeprecationWarning};
use crate::error::{NoPluginError, Result};
use crate::http::{HttpClient, Verify};
use crate::options::SessionOptions;
use crate::plugin::{Plugin, PluginRegistry, Streams};
use crate::resolver::ResolverPolicy;
use crate::value::OptionValue;

/// Decides the initial `http-ssl-verify` value. Consulted once, when the
/// session is built.
pub trait CaBundleLocator: Send + Sync {
    fn locate(&self) -> Verify;
}

/// Uses the file named by `SSL_CERT_FILE` when it exists, system roots
/// otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCaBundle;

impl CaBundleLocator for EnvCaBundle {
    fn locate(&self) -> Verify {
        match std::env::var_os("SSL_CERT_FILE").map(PathBuf::from) {
            Some(path) if path.is_file() => {
                debug!(path = %path.display(), "Using CA bundle from SSL_CERT_FILE");
                Verify::Bundle(path)
            }
            _ => Verify::System,
        }
    }
}

impl<F> CaBundleLocator for F
where
    F: Fn() -> Verify + Send + Sync,
{
    fn locate(&self) -> Verify {
        self()
    }
}

/// Top-level handle shared with plugins.
#[derive(Debug)]
pub struct Session {
    http: Arc<HttpClient>,
    options: Mutex<SessionOptions>,
    plugins: PluginRegistry,
}

impl Session {
    /// Session on the process-wide resolver policy with the environment's
    /// CA bundle.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    /// The session's HTTP client.
    pub fn http(&self) -> &Arc<HttpClient> {
        &self.http
    }

    /// Lock the options for direct access.
    ///
    /// Deprecation warnings raised through the returned guard point at its
    /// caller and do not count the session frame.
    pub fn options(&self) -> MutexGuard<'_, SessionOptions> {
        self.options.lock()
    }

    /// Current value of `key`; `None` if the key is unknown.
    #[track_caller]
    pub fn get_option(&self, key: &str) -> Option<OptionValue> {
        let site = CallSite::here().through_session();
        self.options.lock().get_at(key, site)
    }

    /// Write `key`, applying its side effects on the HTTP client and the
    /// resolver policy.
    #[track_caller]
    pub fn set_option(&self, key: &str, value: impl Into<OptionValue>) -> Result<()> {
        let site = CallSite::here().through_session();
        self.options.lock().set_at(key, value.into(), site)
    }

    pub fn register_plugin(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.register(plugin);
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    /// The plugin that handles `url`.
    pub fn resolve_url(&self, url: &str) -> std::result::Result<Arc<dyn Plugin>, NoPluginError> {
        self.plugins.resolve(url).ok_or_else(|| NoPluginError {
            url: url.to_string(),
        })
    }

    /// Ask the matching plugin for the streams behind `url`.
    pub async fn streams(&self, url: &str) -> AnyResult<Streams> {
        let plugin = self.resolve_url(url)?;
        let streams = plugin.streams(self, url).await?;
        info!(plugin = plugin.name(), count = streams.len(), "Found streams");
        Ok(streams)
    }

    /// Warnings recorded for deprecated keys used on this session.
    pub fn deprecations(&self) -> Vec<DeprecationWarning> {
        self.options.lock().reporter().warnings()
    }

    /// Close every mounted adapter. The resolver pin is released when the
    /// session is dropped.
    pub fn close(&self) {
        debug!("Closing session");
        self.http.close();
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`Session`].
#[derive(Default)]
pub struct SessionBuilder {
    resolver: Option<Arc<ResolverPolicy>>,
    ca_locator: Option<Box<dyn CaBundleLocator>>,
    reporter: Option<Arc<DeprecationReporter>>,
    plugins: PluginRegistry,
}

impl SessionBuilder {
    /// Use `policy` instead of the process-wide resolver policy.
    #[must_use]
    pub fn resolver(mut self, policy: Arc<ResolverPolicy>) -> Self {
        self.resolver = Some(policy);
        self
    }

    #[must_use]
    pub fn ca_locator(mut self, locator: impl CaBundleLocator + 'static) -> Self {
        self.ca_locator = Some(Box::new(locator));
        self
    }

    #[must_use]
    pub fn reporter(mut self, reporter: Arc<DeprecationReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    #[must_use]
    pub fn plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.register(plugin);
        self
    }

    pub fn build(self) -> Session {
        let resolver = self.resolver.unwrap_or_else(ResolverPolicy::global);
        let verify = match &self.ca_locator {
            Some(locator) => locator.locate(),
            None => EnvCaBundle.locate(),
        };
        let http = Arc::new(HttpClient::new(resolver, verify));
        let reporter = self.reporter.unwrap_or_default();
        let options = SessionOptions::with_reporter(Arc::clone(&http), reporter);
        debug!(plugins = self.plugins.len(), "Created session");

        Session {
            http,
            options: Mutex::new(options),
            plugins: self.plugins,
        }
    }
}

impl std::fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("resolver", &self.resolver)
            .field("ca_locator", &self.ca_locator.is_some())
            .field("plugins", &self.plugins)
            .finish_non_exhaustive()
    }
}
