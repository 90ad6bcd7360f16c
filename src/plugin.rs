//! The surface plugins are written against.
//!
//! A [`Plugin`] claims page URLs and turns them into named streams using
//! the [`Session`] it is handed. The [`PluginRegistry`] checks plugins in
//! registration order and the first match wins.
//!
//! # Example
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use streamtap::plugin::{Plugin, Streams};
//! use streamtap::Session;
//!
//! struct Example;
//!
//! #[async_trait]
//! impl Plugin for Example {
//!     fn name(&self) -> &'static str {
//!         "example"
//!     }
//!
//!     fn matches(&self, url: &str) -> bool {
//!         url.contains("example.com/live/")
//!     }
//!
//!     async fn streams(&self, session: &Session, url: &str) -> anyhow::Result<Streams> {
//!         let page = session.http().fetch_text(url).await?;
//!         let mut streams = Streams::new();
//!         if let Some(manifest) = page.lines().find(|l| l.ends_with(".m3u8")) {
//!             streams.insert("best".to_string(), manifest.to_string());
//!         }
//!         Ok(streams)
//!     }
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::session::Session;

/// Stream name (`"best"`, `"720p"`, ...) to stream URL.
pub type Streams = BTreeMap<String, String>;

/// Prompts the user on behalf of a plugin.
///
/// Stored in the `user-input-requester` option. The session never calls
/// it; plugins do.
pub trait UserInputRequester: Send + Sync {
    fn ask(&self, prompt: &str) -> Result<String>;

    /// Like [`ask`](Self::ask) but the answer must not be echoed.
    fn ask_password(&self, prompt: &str) -> Result<String>;
}

/// Site-specific stream extractor.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Plugin name (e.g. "twitch", "youtube").
    fn name(&self) -> &'static str;

    /// Check if this plugin handles the given URL.
    fn matches(&self, url: &str) -> bool;

    /// Locate the streams behind `url`.
    async fn streams(&self, session: &Session, url: &str) -> Result<Streams>;
}

/// Routes URLs to plugins.
#[derive(Default, Clone)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        debug!(plugin = plugin.name(), "Registered plugin");
        self.plugins.push(plugin);
    }

    /// The first registered plugin matching `url`.
    pub fn resolve(&self, url: &str) -> Option<Arc<dyn Plugin>> {
        let plugin = self.plugins.iter().find(|p| p.matches(url))?;
        debug!("Matched plugin: {}", plugin.name());
        Some(Arc::clone(plugin))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.names())
            .finish()
    }
}
