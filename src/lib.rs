//! `streamtap` - Session, options and HTTP policy for stream extractors
//!
//! # Features
//!
//! - **Typed options**: a central catalog of option keys with defaults,
//!   explicit-set tracking and deprecated-key aliases
//! - **Live HTTP policy**: option writes rewire proxies, swap TLS adapters,
//!   bind source addresses and merge default headers, cookies and params
//! - **Address family pinning**: `ipv4`/`ipv6` restrict DNS results for
//!   every connection pool through a shared resolver policy
//! - **Plugin surface**: plugins receive a [`Session`] and return named
//!   streams
//!
//! # Example
//!
//! ```rust,no_run
//! use streamtap::Session;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let session = Session::new();
//!     session.set_option("http-proxy", "proxy.example:8080")?;
//!     session.set_option("http-headers", "Referer=https://example.com/")?;
//!     let page = session.http().fetch_text("https://example.com").await?;
//!     println!("Fetched {} bytes", page.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod deprecation;
pub mod error;
pub mod http;
pub mod options;
pub mod plugin;
pub mod resolver;
pub mod session;
pub mod value;

pub use deprecation::{CallSite, DeprecationReporter, DeprecationWarning, WarningPath};
pub use error::{HttpError, NoPluginError, OptionError, ResolverError};
pub use http::{HttpClient, RequestOptions, Verify};
pub use options::SessionOptions;
pub use plugin::{Plugin, PluginRegistry, Streams, UserInputRequester};
pub use resolver::{AddressFamily, ResolverPolicy};
pub use session::{CaBundleLocator, EnvCaBundle, Session, SessionBuilder};
pub use value::{OptionValue, OrderedMap};

/// Version of streamtap
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
