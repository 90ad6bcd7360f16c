//! Error types shared by the session, option and HTTP layers.

use std::path::PathBuf;

use thiserror::Error;

use crate::resolver::AddressFamily;

/// Errors raised while writing an option.
///
/// A failed write never touches the option store; side effects a hook
/// applied before failing are not rolled back.
#[derive(Error, Debug)]
pub enum OptionError {
    #[error("invalid value for `{key}`: {message}")]
    InvalidValue { key: String, message: String },

    #[error("invalid value for `{key}`: {source}")]
    Resolver {
        key: String,
        #[source]
        source: ResolverError,
    },
}

impl OptionError {
    pub(crate) fn invalid(key: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            message: message.into(),
        }
    }

    /// The option key the error was raised for.
    pub fn key(&self) -> &str {
        match self {
            Self::InvalidValue { key, .. } | Self::Resolver { key, .. } => key,
        }
    }
}

/// Errors from the process-wide address family policy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolverError {
    #[error("cannot restrict name resolution to {requested}: {pinned} is already pinned by another session")]
    Conflict {
        requested: AddressFamily,
        pinned: AddressFamily,
    },
}

/// HTTP client errors
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Invalid header {name}: {message}")]
    InvalidHeader { name: String, message: String },

    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid PEM data in {path}: {message}")]
    Pem { path: PathBuf, message: String },

    #[error("Connection pool for {prefix} has been closed")]
    PoolClosed { prefix: String },

    #[error("No transport adapter mounted for {url}")]
    NoAdapter { url: String },
}

/// No registered plugin claims a URL.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("No plugin can handle URL: {url}")]
pub struct NoPluginError {
    pub url: String,
}

pub type Result<T> = std::result::Result<T, OptionError>;
