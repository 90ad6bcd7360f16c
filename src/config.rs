//! Host option file loaded from `~/.config/streamtap/config.toml`.
//!
//! ```toml
//! [options]
//! http-proxy = "proxy.example:8080"
//! hls-live-edge = 5
//! hls-audio-select = ["en", "de"]
//!
//! [options.http-headers]
//! Referer = "https://example.com/"
//! ```
//!
//! The session itself never reads files; the binary loads this table and
//! feeds each pair to `Session::set_option` in file order.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::value::{OptionValue, OrderedMap};

/// Top-level config file.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct OptionsFile {
    #[serde(default)]
    pub options: toml::Table,
}

impl OptionsFile {
    /// Convert the `[options]` table into option pairs.
    ///
    /// # Errors
    ///
    /// Returns an error for values with no option equivalent (dates,
    /// nested tables, arrays of non-strings).
    pub fn into_pairs(self) -> Result<Vec<(String, OptionValue)>> {
        self.options
            .into_iter()
            .map(|(key, value)| {
                let value = to_option_value(&key, value)?;
                Ok((key, value))
            })
            .collect()
    }
}

/// Load option pairs from `path`, or from the default location.
///
/// A missing default file yields no pairs; a missing explicit file is an
/// error.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_options(path: Option<&Path>) -> Result<Vec<(String, OptionValue)>> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let path = config_path();
            if !path.exists() {
                return Ok(Vec::new());
            }
            path
        }
    };

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let file: OptionsFile =
        toml::from_str(&content).with_context(|| format!("invalid TOML in {}", path.display()))?;
    file.into_pairs()
        .with_context(|| format!("invalid option in {}", path.display()))
}

/// Return the path to the default config file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("streamtap")
        .join("config.toml")
}

fn to_option_value(key: &str, value: toml::Value) -> Result<OptionValue> {
    Ok(match value {
        toml::Value::Boolean(b) => OptionValue::Bool(b),
        toml::Value::Integer(i) => OptionValue::Int(i),
        toml::Value::Float(x) => OptionValue::Float(x),
        toml::Value::String(s) => OptionValue::String(s),
        toml::Value::Array(items) => OptionValue::List(
            items
                .into_iter()
                .map(|item| match item {
                    toml::Value::String(s) => Ok(s),
                    other => bail!("`{key}`: list items must be strings, got {}", other.type_str()),
                })
                .collect::<Result<_>>()?,
        ),
        toml::Value::Table(table) => OptionValue::Map(
            table
                .into_iter()
                .map(|(name, item)| match item {
                    toml::Value::String(s) => Ok((name, s)),
                    other => bail!("`{key}.{name}`: must be a string, got {}", other.type_str()),
                })
                .collect::<Result<OrderedMap>>()?,
        ),
        toml::Value::Datetime(_) => bail!("`{key}`: dates are not option values"),
    })
}
