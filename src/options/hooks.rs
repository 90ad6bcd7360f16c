//! Getter and setter hooks for options backed by the HTTP client or the
//! resolver policy.
//!
//! Keys missing from both tables read and write the plain store. Hooks
//! apply their side effect first and record in the store last, so a
//! failing hook never leaves the store changed.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use crate::deprecation::{CallSite, WarningPath};
use crate::error::{OptionError, Result};
use crate::http::{self, ClientCert, HttpAdapter, ProxyScheme, Transport, Verify};
use crate::resolver::AddressFamily;
use crate::value::{parse_delimited, OptionValue};

use super::SessionOptions;

pub(crate) type Getter = fn(&SessionOptions, &str, CallSite) -> OptionValue;
pub(crate) type Setter = fn(&mut SessionOptions, &str, OptionValue, CallSite) -> Result<()>;

pub(crate) static GETTERS: &[(&str, Getter)] = &[
    ("http-proxy", get_http_proxy),
    ("https-proxy", get_https_proxy),
    ("http-cookies", get_http_attr),
    ("http-headers", get_http_attr),
    ("http-query-params", get_http_attr),
    ("http-ssl-cert", get_http_attr),
    ("http-ssl-verify", get_http_attr),
    ("http-trust-env", get_http_attr),
    ("http-timeout", get_http_attr),
];

pub(crate) static SETTERS: &[(&str, Setter)] = &[
    ("interface", set_interface),
    ("ipv4", set_address_family),
    ("ipv6", set_address_family),
    ("http-proxy", set_http_proxy),
    ("https-proxy", set_http_proxy),
    ("http-cookies", set_http_mapping),
    ("http-headers", set_http_mapping),
    ("http-query-params", set_http_mapping),
    ("http-disable-dh", set_disable_dh),
    ("http-ssl-cert", set_http_attr),
    ("http-ssl-verify", set_http_attr),
    ("http-trust-env", set_http_attr),
    ("http-timeout", set_http_attr),
];

pub(crate) fn getter(key: &str) -> Option<Getter> {
    GETTERS.iter().find(|(k, _)| *k == key).map(|(_, hook)| *hook)
}

pub(crate) fn setter(key: &str) -> Option<Setter> {
    SETTERS.iter().find(|(k, _)| *k == key).map(|(_, hook)| *hook)
}

fn expected(key: &str, what: &str, got: &OptionValue) -> OptionError {
    OptionError::invalid(key, format!("expected {what}, got {}", got.type_name()))
}

/// Proxy schemes the connection pools can dial.
const PROXY_SCHEMES: &[&str] = &["http", "https", "socks5", "socks5h"];

/// Prefix `https://` unless the proxy URL already names a scheme.
pub fn normalize_proxy_url(url: &str) -> String {
    if url.contains("://") {
        url.to_string()
    } else if let Some(rest) = url.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        format!("https://{url}")
    }
}

// ─── Getters ─────────────────────────────────────────────────────────────────

fn get_http_proxy(options: &SessionOptions, _key: &str, _site: CallSite) -> OptionValue {
    options.http.proxy(ProxyScheme::Http).into()
}

fn get_https_proxy(options: &SessionOptions, key: &str, site: CallSite) -> OptionValue {
    options
        .reporter
        .report(key, Some("http-proxy"), WarningPath::Get, site);
    options.http.proxy(ProxyScheme::Https).into()
}

fn get_http_attr(options: &SessionOptions, key: &str, _site: CallSite) -> OptionValue {
    let http = &options.http;
    match key {
        "http-cookies" => OptionValue::Map(http.cookies()),
        "http-headers" => OptionValue::Map(http.headers()),
        "http-query-params" => OptionValue::Map(http.params()),
        "http-ssl-cert" => match http.cert() {
            None => OptionValue::Null,
            Some(ClientCert::Combined(path)) => path.display().to_string().into(),
            Some(ClientCert::Pair { cert, key }) => OptionValue::List(vec![
                cert.display().to_string(),
                key.display().to_string(),
            ]),
        },
        "http-ssl-verify" => match http.verify() {
            Verify::Disabled => OptionValue::Bool(false),
            Verify::System => OptionValue::Bool(true),
            Verify::Bundle(path) => path.display().to_string().into(),
        },
        "http-trust-env" => OptionValue::Bool(http.trust_env()),
        "http-timeout" => OptionValue::Float(http.timeout()),
        _ => OptionValue::Null,
    }
}

// ─── Setters ─────────────────────────────────────────────────────────────────

fn set_interface(
    options: &mut SessionOptions,
    key: &str,
    value: OptionValue,
    _site: CallSite,
) -> Result<()> {
    let interface = match &value {
        OptionValue::Null => None,
        OptionValue::String(s) if s.trim().is_empty() => None,
        OptionValue::String(s) => Some(s.trim().to_string()),
        other => return Err(expected(key, "a string", other)),
    };
    let address = interface
        .as_deref()
        .map(|s| {
            s.parse::<IpAddr>()
                .map_err(|_| OptionError::invalid(key, format!("{s:?} is not an IP address")))
        })
        .transpose()?;

    options.http.set_source_address(address);
    options.store.set_explicit(key, interface.into());
    Ok(())
}

fn set_address_family(
    options: &mut SessionOptions,
    key: &str,
    value: OptionValue,
    _site: CallSite,
) -> Result<()> {
    let enabled = value
        .as_bool()
        .ok_or_else(|| expected(key, "a boolean", &value))?;
    let (family, other) = if key == "ipv4" {
        (AddressFamily::V4, "ipv6")
    } else {
        (AddressFamily::V6, "ipv4")
    };
    let resolver_error = |source| OptionError::Resolver {
        key: key.to_string(),
        source,
    };

    if enabled {
        options
            .lease
            .pin_family(Some(family))
            .map_err(resolver_error)?;
        options.store.set_explicit(key, OptionValue::Bool(true));
        options.store.set_explicit(other, OptionValue::Bool(false));
    } else {
        let other_enabled = options
            .store
            .get_ref(other)
            .and_then(OptionValue::as_bool)
            .unwrap_or(false);
        if !other_enabled {
            options.lease.pin_family(None).map_err(resolver_error)?;
        }
        options.store.set_explicit(key, OptionValue::Bool(false));
    }
    Ok(())
}

fn set_http_proxy(
    options: &mut SessionOptions,
    key: &str,
    value: OptionValue,
    site: CallSite,
) -> Result<()> {
    let proxy = match &value {
        OptionValue::Null => None,
        OptionValue::String(s) if s.trim().is_empty() => None,
        OptionValue::String(s) => Some(checked_proxy_url(key, s.trim())?),
        other => return Err(expected(key, "a proxy URL string", other)),
    };
    if key == "https-proxy" {
        options
            .reporter
            .report(key, Some("http-proxy"), WarningPath::Set, site);
    }
    options.http.set_proxy(proxy);
    Ok(())
}

fn checked_proxy_url(key: &str, raw: &str) -> Result<String> {
    let proxy = normalize_proxy_url(raw);
    let url = url::Url::parse(&proxy)
        .map_err(|e| OptionError::invalid(key, format!("invalid proxy URL {proxy:?}: {e}")))?;
    if !PROXY_SCHEMES.contains(&url.scheme()) {
        return Err(OptionError::invalid(
            key,
            format!("unsupported proxy scheme `{}`", url.scheme()),
        ));
    }
    Ok(proxy)
}

fn set_http_mapping(
    options: &mut SessionOptions,
    key: &str,
    value: OptionValue,
    _site: CallSite,
) -> Result<()> {
    let delimiter = if key == "http-query-params" { '&' } else { ';' };
    let map = match value {
        OptionValue::Map(map) => map,
        OptionValue::String(s) => parse_delimited(&s, delimiter),
        OptionValue::Null => return Ok(()),
        other => return Err(expected(key, "a mapping or delimited string", &other)),
    };

    match key {
        "http-headers" => {
            for (name, value) in &map {
                http::validate_header(name, value)
                    .map_err(|e| OptionError::invalid(key, e.to_string()))?;
            }
            options.http.merge_headers(map);
        }
        "http-cookies" => options.http.merge_cookies(map),
        _ => options.http.merge_params(map),
    }
    Ok(())
}

fn set_disable_dh(
    options: &mut SessionOptions,
    key: &str,
    value: OptionValue,
    _site: CallSite,
) -> Result<()> {
    let disable = value
        .as_bool()
        .ok_or_else(|| expected(key, "a boolean", &value))?;
    let adapter: Arc<dyn Transport> = if disable {
        Arc::new(HttpAdapter::no_dh())
    } else {
        Arc::new(HttpAdapter::new())
    };
    options.http.mount("https://", adapter);
    options.store.set_explicit(key, OptionValue::Bool(disable));
    Ok(())
}

fn set_http_attr(
    options: &mut SessionOptions,
    key: &str,
    value: OptionValue,
    _site: CallSite,
) -> Result<()> {
    let http = &options.http;
    match key {
        "http-ssl-cert" => {
            let cert = match &value {
                OptionValue::Null => None,
                OptionValue::String(s) if s.is_empty() => None,
                OptionValue::String(s) => Some(ClientCert::Combined(PathBuf::from(s))),
                OptionValue::List(items) if items.len() == 2 => Some(ClientCert::Pair {
                    cert: PathBuf::from(&items[0]),
                    key: PathBuf::from(&items[1]),
                }),
                other => {
                    return Err(expected(key, "a path or a (cert, key) pair", other));
                }
            };
            http.set_cert(cert);
        }
        "http-ssl-verify" => {
            let verify = match &value {
                OptionValue::Bool(true) => Verify::System,
                OptionValue::Bool(false) => Verify::Disabled,
                OptionValue::String(path) => Verify::Bundle(PathBuf::from(path)),
                other => return Err(expected(key, "a boolean or a CA bundle path", other)),
            };
            http.set_verify(verify);
        }
        "http-trust-env" => {
            let trust = value
                .as_bool()
                .ok_or_else(|| expected(key, "a boolean", &value))?;
            http.set_trust_env(trust);
        }
        "http-timeout" => {
            let seconds = value
                .as_float()
                .ok_or_else(|| expected(key, "a number of seconds", &value))?;
            if !seconds.is_finite() || seconds <= 0.0 {
                return Err(OptionError::invalid(
                    key,
                    "timeout must be a positive number of seconds",
                ));
            }
            http.set_timeout(seconds);
        }
        _ => return Err(OptionError::invalid(key, "not an HTTP client attribute")),
    }
    Ok(())
}
