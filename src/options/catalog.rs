//! The canonical option catalog and the deprecated-key table.

use crate::value::{OptionValue, OrderedMap};

/// Grouping used for documentation and `--help` style listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Identity,
    Network,
    Buffering,
    Muxing,
    Stream,
    Hls,
    Dash,
    Ffmpeg,
    WebBrowser,
    Interaction,
}

/// Default of a catalog option.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(&'static str),
    EmptyList,
    EmptyMap,
    /// Read from the HTTP client when the session is created.
    FromClient,
}

impl DefaultValue {
    /// The value for catalog-owned defaults; `None` for [`FromClient`](Self::FromClient).
    pub fn to_value(self) -> Option<OptionValue> {
        Some(match self {
            Self::Null => OptionValue::Null,
            Self::Bool(b) => OptionValue::Bool(b),
            Self::Int(i) => OptionValue::Int(i),
            Self::Float(x) => OptionValue::Float(x),
            Self::Str(s) => OptionValue::String(s.to_string()),
            Self::EmptyList => OptionValue::List(Vec::new()),
            Self::EmptyMap => OptionValue::Map(OrderedMap::new()),
            Self::FromClient => return None,
        })
    }
}

/// One catalog entry.
#[derive(Debug, Clone, Copy)]
pub struct OptionSpec {
    pub key: &'static str,
    pub category: Category,
    pub default: DefaultValue,
}

const fn opt(key: &'static str, category: Category, default: DefaultValue) -> OptionSpec {
    OptionSpec {
        key,
        category,
        default,
    }
}

use Category::{
    Buffering, Dash, Ffmpeg, Hls, Identity, Interaction, Muxing, Network, Stream, WebBrowser,
};
use DefaultValue::{Bool, EmptyList, Float, FromClient, Int, Null, Str};

/// Every option a session knows about, in listing order.
pub static CATALOG: &[OptionSpec] = &[
    opt("locale", Identity, Null),
    // Network
    opt("interface", Network, Null),
    opt("ipv4", Network, Bool(false)),
    opt("ipv6", Network, Bool(false)),
    opt("http-proxy", Network, FromClient),
    opt("http-cookies", Network, FromClient),
    opt("http-headers", Network, FromClient),
    opt("http-query-params", Network, FromClient),
    opt("http-trust-env", Network, FromClient),
    opt("http-ssl-verify", Network, FromClient),
    opt("http-disable-dh", Network, Bool(false)),
    opt("http-ssl-cert", Network, FromClient),
    opt("http-timeout", Network, FromClient),
    // Buffering and muxing
    opt("ringbuffer-size", Buffering, Int(16 * 1024 * 1024)),
    opt("mux-subtitles", Muxing, Bool(false)),
    // Generic segmented streams
    opt("stream-segment-attempts", Stream, Int(3)),
    opt("stream-segment-threads", Stream, Int(1)),
    opt("stream-segment-timeout", Stream, Float(10.0)),
    opt("stream-timeout", Stream, Float(60.0)),
    // HLS
    opt("hls-live-edge", Hls, Int(3)),
    opt("hls-live-restart", Hls, Bool(false)),
    opt("hls-start-offset", Hls, Float(0.0)),
    opt("hls-duration", Hls, Null),
    opt("hls-playlist-reload-attempts", Hls, Int(3)),
    opt("hls-playlist-reload-time", Hls, Str("default")),
    opt("hls-segment-queue-threshold", Hls, Float(3.0)),
    opt("hls-segment-stream-data", Hls, Bool(false)),
    opt("hls-segment-ignore-names", Hls, EmptyList),
    opt("hls-segment-key-uri", Hls, Null),
    opt("hls-audio-select", Hls, EmptyList),
    // DASH
    opt("dash-manifest-reload-attempts", Dash, Int(3)),
    // FFmpeg muxer
    opt("ffmpeg-ffmpeg", Ffmpeg, Null),
    opt("ffmpeg-no-validation", Ffmpeg, Bool(false)),
    opt("ffmpeg-verbose", Ffmpeg, Bool(false)),
    opt("ffmpeg-verbose-path", Ffmpeg, Null),
    opt("ffmpeg-loglevel", Ffmpeg, Null),
    opt("ffmpeg-fout", Ffmpeg, Null),
    opt("ffmpeg-video-transcode", Ffmpeg, Null),
    opt("ffmpeg-audio-transcode", Ffmpeg, Null),
    opt("ffmpeg-copyts", Ffmpeg, Bool(false)),
    opt("ffmpeg-start-at-zero", Ffmpeg, Bool(false)),
    // Web browser
    opt("webbrowser", WebBrowser, Bool(true)),
    opt("webbrowser-executable", WebBrowser, Null),
    opt("webbrowser-timeout", WebBrowser, Float(20.0)),
    opt("webbrowser-cdp-host", WebBrowser, Null),
    opt("webbrowser-cdp-port", WebBrowser, Null),
    opt("webbrowser-cdp-timeout", WebBrowser, Float(2.0)),
    opt("webbrowser-headless", WebBrowser, Bool(true)),
    // Plugin interaction
    opt("user-input-requester", Interaction, Null),
];

/// Look up a catalog entry.
pub fn spec(key: &str) -> Option<&'static OptionSpec> {
    CATALOG.iter().find(|spec| spec.key == key)
}

/// Value conversion applied when a deprecated key is routed to its
/// replacement.
pub type Transform = fn(OptionValue) -> Result<OptionValue, String>;

/// A deprecated key and where it now lives.
#[derive(Debug, Clone, Copy)]
pub struct Alias {
    pub old: &'static str,
    pub new: &'static str,
    /// Applied to values written through the old key.
    pub transform: Transform,
    /// Applied to values of the new key read back through the old one.
    pub read: Transform,
}

fn identity(value: OptionValue) -> Result<OptionValue, String> {
    Ok(value)
}

fn negate(value: OptionValue) -> Result<OptionValue, String> {
    value
        .as_bool()
        .map(|b| OptionValue::Bool(!b))
        .ok_or_else(|| format!("expected a boolean, got {}", value.type_name()))
}

/// Read side of `http-no-ssl-verify`. A CA bundle path means verification
/// is on.
fn negate_verify(value: OptionValue) -> Result<OptionValue, String> {
    match value {
        OptionValue::String(_) => Ok(OptionValue::Bool(false)),
        other => negate(other),
    }
}

const fn alias(old: &'static str, new: &'static str, transform: Transform) -> Alias {
    Alias {
        old,
        new,
        transform,
        read: transform,
    }
}

/// Renamed keys. `https-proxy` is not listed: it keeps its own hooks
/// because it reads the https proxy slot.
pub static ALIASES: &[Alias] = &[
    alias("hls-segment-attempts", "stream-segment-attempts", identity),
    alias("dash-segment-attempts", "stream-segment-attempts", identity),
    alias("hls-segment-threads", "stream-segment-threads", identity),
    alias("dash-segment-threads", "stream-segment-threads", identity),
    alias("hls-segment-timeout", "stream-segment-timeout", identity),
    alias("dash-segment-timeout", "stream-segment-timeout", identity),
    alias("hls-timeout", "stream-timeout", identity),
    alias("dash-timeout", "stream-timeout", identity),
    alias("http-stream-timeout", "stream-timeout", identity),
    Alias {
        old: "http-no-ssl-verify",
        new: "http-ssl-verify",
        transform: negate,
        read: negate_verify,
    },
];

pub fn alias_for(key: &str) -> Option<&'static Alias> {
    ALIASES.iter().find(|alias| alias.old == key)
}
