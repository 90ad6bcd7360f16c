//! Option value domain.
//!
//! Every option holds one [`OptionValue`]. Header, cookie and query-param
//! options use [`OrderedMap`], which keeps insertion order so merged
//! values are sent in the order they were configured.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::plugin::UserInputRequester;

/// Ordered string to string mapping (headers, cookies, query params).
pub type OrderedMap = IndexMap<String, String>;

/// A typed option value.
#[derive(Clone)]
pub enum OptionValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<String>),
    Map(OrderedMap),
    /// Prompt provider handed to plugins that need credentials.
    Requester(Arc<dyn UserInputRequester>),
}

impl OptionValue {
    /// Short name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "real",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "mapping",
            Self::Requester(_) => "user-input-requester",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Reals, accepting integers as well.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&OrderedMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_requester(&self) -> Option<&Arc<dyn UserInputRequester>> {
        match self {
            Self::Requester(requester) => Some(requester),
            _ => None,
        }
    }

    /// Coerce a written value towards the shape of the key's default.
    ///
    /// Scalars written to a list option become a single-element list and
    /// `;`-delimited strings written to a mapping option are parsed.
    /// Nothing else is converted.
    #[must_use]
    pub fn coerce_like(self, default: &OptionValue) -> OptionValue {
        match (default, self) {
            (Self::List(_), Self::String(s)) => Self::List(vec![s]),
            (Self::List(_), value @ (Self::Bool(_) | Self::Int(_) | Self::Float(_))) => {
                Self::List(vec![value.to_string()])
            }
            (Self::Map(_), Self::String(s)) => Self::Map(parse_delimited(&s, ';')),
            (_, value) => value,
        }
    }

    /// Parse a raw command-line string according to the type of `default`.
    ///
    /// Unknown keys and keys defaulting to null or a string keep the raw
    /// string.
    pub fn parse_for(default: Option<&OptionValue>, raw: &str) -> Result<OptionValue, String> {
        let value = match default {
            Some(Self::Bool(_)) => Self::Bool(parse_bool(raw)?),
            Some(Self::Int(_)) => Self::Int(
                raw.trim()
                    .parse()
                    .map_err(|_| format!("expected an integer, got {raw:?}"))?,
            ),
            Some(Self::Float(_)) => Self::Float(
                raw.trim()
                    .parse()
                    .map_err(|_| format!("expected a number, got {raw:?}"))?,
            ),
            Some(Self::List(_)) => Self::List(
                raw.split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
            _ => Self::String(raw.to_string()),
        };
        Ok(value)
    }

    /// Parse a raw `http-ssl-verify` value: a boolean literal, otherwise a
    /// CA bundle path.
    pub fn parse_verify(raw: &str) -> OptionValue {
        match parse_bool(raw) {
            Ok(verify) => Self::Bool(verify),
            Err(_) => Self::String(raw.trim().to_string()),
        }
    }
}

fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(format!("expected a boolean, got {raw:?}")),
    }
}

/// Parse `K=V<delim>K=V` pairs.
///
/// Each pair splits on its first `=`, both sides are trimmed, and pairs
/// without `=` are dropped. Later duplicates win.
pub fn parse_delimited(input: &str, delimiter: char) -> OrderedMap {
    input
        .split(delimiter)
        .filter_map(|pair| pair.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

impl fmt::Debug for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Self::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Self::String(s) => f.debug_tuple("String").field(s).finish(),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
            Self::Map(map) => f.debug_tuple("Map").field(map).finish(),
            Self::Requester(_) => f.write_str("Requester(..)"),
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => f.write_str(s),
            Self::List(items) => f.write_str(&items.join(",")),
            Self::Map(map) => {
                let pairs: Vec<String> = map.iter().map(|(k, v)| format!("{k}={v}")).collect();
                f.write_str(&pairs.join(";"))
            }
            Self::Requester(_) => f.write_str("<user-input-requester>"),
        }
    }
}

impl PartialEq for OptionValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            #[allow(clippy::float_cmp)]
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            // Order matters for headers and cookies on the wire.
            (Self::Map(a), Self::Map(b)) => a.iter().eq(b.iter()),
            (Self::Requester(a), Self::Requester(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            _ => false,
        }
    }
}

impl Serialize for OptionValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(x) => serializer.serialize_f64(*x),
            Self::String(s) => serializer.serialize_str(s),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
            Self::Requester(_) => serializer.serialize_str("<user-input-requester>"),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for OptionValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for OptionValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<String>> for OptionValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl From<Vec<&str>> for OptionValue {
    fn from(value: Vec<&str>) -> Self {
        Self::List(value.into_iter().map(str::to_string).collect())
    }
}

impl From<OrderedMap> for OptionValue {
    fn from(value: OrderedMap) -> Self {
        Self::Map(value)
    }
}

impl From<Arc<dyn UserInputRequester>> for OptionValue {
    fn from(value: Arc<dyn UserInputRequester>) -> Self {
        Self::Requester(value)
    }
}

impl<T: Into<OptionValue>> From<Option<T>> for OptionValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cookie_pairs() {
        let map = parse_delimited("a=1;b=2", ';');
        assert_eq!(map.get("a").map(String::as_str), Some("1"));
        assert_eq!(map.get("b").map(String::as_str), Some("2"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn parse_trims_and_drops_pairs_without_equals() {
        let map = parse_delimited(" User-Agent = Test ; junk ;X-A=1", ';');
        let pairs: Vec<(&str, &str)> = map.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        assert_eq!(pairs, vec![("User-Agent", "Test"), ("X-A", "1")]);
    }

    #[test]
    fn parse_splits_on_first_equals_only() {
        let map = parse_delimited("token=a=b==&x=1", '&');
        assert_eq!(map.get("token").map(String::as_str), Some("a=b=="));
        assert_eq!(map.get("x").map(String::as_str), Some("1"));
    }

    #[test]
    fn coerce_wraps_scalar_into_list() {
        let default = OptionValue::List(vec![]);
        assert_eq!(
            OptionValue::from("eng").coerce_like(&default),
            OptionValue::from(vec!["eng"])
        );
        assert_eq!(
            OptionValue::Int(3).coerce_like(&default),
            OptionValue::from(vec!["3"])
        );
    }

    #[test]
    fn coerce_parses_string_into_map() {
        let default = OptionValue::Map(OrderedMap::new());
        let value = OptionValue::from("a=1; b=2").coerce_like(&default);
        let map = value.as_map().unwrap();
        assert_eq!(map.get("b").map(String::as_str), Some("2"));
    }

    #[test]
    fn coerce_leaves_other_shapes_alone() {
        assert_eq!(
            OptionValue::from("3").coerce_like(&OptionValue::Int(1)),
            OptionValue::from("3")
        );
    }

    #[test]
    fn parse_for_uses_default_type() {
        assert_eq!(
            OptionValue::parse_for(Some(&OptionValue::Bool(false)), "yes").unwrap(),
            OptionValue::Bool(true)
        );
        assert_eq!(
            OptionValue::parse_for(Some(&OptionValue::Int(3)), "7").unwrap(),
            OptionValue::Int(7)
        );
        assert_eq!(
            OptionValue::parse_for(Some(&OptionValue::Float(1.0)), "2.5").unwrap(),
            OptionValue::Float(2.5)
        );
        assert_eq!(
            OptionValue::parse_for(Some(&OptionValue::List(vec![])), "a, b").unwrap(),
            OptionValue::from(vec!["a", "b"])
        );
        assert_eq!(
            OptionValue::parse_for(None, "whatever").unwrap(),
            OptionValue::from("whatever")
        );
        assert!(OptionValue::parse_for(Some(&OptionValue::Int(3)), "x").is_err());
    }

    #[test]
    fn parse_verify_prefers_booleans() {
        assert_eq!(OptionValue::parse_verify("false"), OptionValue::Bool(false));
        assert_eq!(OptionValue::parse_verify(" yes "), OptionValue::Bool(true));
        assert_eq!(
            OptionValue::parse_verify("/etc/ssl/ca.pem"),
            OptionValue::from("/etc/ssl/ca.pem")
        );
    }

    #[test]
    fn map_equality_is_order_sensitive() {
        let a: OrderedMap = [("a", "1"), ("b", "2")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let b: OrderedMap = [("b", "2"), ("a", "1")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_ne!(OptionValue::Map(a), OptionValue::Map(b));
    }

    #[test]
    fn option_converts_to_null() {
        assert_eq!(OptionValue::from(None::<String>), OptionValue::Null);
        assert_eq!(OptionValue::from(Some("x")), OptionValue::from("x"));
    }

    #[test]
    fn serializes_to_plain_json() {
        let value = OptionValue::from(vec!["a", "b"]);
        assert_eq!(serde_json::to_string(&value).unwrap(), r#"["a","b"]"#);
        assert_eq!(serde_json::to_string(&OptionValue::Null).unwrap(), "null");
    }
}
