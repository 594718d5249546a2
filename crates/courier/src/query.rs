//! Query string serialization.

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::sync::Arc;

/// Characters left as-is by `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// A value in a query mapping.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    List(Vec<QueryValue>),
    Null,
}

/// Query parameters in insertion order.
pub type Query = IndexMap<String, QueryValue>;

/// Pluggable query serializer.
pub type QuerySerializer = Arc<dyn Fn(Option<&Query>) -> String + Send + Sync>;

/// The serializer used when a request does not supply its own.
pub fn default_serializer() -> QuerySerializer {
    Arc::new(serialize_query)
}

impl From<&str> for QueryValue {
    fn from(s: &str) -> Self {
        QueryValue::Text(s.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(s: String) -> Self {
        QueryValue::Text(s)
    }
}

impl From<f64> for QueryValue {
    fn from(n: f64) -> Self {
        QueryValue::Number(n)
    }
}

impl From<i32> for QueryValue {
    fn from(n: i32) -> Self {
        QueryValue::Number(n.into())
    }
}

impl From<i64> for QueryValue {
    fn from(n: i64) -> Self {
        QueryValue::Number(n as f64)
    }
}

impl From<u32> for QueryValue {
    fn from(n: u32) -> Self {
        QueryValue::Number(n.into())
    }
}

impl From<bool> for QueryValue {
    fn from(b: bool) -> Self {
        QueryValue::Bool(b)
    }
}

impl From<DateTime<Utc>> for QueryValue {
    fn from(t: DateTime<Utc>) -> Self {
        QueryValue::Timestamp(t)
    }
}

impl<T: Into<QueryValue>> From<Vec<T>> for QueryValue {
    fn from(values: Vec<T>) -> Self {
        QueryValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<QueryValue>> From<Option<T>> for QueryValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(QueryValue::Null, Into::into)
    }
}

fn encode_component(s: &str) -> String {
    utf8_percent_encode(s, COMPONENT).to_string()
}

/// Format like JavaScript's `Number.prototype.toString`: plain decimal for
/// magnitudes in `[1e-6, 1e21)`, shortest exponent form outside it.
fn format_number(n: f64) -> String {
    if n == 0.0 {
        // -0 prints as "0"
        return "0".to_string();
    }
    let magnitude = n.abs();
    if (1e-6..1e21).contains(&magnitude) {
        return n.to_string();
    }
    let formatted = format!("{:e}", n);
    match formatted.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{}e+{}", mantissa, exponent)
        }
        _ => formatted,
    }
}

/// Encode one scalar. Lists, nulls and non-finite numbers produce nothing.
fn encode_pair(key: &str, value: &QueryValue) -> Option<String> {
    match value {
        QueryValue::Text(s) => Some(format!("{}={}", key, encode_component(s))),
        QueryValue::Number(n) if n.is_finite() => {
            Some(format!("{}={}", key, encode_component(&format_number(*n))))
        }
        QueryValue::Bool(b) => Some(format!("{}={}", key, if *b { "1" } else { "0" })),
        QueryValue::Timestamp(t) => Some(format!(
            "{}={}",
            key,
            t.to_rfc3339_opts(SecondsFormat::Millis, true)
        )),
        _ => None,
    }
}

/// Serialize a query mapping into a `?`-prefixed query string.
///
/// `None` yields an empty string, while an empty mapping yields a lone `?`.
pub fn serialize_query(query: Option<&Query>) -> String {
    let Some(query) = query else {
        return String::new();
    };

    let pairs: Vec<String> = query
        .iter()
        .filter_map(|(key, value)| {
            let key = encode_component(key);
            let encoded = match value {
                QueryValue::List(values) => values
                    .iter()
                    .filter_map(|v| encode_pair(&key, v))
                    .collect::<Vec<_>>()
                    .join("&"),
                scalar => encode_pair(&key, scalar)?,
            };
            (!encoded.is_empty()).then_some(encoded)
        })
        .collect();

    format!("?{}", pairs.join("&"))
}
