//! HTTP header handling.

use indexmap::IndexMap;
use std::fmt;

/// A single header value.
///
/// Outgoing headers are usually text, sometimes a number (`content-length`)
/// and occasionally repeated; incoming headers that appear more than once
/// (`set-cookie`) are collected into a list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeaderValue {
    Text(String),
    Number(u64),
    List(Vec<String>),
}

impl HeaderValue {
    /// The value as it would be written on the wire, one entry per header line.
    pub fn to_wire_values(&self) -> Vec<String> {
        match self {
            HeaderValue::Text(s) => vec![s.clone()],
            HeaderValue::Number(n) => vec![n.to_string()],
            HeaderValue::List(values) => values.clone(),
        }
    }

    /// The first textual value, if this is text or a non-empty list.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::Text(s) => Some(s),
            HeaderValue::Number(_) => None,
            HeaderValue::List(values) => values.first().map(String::as_str),
        }
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderValue::Text(s) => f.write_str(s),
            HeaderValue::Number(n) => write!(f, "{}", n),
            HeaderValue::List(values) => f.write_str(&values.join(", ")),
        }
    }
}

impl From<String> for HeaderValue {
    fn from(s: String) -> Self {
        HeaderValue::Text(s)
    }
}

impl From<&str> for HeaderValue {
    fn from(s: &str) -> Self {
        HeaderValue::Text(s.to_string())
    }
}

impl From<u64> for HeaderValue {
    fn from(n: u64) -> Self {
        HeaderValue::Number(n)
    }
}

impl From<usize> for HeaderValue {
    fn from(n: usize) -> Self {
        HeaderValue::Number(n as u64)
    }
}

impl From<Vec<String>> for HeaderValue {
    fn from(values: Vec<String>) -> Self {
        HeaderValue::List(values)
    }
}

impl From<Vec<&str>> for HeaderValue {
    fn from(values: Vec<&str>) -> Self {
        HeaderValue::List(values.into_iter().map(str::to_string).collect())
    }
}

/// HTTP header map (case-insensitive keys, order-preserving).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderMap {
    headers: IndexMap<String, HeaderValue>,
}

impl HeaderMap {
    /// Create a new empty header map.
    pub fn new() -> Self {
        Self {
            headers: IndexMap::new(),
        }
    }

    /// Build a header map from optional values.
    ///
    /// Entries with an empty name or a `None` value are discarded. When two
    /// names differ only in case, the later one wins.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: AsRef<str>,
        V: Into<HeaderValue>,
        I: IntoIterator<Item = (K, Option<V>)>,
    {
        let mut map = Self::new();
        for (name, value) in pairs {
            if let Some(value) = value {
                map.set(name, value);
            }
        }
        map
    }

    /// Check if a header exists.
    pub fn has(&self, name: &str) -> bool {
        self.headers.contains_key(&name.to_lowercase())
    }

    /// Get a header value.
    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        self.headers.get(&name.to_lowercase())
    }

    /// Set a header, replacing any value stored under the same name.
    ///
    /// Empty names are ignored.
    pub fn set(&mut self, name: impl AsRef<str>, value: impl Into<HeaderValue>) -> &mut Self {
        let name = name.as_ref().to_lowercase();
        if !name.is_empty() {
            self.headers.insert(name, value.into());
        }
        self
    }

    /// Append a value, turning an existing entry into a list.
    pub fn append(&mut self, name: impl AsRef<str>, value: impl Into<String>) -> &mut Self {
        let name = name.as_ref().to_lowercase();
        if name.is_empty() {
            return self;
        }
        let value = value.into();
        match self.headers.get_mut(&name) {
            Some(HeaderValue::List(values)) => values.push(value),
            Some(existing) => {
                let mut values = existing.to_wire_values();
                values.push(value);
                *existing = HeaderValue::List(values);
            }
            None => {
                self.headers.insert(name, HeaderValue::Text(value));
            }
        }
        self
    }

    /// Remove a header. Returns whether it was present.
    pub fn delete(&mut self, name: &str) -> bool {
        self.headers.shift_remove(&name.to_lowercase()).is_some()
    }

    /// Clear all headers.
    pub fn clear(&mut self) {
        self.headers.clear();
    }

    /// Export the headers as a plain name → value mapping.
    pub fn to_object(&self) -> IndexMap<String, HeaderValue> {
        self.headers.clone()
    }

    /// Get number of headers.
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Iterate over headers.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &HeaderValue)> {
        self.headers.iter()
    }

    /// Get Content-Type header.
    pub fn content_type(&self) -> Option<&str> {
        self.get(names::CONTENT_TYPE).and_then(HeaderValue::as_str)
    }

    /// Get Content-Length header.
    pub fn content_length(&self) -> Option<u64> {
        match self.get(names::CONTENT_LENGTH)? {
            HeaderValue::Number(n) => Some(*n),
            other => other.as_str().and_then(|v| v.trim().parse().ok()),
        }
    }

    /// Get Location header.
    pub fn location(&self) -> Option<&str> {
        self.get(names::LOCATION)
            .and_then(HeaderValue::as_str)
            .filter(|v| !v.is_empty())
    }
}

impl<K, V> FromIterator<(K, V)> for HeaderMap
where
    K: AsRef<str>,
    V: Into<HeaderValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (name, value) in iter {
            map.set(name, value);
        }
        map
    }
}

impl fmt::Display for HeaderMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.headers {
            for line in value.to_wire_values() {
                writeln!(f, "{}: {}", name, line)?;
            }
        }
        Ok(())
    }
}

/// Common HTTP headers.
pub mod names {
    pub const CONTENT_LENGTH: &str = "content-length";
    pub const CONTENT_TYPE: &str = "content-type";
    pub const LOCATION: &str = "location";
}

/// Content type utilities.
pub mod content_type {
    pub const JSON: &str = "application/json";

    pub const JSON_UTF8: &str = "application/json; charset=utf-8";
    pub const PLAIN_UTF8: &str = "text/plain; charset=utf-8";

    /// Charset assumed when a response does not declare one.
    pub const DEFAULT_CHARSET: &str = "utf-8";
}
