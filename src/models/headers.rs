//! Case-insensitive, order-preserving header list

use hyper::header::{HeaderMap, HeaderName, HeaderValue};
use serde::ser::{Serialize, SerializeSeq, Serializer};
use tracing::debug;

/// HTTP headers as seen by addons.
///
/// Names keep the case they were inserted with; every lookup compares
/// names case-insensitively. Repeated names are allowed (e.g. `Cookie`,
/// `Via`) and keep their relative order. Values are kept as raw bytes so
/// that non-UTF-8 values survive unchanged; the `&str` accessors skip them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, Vec<u8>)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// First value stored under `name`, if it is valid UTF-8
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_bytes(name).and_then(|v| std::str::from_utf8(v).ok())
    }

    pub fn get_bytes(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_slice())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .filter_map(|(_, v)| std::str::from_utf8(v).ok())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// Replace every value of `name` with a single `value`.
    ///
    /// The entry stays at the position of the first existing occurrence and
    /// keeps that occurrence's name spelling; a new name is appended.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into().into_bytes();
        match self.entries.iter().position(|(n, _)| n.eq_ignore_ascii_case(name)) {
            Some(first) => {
                self.entries[first].1 = value;
                let mut index = 0;
                self.entries.retain(|(n, _)| {
                    let keep = index <= first || !n.eq_ignore_ascii_case(name);
                    index += 1;
                    keep
                });
            }
            None => self.entries.push((name.to_string(), value)),
        }
    }

    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        self.append_bytes(name, value.into().into_bytes());
    }

    pub fn append_bytes(&mut self, name: &str, value: impl Into<Vec<u8>>) {
        self.entries.push((name.to_string(), value.into()));
    }

    /// Drop every value of `name`, returning the first one removed.
    pub fn remove(&mut self, name: &str) -> Option<Vec<u8>> {
        let mut removed = None;
        self.entries.retain(|(n, v)| {
            if n.eq_ignore_ascii_case(name) {
                if removed.is_none() {
                    removed = Some(v.clone());
                }
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries whose values are valid UTF-8
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter_map(|(n, v)| std::str::from_utf8(v).ok().map(|v| (n.as_str(), v)))
    }

    /// Every entry, values as raw bytes
    pub fn iter_bytes(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    /// Copy a hyper header map value for value
    pub fn from_header_map(map: &HeaderMap) -> Self {
        let mut headers = Self::new();
        for (name, value) in map {
            headers.append_bytes(name.as_str(), value.as_bytes());
        }
        headers
    }

    /// Build a hyper header map, leaving out names rejected by `keep`
    pub fn to_header_map<F>(&self, keep: F) -> HeaderMap
    where
        F: Fn(&str) -> bool,
    {
        let mut map = HeaderMap::with_capacity(self.entries.len());
        for (name, value) in &self.entries {
            if !keep(name) {
                continue;
            }
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_bytes(value),
            ) {
                (Ok(name), Ok(value)) => {
                    map.append(name, value);
                }
                _ => debug!("Dropping malformed header {}", name),
            }
        }
        map
    }
}

/// Serialized as `[name, value]` pairs, non-UTF-8 bytes replaced
impl Serialize for Headers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            seq.serialize_element(&(name, String::from_utf8_lossy(value)))?;
        }
        seq.end()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(n, v)| (n.into(), v.into().into_bytes()))
                .collect(),
        }
    }
}
