use super::error::ParseError;
use super::number::{float_prefix, strip_numeric_prefix};
use bytes::Bytes;
use std::borrow::Cow;

const MEASURE_KEY: &[u8] = b"measure";
const VALUE_KEY: &[u8] = b"val";
const SOURCE_KEY: &[u8] = b"source";
const HOST_KEY: &[u8] = b"host";

/// Runtime-metrics sources look like `<prefix>.<app>.<dyno>.<n>.<restart-id>`.
const RUNTIME_SOURCE_TOKENS: usize = 5;

/// One key/value pair from a log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    key: Bytes,
    value: Bytes,
}

impl Tuple {
    pub fn new(key: Bytes, value: Bytes) -> Self {
        Self { key, value }
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.key).into_owned()
    }

    pub fn as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.value)
    }

    pub fn float64(&self) -> Result<f64, ParseError> {
        float_prefix(&self.value)
    }

    pub fn units(&self) -> String {
        strip_numeric_prefix(&self.value)
    }

    fn has_key(&self, key: &[u8]) -> bool {
        self.key.as_ref() == key
    }
}

/// The tuples of one log line, in order of appearance.
///
/// Lookups are first-match linear scans; a line only carries a few pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tuples {
    inner: Vec<Tuple>,
}

impl Tuples {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, tuple: Tuple) {
        self.inner.push(tuple);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tuple> {
        self.inner.iter()
    }

    pub fn find(&self, key: &[u8]) -> Option<&Tuple> {
        self.inner.iter().find(|t| t.has_key(key))
    }

    /// Value of the first `measure` tuple, or an empty string.
    pub fn metric(&self) -> String {
        self.find(MEASURE_KEY)
            .map(|t| t.as_str().into_owned())
            .unwrap_or_default()
    }

    /// Numeric value of the first `val` tuple.
    pub fn value(&self) -> Result<f64, ParseError> {
        self.find(VALUE_KEY)
            .ok_or(ParseError::MissingValue)?
            .float64()
    }

    /// Units trailing the first `val` tuple's numeral.
    pub fn units(&self) -> String {
        self.find(VALUE_KEY).map(Tuple::units).unwrap_or_default()
    }

    /// Value of `source`, falling back to `host`. The Heroku router fills
    /// in `host` rather than `source`.
    pub fn source(&self) -> String {
        self.find(SOURCE_KEY)
            .or_else(|| self.find(HOST_KEY))
            .map(|t| t.as_str().into_owned())
            .unwrap_or_default()
    }

    /// Dyno name from a runtime-metrics `source`.
    ///
    /// Only a five-token dotted source is recognised; tokens 2 and 3 are
    /// kept, dropping the stable prefix and the per-restart suffix. Any
    /// other shape yields an empty string.
    pub fn metric_source(&self) -> String {
        let Some(source) = self.find(SOURCE_KEY) else {
            return String::new();
        };
        let raw = source.as_str();
        let tokens: Vec<&str> = raw.split('.').collect();
        if tokens.len() == RUNTIME_SOURCE_TOKENS {
            tokens[2..4].join(".")
        } else {
            String::new()
        }
    }
}

impl<'a> IntoIterator for &'a Tuples {
    type Item = &'a Tuple;
    type IntoIter = std::slice::Iter<'a, Tuple>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}
