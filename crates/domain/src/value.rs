//! Values exchanged in requests, responses and change notifications.

use std::collections::BTreeMap;

use serde::Serialize;

/// Conventional header naming the media type of the body.
pub const CONTENT_TYPE: &str = "Content-Type";

/// A body plus a string/string header map.
///
/// The core attaches no meaning to either; the REST façade maps them onto
/// HTTP bodies and headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Value {
    body: Vec<u8>,
    headers: BTreeMap<String, String>,
}

impl Value {
    /// Create a value from raw bytes.
    #[must_use]
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            headers: BTreeMap::new(),
        }
    }

    /// Create a value from text.
    #[must_use]
    pub fn text(body: impl Into<String>) -> Self {
        Self::new(body.into().into_bytes())
    }

    /// Builder-style variant of [`set_header`](Self::set_header).
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(key, value);
        self
    }

    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The body as UTF-8 text, if it is valid UTF-8.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    #[must_use]
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.body.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}
