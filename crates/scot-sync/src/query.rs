//! Query Strings
//!
//! URL query building with `encodeURIComponent`-compatible escaping, and
//! origin extraction.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::fmt::Display;
use url::Url;

use crate::error::{SyncError, SyncResult};

/// Everything except `A-Z a-z 0-9 - _ . ! ~ * ' ( )`
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

pub fn encode_component(raw: &str) -> String {
    utf8_percent_encode(raw, COMPONENT).to_string()
}

/// Builds `base?k=v&...`. Keys already present in `base` are replaced.
#[derive(Debug, Clone)]
pub struct Query {
    url: Url,
    pairs: Vec<(String, String)>,
}

impl Query {
    /// Parse `url`, keeping its parameters and fragment
    pub fn parse(url: &str) -> SyncResult<Self> {
        let parsed = parse_url(url)?;
        let pairs = parsed.query_pairs().into_owned().collect();
        Ok(Self { url: parsed, pairs })
    }

    /// Set `key`, replacing any earlier value
    pub fn set(mut self, key: &str, value: impl Display) -> Self {
        let value = value.to_string();
        match self.pairs.iter_mut().find(|(k, _)| k == key) {
            Some(pair) => pair.1 = value,
            None => self.pairs.push((key.to_string(), value)),
        }
        self
    }

    pub fn set_opt<V: Display>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(key, v),
            None => self,
        }
    }

    /// `key=1` when `on`
    pub fn flag(self, key: &str, on: bool) -> Self {
        if on {
            self.set(key, 1)
        } else {
            self
        }
    }

    pub fn build(&self) -> String {
        let mut url = self.url.clone();
        if self.pairs.is_empty() {
            url.set_query(None);
        } else {
            let encoded: Vec<String> = self
                .pairs
                .iter()
                .map(|(k, v)| format!("{}={}", encode_component(k), encode_component(v)))
                .collect();
            url.set_query(Some(&encoded.join("&")));
        }
        url.into()
    }
}

pub(crate) fn parse_url(raw: &str) -> SyncResult<Url> {
    let raw = raw.trim();
    Url::parse(raw).map_err(|e| SyncError::Validation(format!("Invalid URL \"{}\": {}", raw, e)))
}

/// Origin of `url` as browsers serialize it (`MessageEvent.origin`):
/// lowercase scheme and host, default port and credentials dropped
pub fn origin_of(url: &str) -> Option<String> {
    let origin = Url::parse(url.trim()).ok()?.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}
