#![warn(missing_docs)]

use ahash::AHashMap;

/// Decoded query-string parameters.
///
/// Built from the raw query component of the request URI. Decoding follows
/// `application/x-www-form-urlencoded` rules: `+` becomes a space, percent
/// triples are decoded, duplicate keys keep the last value, a key without
/// `=` maps to the empty string.
///
/// ## Example
///
/// ```
/// use aqueduct::req::query_params::QueryParams;
///
/// let q = QueryParams::from_raw("name=rust+lang&flag&name=ferris");
/// assert_eq!(q.get("name"), Some("ferris"));
/// assert_eq!(q.get("flag"), Some(""));
/// assert_eq!(q.get("missing"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    map: AHashMap<String, String>,
}

impl QueryParams {
    /// An empty parameter set (request had no query string).
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a raw query string. Never fails; byte sequences that do not
    /// decode to UTF-8 are replaced lossily, which matches how browsers
    /// submit forms in practice.
    pub fn from_raw(raw: &str) -> Self {
        let mut map = AHashMap::new();
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            map.insert(key.into_owned(), value.into_owned());
        }
        QueryParams { map }
    }

    /// Looks a parameter up by name. Keys are case-sensitive.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(name).map(String::as_str)
    }

    /// Number of distinct parameter names.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the query string held no parameters.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterates `(name, value)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
