#![warn(missing_docs)]

/// A case-insensitive collection of HTTP request headers.
///
/// Names are normalized to lowercase on the write path, so lookups may use
/// any casing. Insertion order is preserved for round-tripping; inserting a
/// name that already exists replaces the value in place (last value wins,
/// original position kept).
///
/// ## Example
///
/// ```
/// use aqueduct::req::request_headers::RequestHeaders;
///
/// let mut headers = RequestHeaders::new();
/// headers.insert("Content-Type", "application/json");
/// headers.insert("X-Request-Id", "42");
/// headers.insert("content-type", "text/plain");
///
/// assert_eq!(headers.get("CONTENT-TYPE"), Some("text/plain"));
/// assert_eq!(headers.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHeaders {
    // Lowercased name, trimmed value, in insertion order.
    entries: Vec<(String, String)>,
}

impl RequestHeaders {
    /// Creates a new, empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a header, replacing any existing value for the same
    /// (case-insensitive) name. The original position is kept so the
    /// serialized order matches the order the client sent.
    pub fn insert<K, V>(&mut self, name: K, value: V)
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let name = name.as_ref().to_ascii_lowercase();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Looks a header up by name, case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Whether a header with this name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(name, value)` pairs in insertion order. Names are the
    /// stored lowercase form.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}
