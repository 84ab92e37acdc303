#![warn(missing_docs)]

/// An ordered collection of response headers.
///
/// Insertion order is retained for the serialized form. [`set`] follows
/// last-wins semantics (replacing in place, case-insensitively), while
/// [`append`] adds another line for the same name - useful for headers
/// that legitimately repeat.
///
/// Names are stored with the casing the caller supplied; lookups are
/// case-insensitive.
///
/// [`set`]: ResponseHeaders::set
/// [`append`]: ResponseHeaders::append
///
/// ## Example
///
/// ```
/// use aqueduct::res::response_headers::ResponseHeaders;
///
/// let mut headers = ResponseHeaders::new();
/// headers.set("Content-Type", "text/plain");
/// headers.set("content-type", "application/json");
/// headers.append("X-Tag", "a");
/// headers.append("X-Tag", "b");
///
/// assert_eq!(headers.get("Content-Type"), Some("application/json"));
/// assert_eq!(headers.iter().count(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHeaders {
    entries: Vec<(String, String)>,
}

impl ResponseHeaders {
    /// Creates a new, empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a header, replacing the value of an existing one with the
    /// same (case-insensitive) name. Position is preserved on replace.
    pub fn set<K, V>(&mut self, name: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        let name = name.into();
        let value = value.into();
        match self
            .entries
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            Some(slot) => slot.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Appends a header line without touching existing ones.
    pub fn append<K, V>(&mut self, name: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.entries.push((name.into(), value.into()));
    }

    /// Returns the first value for a name, case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether a header with this name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterates `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of header lines (appended duplicates count separately).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
