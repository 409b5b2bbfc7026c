//! Call metadata: ordered, case-insensitive, multi-valued key/value lists.

/// Ordered metadata multimap. Keys are stored lowercase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataMap {
    entries: Vec<(String, String)>,
}

impl MetadataMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value, keeping any existing values for the key
    pub fn append(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.entries
            .push((key.as_ref().to_ascii_lowercase(), value.into()));
    }

    /// Replace all values for the key with a single value
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        let key = key.as_ref().to_ascii_lowercase();
        self.entries.retain(|(k, _)| *k != key);
        self.entries.push((key, value.into()));
    }

    /// First value for the key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// All values for the key, in insertion order
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append every entry of `other` after the entries already present
    pub fn join(&mut self, other: MetadataMap) {
        self.entries.extend(other.entries);
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for MetadataMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = MetadataMap::new();
        for (k, v) in iter {
            map.append(k, v);
        }
        map
    }
}

/// Response headers and trailers attached to one in-flight call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerMetadata {
    pub header: MetadataMap,
    pub trailer: MetadataMap,
}

impl ServerMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `other` after this metadata's own entries
    pub fn join(&mut self, other: ServerMetadata) {
        self.header.join(other.header);
        self.trailer.join(other.trailer);
    }

    pub fn is_empty(&self) -> bool {
        self.header.is_empty() && self.trailer.is_empty()
    }
}
