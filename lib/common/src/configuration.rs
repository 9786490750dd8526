use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Well-known configuration keys.
pub mod keys {
    /// Location (IRI or file system path) of the resource.
    pub const LOCATION: &str = "location";
    /// Inline content standing in for a location.
    pub const CONTENT: &str = "content";
    /// Shell command whose output stands in for a location.
    pub const COMMAND: &str = "command";
    /// Explicit media type of the resource.
    pub const MEDIA_TYPE: &str = "media-type";
    /// Explicit converter override.
    pub const CONVERTER: &str = "converter";
    /// IRI of the root container.
    pub const ROOT: &str = "root";
    /// Namespace under which slot keys become IRIs.
    pub const NAMESPACE: &str = "namespace";
    /// Whether containers are addressed as blank nodes (default) or IRIs.
    pub const BLANK_NODES: &str = "blank-nodes";
    /// Whether string values are trimmed before emission.
    pub const TRIM_STRINGS: &str = "trim-strings";
    /// Sentinel value whose occurrences are suppressed.
    pub const NULL_STRING: &str = "null-string";
    /// Whether ordinal slots use `rdfs:member` instead of `rdf:_N`.
    pub const USE_RDFS_MEMBER: &str = "use-rdfs-member";
    /// Whether the request asks for streamed (sliced) execution.
    pub const SLICE: &str = "slice";
    /// Whether conversion failures yield an empty graph.
    pub const SILENT: &str = "silent";
    /// Directory of the on-disk store, when on-disk mode is selected.
    pub const ONDISK: &str = "ondisk";
    /// Whether an existing on-disk store is reused instead of deleted.
    pub const ONDISK_REUSE: &str = "ondisk-reuse";
    /// Whether an audit graph is emitted.
    pub const AUDIT: &str = "audit";
    /// Whether the triplification cache is bypassed for this request.
    pub const NO_CACHE: &str = "no-cache";
}

/// The configuration of one triplification request.
///
/// A string-keyed map merging request-supplied assertions with defaults.
/// Two configurations are equal iff their key/value sets are equal; the
/// canonical serialization returned by [`Configuration::cache_key`] is used
/// as part of the triplification cache key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Configuration(BTreeMap<String, String>);

impl Configuration {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the raw value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns whether `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Sets `key` to `value`, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Sets `key` to `value` unless the key is already present.
    pub fn set_default(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.entry(key.into()).or_insert_with(|| value.into());
    }

    /// Iterates over the key/value pairs in key order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }

    pub fn location(&self) -> Option<&str> {
        self.get(keys::LOCATION)
    }

    pub fn content(&self) -> Option<&str> {
        self.get(keys::CONTENT)
    }

    pub fn command(&self) -> Option<&str> {
        self.get(keys::COMMAND)
    }

    pub fn media_type(&self) -> Option<&str> {
        self.get(keys::MEDIA_TYPE)
    }

    pub fn converter(&self) -> Option<&str> {
        self.get(keys::CONVERTER)
    }

    pub fn root(&self) -> Option<&str> {
        self.get(keys::ROOT)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.get(keys::NAMESPACE)
    }

    pub fn null_string(&self) -> Option<&str> {
        self.get(keys::NULL_STRING)
    }

    pub fn ondisk(&self) -> Option<&str> {
        self.get(keys::ONDISK)
    }

    pub fn blank_nodes(&self) -> bool {
        self.flag(keys::BLANK_NODES, true)
    }

    pub fn trim_strings(&self) -> bool {
        self.flag(keys::TRIM_STRINGS, false)
    }

    pub fn use_rdfs_member(&self) -> bool {
        self.flag(keys::USE_RDFS_MEMBER, false)
    }

    pub fn slice(&self) -> bool {
        self.flag(keys::SLICE, false)
    }

    pub fn silent(&self) -> bool {
        self.flag(keys::SILENT, false)
    }

    pub fn ondisk_reuse(&self) -> bool {
        self.flag(keys::ONDISK_REUSE, false)
    }

    pub fn audit(&self) -> bool {
        self.flag(keys::AUDIT, false)
    }

    pub fn no_cache(&self) -> bool {
        self.flag(keys::NO_CACHE, false)
    }

    /// Returns the canonical serialization of this configuration.
    ///
    /// Keys appear in lexicographic order, one `key=value` pair per line.
    pub fn cache_key(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.0 {
            // Writing to a String cannot fail.
            let _ = writeln!(out, "{key}={value}");
        }
        out
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(value) => value.eq_ignore_ascii_case("true"),
            None => default,
        }
    }
}

impl FromIterator<(String, String)> for Configuration {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let configuration = Configuration::new();
        assert!(configuration.blank_nodes());
        assert!(!configuration.trim_strings());
        assert!(!configuration.use_rdfs_member());
        assert!(!configuration.slice());
        assert_eq!(configuration.null_string(), None);
    }

    #[test]
    fn flags_parse_case_insensitively() {
        let mut configuration = Configuration::new();
        configuration.set(keys::BLANK_NODES, "False");
        configuration.set(keys::TRIM_STRINGS, "TRUE");
        assert!(!configuration.blank_nodes());
        assert!(configuration.trim_strings());
    }

    #[test]
    fn set_default_does_not_override() {
        let mut configuration = Configuration::new();
        configuration.set(keys::NAMESPACE, "http://example.com/ns#");
        configuration.set_default(keys::NAMESPACE, "http://example.com/other#");
        assert_eq!(configuration.namespace(), Some("http://example.com/ns#"));
    }

    #[test]
    fn cache_key_is_order_independent() {
        let a: Configuration = [
            ("location".to_owned(), "a.txt".to_owned()),
            ("media-type".to_owned(), "text/plain".to_owned()),
        ]
        .into_iter()
        .collect();
        let b: Configuration = [
            ("media-type".to_owned(), "text/plain".to_owned()),
            ("location".to_owned(), "a.txt".to_owned()),
        ]
        .into_iter()
        .collect();
        assert_eq!(a, b);
        assert_eq!(a.cache_key(), b.cache_key());
    }
}
