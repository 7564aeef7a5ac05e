//! Key/value view over a `;`-separated connection string.

use std::collections::BTreeMap;

/// Parsed connection string options.
///
/// Keys are compared case-insensitively and surrounding whitespace is
/// ignored. Later duplicates override earlier ones. Segments without `=`
/// are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionOptions {
    entries: BTreeMap<String, String>,
}

impl ConnectionOptions {
    /// Parses a connection string.
    #[must_use]
    pub fn parse(connection: &str) -> Self {
        let entries = connection
            .split(';')
            .filter_map(|segment| segment.split_once('='))
            .map(|(key, value)| (key.trim().to_lowercase(), value.trim().to_string()))
            .filter(|(key, _)| !key.is_empty())
            .collect();
        Self { entries }
    }

    /// Returns the value for `key`, ignoring case.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(&key.to_lowercase()).map(String::as_str)
    }

    /// Returns the database name (`Database` or `Initial Catalog`).
    #[must_use]
    pub fn database(&self) -> Option<&str> {
        self.get("database")
            .or_else(|| self.get("initial catalog"))
            .filter(|name| !name.is_empty())
    }

    /// Number of parsed options.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no option was parsed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let opts = ConnectionOptions::parse("Server=X; Database = Y ;Integrated Security=True;");
        assert_eq!(opts.get("server"), Some("X"));
        assert_eq!(opts.get("DATABASE"), Some("Y"));
        assert_eq!(opts.database(), Some("Y"));
        assert_eq!(opts.len(), 3);
        assert_eq!(opts.get("user id"), None);
    }

    #[test]
    fn test_initial_catalog_fallback() {
        let opts = ConnectionOptions::parse("Data Source=.;Initial Catalog=Shop;User Id=sa");
        assert_eq!(opts.database(), Some("Shop"));
        assert_eq!(opts.get("User ID"), Some("sa"));
    }

    #[test]
    fn test_skips_malformed_segments() {
        let opts = ConnectionOptions::parse("garbage;;=x;Database=");
        assert_eq!(opts.len(), 1);
        assert_eq!(opts.database(), None);
    }

    #[test]
    fn test_empty() {
        assert!(ConnectionOptions::parse("").is_empty());
    }
}
