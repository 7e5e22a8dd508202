//! Normalization rule set.
//!
//! Rules are a flat token substitution table read from a JSON file:
//!
//! ```json
//! { "substitutions": { "st": "street", "ave": "avenue", "llc": "" } }
//! ```
//!
//! Keys are matched against single normalized tokens, so they are canonicalized
//! on load (`"St."` becomes `st`); a key that does not reduce to exactly one
//! token is skipped with a warning and the rest of the table still applies.
//! Values are canonicalized the same way, which keeps substituted output in
//! canonical form.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::normalize::canonicalize;

/// Immutable token substitution table consumed by the normalizer.
///
/// The default value is the empty rule set, under which normalization reduces
/// to case, punctuation and whitespace canonicalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationRules {
    #[serde(default)]
    substitutions: BTreeMap<String, String>,
}

impl NormalizationRules {
    /// Builds a rule set from `(token, replacement)` pairs.
    ///
    /// Keys and values are canonicalized like normalized text, so `"St."`
    /// matches the token `st`. Keys that cannot match a single token (empty,
    /// or several words) are skipped with a warning.
    #[must_use]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut substitutions = BTreeMap::new();
        for (key, value) in pairs {
            let Some(token) = rule_token(key.as_ref()) else {
                continue;
            };
            let value = canonicalize(value.as_ref());
            match substitutions.entry(token) {
                Entry::Vacant(slot) => {
                    slot.insert(value);
                }
                Entry::Occupied(slot) if *slot.get() != value => tracing::warn!(
                    key = key.as_ref(),
                    token = %slot.key(),
                    kept = %slot.get(),
                    "conflicting substitution for the same token; keeping the first"
                ),
                Entry::Occupied(_) => {}
            }
        }
        Self { substitutions }
    }

    /// Loads and validates a rule file.
    ///
    /// # Errors
    ///
    /// - `ConfigError::NotFound` if `path` does not exist
    /// - `ConfigError::Parse` if the file is not rule JSON
    /// - `ConfigError::Io` for any other read failure
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                ConfigError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let rules = Self::parse(path, &contents)?;
        tracing::debug!(
            path = %path.display(),
            substitutions = rules.len(),
            "loaded normalization rules"
        );
        Ok(rules)
    }

    /// Parses and validates rule JSON held in memory.
    ///
    /// # Errors
    ///
    /// Same as [`NormalizationRules::load`], minus the file-system variants.
    pub fn from_json_str(contents: &str) -> Result<Self, ConfigError> {
        Self::parse(Path::new("<inline>"), contents)
    }

    fn parse(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        let raw: Self = serde_json::from_str(contents).map_err(|e| ConfigError::Parse {
            path: PathBuf::from(path),
            message: e.to_string(),
        })?;

        let rules = Self::from_pairs(raw.substitutions);
        for key in rules.chained_keys() {
            tracing::warn!(
                key,
                "substitution output feeds another rule; normalization is not idempotent for it"
            );
        }
        Ok(rules)
    }

    /// Returns the replacement for `token`, or `token` itself when unmapped.
    #[must_use]
    pub fn substitute<'a>(&'a self, token: &'a str) -> &'a str {
        self.substitutions.get(token).map_or(token, String::as_str)
    }

    /// Returns the replacement configured for `token`, if any.
    #[must_use]
    pub fn get(&self, token: &str) -> Option<&str> {
        self.substitutions.get(token).map(String::as_str)
    }

    /// Number of substitution entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.substitutions.len()
    }

    /// Returns true if there are no substitutions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.substitutions.is_empty()
    }

    /// Keys whose replacement contains a token that is itself rewritten.
    ///
    /// Substitution is single pass, so chains never loop, but text normalized
    /// once will change again if normalized a second time.
    #[must_use]
    pub fn chained_keys(&self) -> Vec<&str> {
        self.substitutions
            .iter()
            .filter(|(_, value)| value.split(' ').any(|token| self.rewrites(token)))
            .map(|(key, _)| key.as_str())
            .collect()
    }

    fn rewrites(&self, token: &str) -> bool {
        self.substitutions
            .get(token)
            .is_some_and(|replacement| replacement != token)
    }
}

/// The single normalized token a rule key matches, if there is one.
fn rule_token(key: &str) -> Option<String> {
    let token = canonicalize(key);
    if token.is_empty() || token.contains(' ') {
        tracing::warn!(key, "substitution key never matches a single token; skipped");
        return None;
    }
    Some(token)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_rules(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_valid_file() {
        let file = write_rules(r#"{"substitutions": {"st": "street", "ave": "avenue"}}"#);
        let rules = NormalizationRules::load(file.path()).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules.get("st"), Some("street"));
        assert_eq!(rules.substitute("ave"), "avenue");
        assert_eq!(rules.substitute("blvd"), "blvd");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = NormalizationRules::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn test_load_malformed_file() {
        let file = write_rules("substitutions: [st, street]");
        let err = NormalizationRules::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_wrong_shape_is_parse_error() {
        let err = NormalizationRules::from_json_str(r#"{"substitutions": ["st", "street"]}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_missing_substitutions_key_is_empty() {
        let rules = NormalizationRules::from_json_str("{}").unwrap();
        assert!(rules.is_empty());
    }

    #[test]
    fn test_keys_are_case_normalized() {
        let rules =
            NormalizationRules::from_json_str(r#"{"substitutions": {" ST ": "Street"}}"#).unwrap();
        assert_eq!(rules.get("st"), Some("street"));
        assert_eq!(rules.get("ST"), None);
    }

    #[test]
    fn test_values_are_canonicalized() {
        let rules =
            NormalizationRules::from_json_str(r#"{"substitutions": {"ctr": "Medical  Center."}}"#)
                .unwrap();
        assert_eq!(rules.get("ctr"), Some("medical center"));
    }

    #[test]
    fn test_unmatchable_keys_are_skipped() {
        for key in ["", "   ", "...", "main st", "a&b"] {
            let json = serde_json::json!({ "substitutions": { key: "x", "rd": "road" } }).to_string();
            let rules = NormalizationRules::from_json_str(&json).unwrap();
            assert_eq!(rules.len(), 1, "key {key:?}");
            assert_eq!(rules.get("rd"), Some("road"));
        }
    }

    #[test]
    fn test_punctuated_key_still_applies() {
        let rules =
            NormalizationRules::from_json_str(r#"{"substitutions": {"st": "street", "st.": "street"}}"#)
                .unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(
            crate::normalize::normalize(Some("123 Main St."), &rules),
            "123 main street"
        );

        let dotted_only =
            NormalizationRules::from_json_str(r#"{"substitutions": {"Ave.": "avenue"}}"#).unwrap();
        assert_eq!(dotted_only.get("ave"), Some("avenue"));
    }

    #[test]
    fn test_conflicting_spellings_keep_first() {
        let rules = NormalizationRules::from_pairs([("st", "street"), ("ST.", "saint")]);
        assert_eq!(rules.get("st"), Some("street"));
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn test_empty_key_never_rewrites_empty_input() {
        let rules = NormalizationRules::from_pairs([("", "x"), ("  ", "y")]);
        assert!(rules.is_empty());
        assert_eq!(crate::normalize::normalize(Some(""), &rules), "");
        assert_eq!(crate::normalize::normalize(None, &rules), "");
    }

    #[test]
    fn test_chained_keys() {
        let rules = NormalizationRules::from_pairs([("st", "str"), ("str", "street"), ("rd", "road")]);
        assert_eq!(rules.chained_keys(), vec!["st"]);

        let identity = NormalizationRules::from_pairs([("ave", "avenue"), ("avenue", "avenue")]);
        assert!(identity.chained_keys().is_empty());

        let self_feeding = NormalizationRules::from_pairs([("ave", "ave avenue")]);
        assert_eq!(self_feeding.chained_keys(), vec!["ave"]);
    }

    #[test]
    fn test_serialization_shape() {
        let rules = NormalizationRules::from_pairs([("st", "street")]);
        let json = serde_json::to_value(&rules).unwrap();
        assert_eq!(json, serde_json::json!({ "substitutions": { "st": "street" } }));
    }
}
