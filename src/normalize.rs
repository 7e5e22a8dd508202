//! Text canonicalization.
//!
//! [`normalize`] maps free text to a canonical string in four fixed steps:
//! lower-case, punctuation to space, whitespace collapse, token substitution.
//! The order is part of the contract; reordering changes the keys derived from
//! existing data.

use std::sync::OnceLock;

use regex::Regex;

use crate::rules::NormalizationRules;

/// Anything that is neither alphanumeric nor whitespace.
///
/// Matches single characters so every punctuation mark becomes exactly one space.
fn punctuation() -> &'static Regex {
    static PUNCTUATION: OnceLock<Regex> = OnceLock::new();
    PUNCTUATION.get_or_init(|| {
        Regex::new(r"[^\p{Alphabetic}\p{N}\s]").expect("punctuation pattern is valid")
    })
}

/// Applies the first three normalization steps, without substitution.
///
/// The result contains only lower-case alphanumerics separated by single spaces.
///
/// # Examples
///
/// ```
/// use practice_dedupe::canonicalize;
///
/// assert_eq!(canonicalize("  123 Main St.,Suite#4 "), "123 main st suite 4");
/// ```
#[must_use]
pub fn canonicalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let spaced = punctuation().replace_all(&lowered, " ");
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalizes a free-text field against a rule set.
///
/// Absent input yields an empty string. Tokens present in
/// `rules.substitutions` are replaced by their canonical value; a rule with an
/// empty value drops the token.
///
/// This is a pure function of its inputs and may be called concurrently from
/// any number of threads sharing the same `rules`.
///
/// # Examples
///
/// ```
/// use practice_dedupe::{normalize, NormalizationRules};
///
/// let rules = NormalizationRules::from_pairs([("st", "street"), ("ave", "avenue")]);
/// assert_eq!(normalize(Some("12 Oak Ave."), &rules), "12 oak avenue");
/// assert_eq!(normalize(None, &rules), "");
/// ```
#[must_use]
pub fn normalize(text: Option<&str>, rules: &NormalizationRules) -> String {
    let Some(text) = text else {
        return String::new();
    };

    let canonical = canonicalize(text);
    if rules.is_empty() {
        return canonical;
    }

    canonical
        .split_whitespace()
        .map(|token| rules.substitute(token))
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn street_rules() -> NormalizationRules {
        NormalizationRules::from_pairs([("st", "street"), ("rd", "road"), ("dr", "doctor")])
    }

    #[test]
    fn test_absent_input_is_empty() {
        assert_eq!(normalize(None, &street_rules()), "");
        assert_eq!(normalize(Some(""), &street_rules()), "");
        assert_eq!(normalize(Some("  ...  "), &street_rules()), "");
    }

    #[test]
    fn test_lowercases_and_collapses_whitespace() {
        let rules = NormalizationRules::default();
        assert_eq!(normalize(Some("  John \t  DOE\n"), &rules), "john doe");
    }

    #[test]
    fn test_punctuation_does_not_merge_words() {
        let rules = NormalizationRules::default();
        assert_eq!(normalize(Some("Smith&Jones,LLC"), &rules), "smith jones llc");
        assert_eq!(normalize(Some("O'Brien-Kelly"), &rules), "o brien kelly");
    }

    #[test]
    fn test_substitution_applies_per_token() {
        let rules = street_rules();
        assert_eq!(normalize(Some("123 Main St."), &rules), "123 main street");
        // "st" inside a longer token is not a match
        assert_eq!(normalize(Some("Stanford St"), &rules), "stanford street");
    }

    #[test]
    fn test_substitution_runs_after_punctuation_split() {
        let rules = street_rules();
        assert_eq!(normalize(Some("Dr.Smith"), &rules), "doctor smith");
    }

    #[test]
    fn test_empty_substitution_drops_token() {
        let rules = NormalizationRules::from_pairs([("llc", ""), ("inc", "")]);
        assert_eq!(normalize(Some("Acme Dental, LLC"), &rules), "acme dental");
        assert_eq!(normalize(Some("LLC"), &rules), "");
    }

    #[test]
    fn test_multi_word_substitution() {
        let rules = NormalizationRules::from_pairs([("ctr", "center"), ("mtn", "mountain view")]);
        assert_eq!(normalize(Some("Mtn Ctr"), &rules), "mountain view center");
    }

    #[test]
    fn test_unicode_letters_are_kept() {
        let rules = NormalizationRules::default();
        assert_eq!(normalize(Some("Café  Müller-Straße"), &rules), "café müller straße");
    }

    #[test]
    fn test_deterministic() {
        let rules = street_rules();
        let inputs = ["123 Main St.", "Dr. Who's Clinic", "", "  A&B  "];
        for input in inputs {
            let first = normalize(Some(input), &rules);
            for _ in 0..8 {
                assert_eq!(normalize(Some(input), &rules), first);
            }
        }
    }

    #[test]
    fn test_idempotent_without_chains() {
        let rules = street_rules();
        let inputs = [
            "123 Main St.",
            "  456 Oak Rd ",
            "Dr. Jane   SMITH, D.D.S.",
            "Suite #4/B",
            "",
        ];
        for input in inputs {
            let once = normalize(Some(input), &rules);
            let twice = normalize(Some(&once), &rules);
            assert_eq!(once, twice, "input {input:?}");
        }
    }

    #[test]
    fn test_canonicalize_output_alphabet() {
        let out = canonicalize("Hello, World! 42 -- Ünïcode\u{00a0}test");
        assert!(out
            .chars()
            .all(|c| c == ' ' || c.is_alphanumeric()));
        assert!(!out.contains("  "));
        assert_eq!(out, out.trim());
    }

    #[test]
    fn test_concurrent_calls_share_rules() {
        let rules = street_rules();
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| normalize(Some("123 Main St."), &rules)))
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), "123 main street");
            }
        });
    }
}
