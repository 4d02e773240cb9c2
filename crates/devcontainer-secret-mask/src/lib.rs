//! Redacts known secret values from text before it reaches a log sink or
//! the user's terminal.
//!
//! Secrets come from `--secrets-file` and are rebuilt into a single
//! automaton whenever the set changes; matching is literal-substring,
//! longest-first, so a secret that happens to be a prefix of another never
//! causes a shorter, partial mask to leak the remainder.

use aho_corasick::{AhoCorasick, MatchKind};

pub const MASK: &str = "********";

#[derive(Clone)]
pub struct SecretMasker {
    automaton: Option<AhoCorasick>,
}

impl SecretMasker {
    /// Build a masker from the given secret values. Empty strings are
    /// dropped — an empty pattern would match everywhere and mask the
    /// entire stream.
    pub fn new<I, S>(secrets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: Vec<String> = secrets
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if patterns.is_empty() {
            return Self { automaton: None };
        }

        let automaton = AhoCorasick::builder()
            .match_kind(MatchKind::LeftmostLongest)
            .build(&patterns)
            .expect("secret patterns are plain literal strings");

        Self {
            automaton: Some(automaton),
        }
    }

    pub fn empty() -> Self {
        Self { automaton: None }
    }

    pub fn has_secrets(&self) -> bool {
        self.automaton.is_some()
    }

    /// Replace every occurrence of a known secret in `text` with [`MASK`].
    pub fn mask(&self, text: &str) -> String {
        match &self.automaton {
            Some(ac) => ac.replace_all(text, &vec![MASK; ac.patterns_len()]),
            None => text.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_single_occurrence() {
        let masker = SecretMasker::new(["sekrit-token"]);
        assert_eq!(
            masker.mask("curl -H 'Authorization: sekrit-token'"),
            "curl -H 'Authorization: ********'"
        );
    }

    #[test]
    fn masks_multiple_occurrences_of_same_secret() {
        let masker = SecretMasker::new(["abc123"]);
        assert_eq!(masker.mask("abc123 and again abc123"), "******** and again ********");
    }

    #[test]
    fn longest_match_wins_when_one_secret_prefixes_another() {
        let masker = SecretMasker::new(["ab", "abcdef"]);
        assert_eq!(masker.mask("value=abcdef"), "value=********");
    }

    #[test]
    fn empty_secret_set_is_a_no_op() {
        let masker = SecretMasker::empty();
        assert!(!masker.has_secrets());
        assert_eq!(masker.mask("nothing to hide"), "nothing to hide");
    }

    #[test]
    fn empty_string_secret_is_ignored() {
        let masker = SecretMasker::new(["", "real-secret"]);
        assert_eq!(masker.mask("value=real-secret"), "value=********");
    }

    #[test]
    fn non_matching_text_is_unchanged() {
        let masker = SecretMasker::new(["sekrit"]);
        assert_eq!(masker.mask("nothing here"), "nothing here");
    }
}
