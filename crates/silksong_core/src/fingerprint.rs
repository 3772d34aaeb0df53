use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Identity of a flag report: lowercase hex SHA-256 of its exact text.
///
/// Used to deduplicate history entries. It says nothing about whether the
/// underlying save decodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub const HEX_LEN: usize = 64;
    const SHORT_LEN: usize = 12;

    pub fn of(text: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Accepts a full 64-character hex digest in either case.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.len() != Self::HEX_LEN || !raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self(raw.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> &str {
        &self.0[..Self::SHORT_LEN.min(self.0.len())]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::Fingerprint;

    #[test]
    fn same_text_same_fingerprint() {
        let a = Fingerprint::of("SavedFlea_Ant_03: true\n");
        let b = Fingerprint::of(&String::from("SavedFlea_Ant_03: true\n"));
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), Fingerprint::HEX_LEN);
    }

    #[test]
    fn one_value_changes_the_fingerprint() {
        let a = Fingerprint::of("SavedFlea_Ant_03: true\n");
        let b = Fingerprint::of("SavedFlea_Ant_03: false\n");
        assert_ne!(a, b);
    }

    #[test]
    fn empty_text_has_the_known_digest() {
        assert_eq!(
            Fingerprint::of("").as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn parse_normalizes_case_and_rejects_bad_input() {
        let upper = "E3B0C44298FC1C149AFBF4C8996FB92427AE41E4649B934CA495991B7852B855";
        assert_eq!(Fingerprint::parse(upper), Some(Fingerprint::of("")));
        assert_eq!(Fingerprint::parse("e3b0"), None);
        assert_eq!(Fingerprint::parse(&"z".repeat(64)), None);
    }

    #[test]
    fn short_form_is_a_prefix() {
        let fp = Fingerprint::of("x");
        assert!(fp.as_str().starts_with(fp.short()));
        assert_eq!(fp.short().len(), 12);
    }
}
