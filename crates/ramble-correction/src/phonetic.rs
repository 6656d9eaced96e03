use rphonetic::{DoubleMetaphone, Encoder};
use strsim::levenshtein;

use ramble_core::Entity;

/// A candidate correction for a mis-transcribed token, surfaced as a hint
/// string for the extraction pipeline's prompt — never applied
/// automatically.
#[derive(Debug, Clone, PartialEq)]
pub struct PhoneticHint {
    pub heard: String,
    pub suggested: String,
    pub reason: String,
}

/// Computes Double Metaphone codes and matches them (or a Levenshtein
/// distance for already-typed text) against known vocabulary and entity
/// names.
pub struct PhoneticMatcher {
    encoder: DoubleMetaphone,
    levenshtein_cutoff: usize,
}

impl Default for PhoneticMatcher {
    fn default() -> Self {
        Self {
            encoder: DoubleMetaphone::default(),
            levenshtein_cutoff: 2,
        }
    }
}

impl PhoneticMatcher {
    pub fn new(levenshtein_cutoff: usize) -> Self {
        Self {
            encoder: DoubleMetaphone::default(),
            levenshtein_cutoff,
        }
    }

    /// Primary Double Metaphone code for a single token.
    pub fn encode(&self, token: &str) -> String {
        self.encoder.encode(token)
    }

    /// Find vocabulary/entity names phonetically close to `token` (spoken
    /// input) by comparing Double Metaphone codes.
    pub fn phonetic_matches<'a>(
        &self,
        token: &str,
        known: impl Iterator<Item = (&'a str, &'a str)>,
    ) -> Vec<PhoneticHint> {
        let code = self.encode(token);
        let mut hints = Vec::new();
        for (name, name_code) in known {
            if name_code == code && !name.eq_ignore_ascii_case(token) {
                hints.push(PhoneticHint {
                    heard: token.to_string(),
                    suggested: name.to_string(),
                    reason: "phonetic match".to_string(),
                });
            }
        }
        hints
    }

    /// Find entity names within the Levenshtein cutoff of `token` (typed
    /// input).
    pub fn fuzzy_matches(&self, token: &str, entities: &[Entity]) -> Vec<PhoneticHint> {
        let lower = token.to_lowercase();
        let mut hints = Vec::new();
        for entity in entities {
            let dist = levenshtein(&lower, &entity.canonical_name.to_lowercase());
            if dist > 0 && dist <= self.levenshtein_cutoff {
                hints.push(PhoneticHint {
                    heard: token.to_string(),
                    suggested: entity.canonical_name.clone(),
                    reason: format!("edit distance {dist}"),
                });
            }
        }
        hints
    }

    /// Render hints as the fixed-template prompt block the pipeline
    /// appends ahead of the LLM call.
    pub fn format_hints(hints: &[PhoneticHint]) -> String {
        if hints.is_empty() {
            return String::new();
        }
        let mut block = String::from("Possible mis-transcriptions (do not apply automatically):\n");
        for hint in hints {
            block.push_str(&format!("- \"{}\" may be \"{}\" ({})\n", hint.heard, hint.suggested, hint.reason));
        }
        block
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ramble_core::Id;

    #[test]
    fn same_code_for_phonetically_similar_names() {
        let matcher = PhoneticMatcher::default();
        assert_eq!(matcher.encode("Smith"), matcher.encode("Smyth"));
    }

    #[test]
    fn fuzzy_matches_within_cutoff() {
        let matcher = PhoneticMatcher::new(2);
        let entities = vec![Entity {
            id: Id::new(),
            canonical_name: "Kubernetes".to_string(),
            entity_type: "technology".to_string(),
            aliases: vec![],
            mention_count: 1,
            first_mentioned: 0,
            last_referenced: 0,
        }];
        let hints = matcher.fuzzy_matches("Kubernets", &entities);
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].suggested, "Kubernetes");
    }

    #[test]
    fn format_hints_is_empty_for_no_matches() {
        assert_eq!(PhoneticMatcher::format_hints(&[]), "");
    }
}
