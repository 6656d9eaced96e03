use regex::Regex;

use ramble_core::{now_millis, Correction, Id};
use ramble_store::Store;

use crate::error::Result;

/// Result of running `CorrectionService::apply` over a transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessTextResult {
    pub text: String,
    pub applied: Vec<Id>,
}

/// One recognized utterance shape: the regex plus which capture group holds
/// the wrong (mistranscribed) text vs. the correct one.
struct UtterancePattern {
    regex: Regex,
    wrong_group: usize,
    correct_group: usize,
}

/// Strips a leading filler clause ("No ", "well,", "actually ", ...) so a
/// correction utterance tacked onto a denial or hedge still matches.
const LEADING_FILLER: &str = r#"(?i)^(?:no|well|actually|um+|uh+)[,.]?\s+"#;

/// Learns and replays user-taught corrections ("I said X, not Y") against
/// future transcripts.
pub struct CorrectionService {
    leading_filler: Regex,
    utterance_patterns: Vec<UtterancePattern>,
}

impl Default for CorrectionService {
    fn default() -> Self {
        Self {
            leading_filler: Regex::new(LEADING_FILLER).expect("static regex"),
            utterance_patterns: vec![
                UtterancePattern {
                    regex: Regex::new(r#"(?i)^i said (.+?),? not (.+)$"#).expect("static regex"),
                    wrong_group: 2,
                    correct_group: 1,
                },
                UtterancePattern {
                    regex: Regex::new(r#"(?i)^i meant (.+?),? not (.+)$"#).expect("static regex"),
                    wrong_group: 2,
                    correct_group: 1,
                },
                UtterancePattern {
                    regex: Regex::new(r#"(?i)^(.+?) is spelled (.+)$"#).expect("static regex"),
                    wrong_group: 1,
                    correct_group: 2,
                },
                UtterancePattern {
                    regex: Regex::new(r#"(?i)^that'?s (.+?),? not (.+)$"#).expect("static regex"),
                    wrong_group: 2,
                    correct_group: 1,
                },
            ],
        }
    }
}

impl CorrectionService {
    /// Parse a correction utterance ("I said Kubernetes, not Cooper NATO")
    /// into a wrong/correct pair, learning it into the Store. Returns
    /// `None` if `text` doesn't match any recognized pattern.
    pub fn learn_from_utterance(
        &self,
        store: &Store,
        text: &str,
        source_unit_id: Option<&Id>,
    ) -> Result<Option<Correction>> {
        let trimmed = text.trim();
        let stripped = self.leading_filler.replace(trimmed, "");
        for pattern in &self.utterance_patterns {
            let caps = match pattern.regex.captures(&stripped).or_else(|| pattern.regex.captures(trimmed)) {
                Some(caps) => caps,
                None => continue,
            };
            let wrong = caps
                .get(pattern.wrong_group)
                .map(|m| m.as_str().trim().trim_end_matches(['.', '!', '?']))
                .unwrap_or_default();
            let correct = caps
                .get(pattern.correct_group)
                .map(|m| m.as_str().trim().trim_end_matches(['.', '!', '?']))
                .unwrap_or_default();
            if wrong.is_empty() || correct.is_empty() {
                continue;
            }
            return Ok(Some(self.learn_explicit(store, wrong, correct, source_unit_id)?));
        }
        Ok(None)
    }

    /// Directly learn a wrong/correct pair (e.g. from a structured
    /// `addAsCorrection` global-replace payload).
    pub fn learn_explicit(
        &self,
        store: &Store,
        wrong: &str,
        correct: &str,
        source_unit_id: Option<&Id>,
    ) -> Result<Correction> {
        let now = now_millis();
        let correction = Correction {
            id: Id::new(),
            wrong_text: wrong.to_lowercase(),
            correct_text: correct.to_string(),
            original_case: wrong.to_string(),
            usage_count: 1,
            created_at: now,
            last_used: now,
            source_unit_id: source_unit_id.cloned(),
        };
        Ok(store.upsert_correction(&correction)?)
    }

    /// Apply all known corrections to `text`, case-preserving and
    /// word-boundary safe. Corrections are applied longest-wrong-text
    /// first, then lexicographically, so that a learned correction for
    /// "cooper NATO" takes precedence over one for "NATO" alone.
    pub fn apply(&self, text: &str, corrections: &[Correction]) -> ProcessTextResult {
        let mut ordered: Vec<&Correction> = corrections.iter().collect();
        ordered.sort_by(|a, b| {
            b.wrong_text
                .len()
                .cmp(&a.wrong_text.len())
                .then_with(|| a.wrong_text.cmp(&b.wrong_text))
        });

        let mut result = text.to_string();
        let mut applied = Vec::new();

        for correction in ordered {
            let pattern = match Regex::new(&format!(r"(?i)\b{}\b", regex::escape(&correction.wrong_text))) {
                Ok(re) => re,
                Err(_) => continue,
            };
            if pattern.is_match(&result) {
                result = pattern
                    .replace_all(&result, |caps: &regex::Captures| {
                        preserve_case(caps.get(0).unwrap().as_str(), &correction.correct_text)
                    })
                    .into_owned();
                applied.push(correction.id.clone());
            }
        }

        ProcessTextResult { text: result, applied }
    }
}

/// Match the case pattern of `original` onto `replacement`: all-caps stays
/// all-caps, title-case stays title-case, otherwise the replacement's own
/// casing is used verbatim.
fn preserve_case(original: &str, replacement: &str) -> String {
    if original.chars().all(|c| !c.is_alphabetic() || c.is_uppercase()) {
        replacement.to_uppercase()
    } else if original.chars().next().map(|c| c.is_uppercase()).unwrap_or(false) {
        let mut chars = replacement.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => replacement.to_string(),
        }
    } else {
        replacement.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn learns_correction_from_utterance() {
        let store = Store::in_memory("default").unwrap();
        let service = CorrectionService::default();
        let learned = service
            .learn_from_utterance(&store, "I said Kubernetes, not Cooper NATO", None)
            .unwrap()
            .expect("utterance should match");
        assert_eq!(learned.wrong_text, "cooper nato");
        assert_eq!(learned.correct_text, "Kubernetes");
    }

    #[test]
    fn learns_correction_behind_a_leading_denial() {
        let store = Store::in_memory("default").unwrap();
        let service = CorrectionService::default();
        let learned = service
            .learn_from_utterance(&store, "No I said Alice, not Alex.", None)
            .unwrap()
            .expect("utterance should match past the leading filler");
        assert_eq!(learned.wrong_text, "alex");
        assert_eq!(learned.correct_text, "Alice");
    }

    #[test]
    fn unrecognized_utterance_returns_none() {
        let store = Store::in_memory("default").unwrap();
        let service = CorrectionService::default();
        let learned = service
            .learn_from_utterance(&store, "the weather is nice today", None)
            .unwrap();
        assert!(learned.is_none());
    }

    #[test]
    fn apply_replaces_with_case_preserved() {
        let service = CorrectionService::default();
        let now = now_millis();
        let correction = Correction {
            id: Id::new(),
            wrong_text: "cooper nato".to_string(),
            correct_text: "Kubernetes".to_string(),
            original_case: "Cooper NATO".to_string(),
            usage_count: 3,
            created_at: now,
            last_used: now,
            source_unit_id: None,
        };
        let result = service.apply("I was debugging Cooper NATO all day", &[correction]);
        assert_eq!(result.text, "I was debugging Kubernetes all day");
        assert_eq!(result.applied.len(), 1);
    }

    #[test]
    fn longer_corrections_take_precedence() {
        let service = CorrectionService::default();
        let now = now_millis();
        let specific = Correction {
            id: Id::new(),
            wrong_text: "cooper nato cluster".to_string(),
            correct_text: "Kubernetes cluster".to_string(),
            original_case: String::new(),
            usage_count: 1,
            created_at: now,
            last_used: now,
            source_unit_id: None,
        };
        let generic = Correction {
            id: Id::new(),
            wrong_text: "cooper nato".to_string(),
            correct_text: "Kubernetes".to_string(),
            original_case: String::new(),
            usage_count: 1,
            created_at: now,
            last_used: now,
            source_unit_id: None,
        };
        let result = service.apply("the cooper nato cluster is down", &[generic, specific]);
        assert_eq!(result.text, "the Kubernetes cluster is down");
    }
}
