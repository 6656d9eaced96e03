use ramble_core::DiscourseFunction;

const MAX_CHARS: usize = 10_000;

/// Trims, collapses internal whitespace runs to a single space, and
/// truncates to `MAX_CHARS`.
pub fn sanitize(raw: &str) -> String {
    let collapsed: String = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(MAX_CHARS).collect()
}

const IMPERATIVE_LEADS: &[&str] = &["please", "remind", "set", "add", "remember", "schedule", "cancel", "stop"];
const COMMIT_VERBS: &[&str] = &["i will", "i'll", "i promise", "i plan to", "i'm going to", "i am going to"];
const EXPRESS_VERBS: &[&str] = &["i feel", "i love", "i hate", "i'm worried", "i am worried", "i'm excited", "i'm scared"];
const INTERROGATIVE_LEADS: &[&str] =
    &["who", "what", "when", "where", "why", "how", "is", "are", "do", "does", "can", "could", "should", "would"];

/// Heuristic discourse-function classification by keyword rule, cheapest
/// match first: question mark or interrogative lead, then
/// imperative lead, then first-person commitment/affect verbs, else a
/// plain assertion.
pub fn infer_discourse_function(text: &str) -> DiscourseFunction {
    let lower = text.to_lowercase();
    let trimmed = lower.trim();

    if trimmed.ends_with('?') || starts_with_any(trimmed, INTERROGATIVE_LEADS) {
        return DiscourseFunction::Question;
    }
    if starts_with_any(trimmed, IMPERATIVE_LEADS) {
        return DiscourseFunction::Command;
    }
    if contains_any(trimmed, COMMIT_VERBS) {
        return DiscourseFunction::Commit;
    }
    if contains_any(trimmed, EXPRESS_VERBS) {
        return DiscourseFunction::Express;
    }
    DiscourseFunction::Assert
}

fn starts_with_any(text: &str, leads: &[&str]) -> bool {
    leads.iter().any(|lead| {
        text == *lead
            || text
                .strip_prefix(lead)
                .map(|rest| rest.starts_with(' ') || rest.is_empty())
                .unwrap_or(false)
    })
}

fn contains_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| text.contains(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_collapses_whitespace_and_trims() {
        assert_eq!(sanitize("  hello   world  \n\t"), "hello world");
    }

    #[test]
    fn sanitize_truncates_long_input() {
        let long = "a".repeat(MAX_CHARS + 500);
        assert_eq!(sanitize(&long).chars().count(), MAX_CHARS);
    }

    #[test]
    fn question_mark_implies_question() {
        assert_eq!(infer_discourse_function("is this working?"), DiscourseFunction::Question);
    }

    #[test]
    fn imperative_lead_implies_command() {
        assert_eq!(infer_discourse_function("remind me to call mom"), DiscourseFunction::Command);
    }

    #[test]
    fn commitment_verb_implies_commit() {
        assert_eq!(infer_discourse_function("I will finish this by Friday"), DiscourseFunction::Commit);
    }

    #[test]
    fn affect_verb_implies_express() {
        assert_eq!(infer_discourse_function("I feel great about this"), DiscourseFunction::Express);
    }

    #[test]
    fn plain_statement_is_assert() {
        assert_eq!(infer_discourse_function("the sky is blue"), DiscourseFunction::Assert);
    }
}
