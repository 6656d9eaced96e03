use ramble_core::{ProgressType, Timeframe};

/// Pure inference rule for a new goal's `progressType`:
/// maintenance/process goals track continuously, immediate/short-term
/// outcomes are pass/fail, long-term/life goals accrue milestones, and
/// everything else is tracked as a raw percentage.
pub fn infer_progress_type(goal_type: &str, timeframe: Timeframe) -> ProgressType {
    match goal_type {
        "maintenance" | "process" => ProgressType::Continuous,
        "outcome" => match timeframe {
            Timeframe::Immediate | Timeframe::ShortTerm => ProgressType::Binary,
            Timeframe::LongTerm | Timeframe::Life => ProgressType::Milestone,
            Timeframe::MediumTerm => ProgressType::Percentage,
        },
        _ => match timeframe {
            Timeframe::LongTerm | Timeframe::Life => ProgressType::Milestone,
            _ => ProgressType::Percentage,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maintenance_goals_are_continuous() {
        assert_eq!(infer_progress_type("maintenance", Timeframe::LongTerm), ProgressType::Continuous);
    }

    #[test]
    fn immediate_outcome_is_binary() {
        assert_eq!(infer_progress_type("outcome", Timeframe::Immediate), ProgressType::Binary);
    }

    #[test]
    fn long_term_outcome_is_milestone() {
        assert_eq!(infer_progress_type("outcome", Timeframe::Life), ProgressType::Milestone);
    }

    #[test]
    fn unmatched_type_falls_back_to_percentage() {
        assert_eq!(infer_progress_type("aspiration", Timeframe::MediumTerm), ProgressType::Percentage);
    }
}
