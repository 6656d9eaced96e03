use ramble_core::{Claim, MemoryConfig, Millis};

/// Exponential-decay recency factor keyed by the claim's temporality
/// half-life. Eternal claims never decay: factor is always 1.
pub fn recency(claim: &Claim, now: Millis) -> f64 {
    match claim.temporality.half_life_secs() {
        None => 1.0,
        Some(half_life_secs) => {
            let elapsed_secs = (now - claim.last_confirmed).max(0) as f64 / 1000.0;
            2f64.powf(-elapsed_secs / half_life_secs as f64)
        }
    }
}

fn confirmation(claim: &Claim) -> f64 {
    (claim.confirmation_count as f64 / 5.0).min(1.0)
}

fn access_boost(claim: &Claim, now: Millis, config: &MemoryConfig) -> f64 {
    let elapsed_secs = (now - claim.last_accessed).max(0) / 1000;
    if (elapsed_secs as u64) < config.access_boost_duration_secs {
        config.access_boost_factor - 1.0
    } else {
        0.0
    }
}

/// Weighted-sum salience score for one claim at `now`, clamped to `[0,1]`.
/// Combines recency, emotional intensity, stakes, confirmation count and
/// recent access the way `aigent-memory::scorer::is_core_eligible` combines
/// its own four signals.
pub fn compute_salience(claim: &Claim, now: Millis, config: &MemoryConfig) -> f64 {
    let raw = config.recency_weight * recency(claim, now)
        + config.emotional_weight * claim.emotional_intensity
        + config.stakes_weight * claim.stakes.weight()
        + config.confirmation_weight * confirmation(claim)
        + config.access_weight * access_boost(claim, now, config);
    raw.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ramble_core::{ClaimState, MemoryTier, Stakes, Temporality};

    fn base_claim(now: Millis) -> Claim {
        Claim {
            id: ramble_core::Id::new(),
            statement: "test".to_string(),
            subject: "test".to_string(),
            claim_type: "fact".to_string(),
            temporality: Temporality::FastDecaying,
            abstraction: "concrete".to_string(),
            source_type: "extraction".to_string(),
            initial_confidence: 1.0,
            current_confidence: 1.0,
            state: ClaimState::Active,
            emotional_valence: 0.0,
            emotional_intensity: 0.0,
            stakes: Stakes::Medium,
            valid_from: now,
            valid_until: None,
            created_at: now,
            last_confirmed: now,
            confirmation_count: 0,
            extraction_program_id: "test".to_string(),
            superseded_by: None,
            elaborates: None,
            memory_tier: MemoryTier::Working,
            salience: 0.0,
            promoted_at: None,
            last_accessed: now,
        }
    }

    #[test]
    fn eternal_claims_never_lose_recency() {
        let now = 10_000_000;
        let mut claim = base_claim(now);
        claim.temporality = Temporality::Eternal;
        claim.last_confirmed = 0;
        assert_eq!(recency(&claim, now), 1.0);
    }

    #[test]
    fn fast_decaying_claim_matches_3day_half_life_math() {
        let day_ms = 24 * 3_600 * 1000;
        let now = 3 * day_ms;
        let mut claim = base_claim(now);
        claim.last_confirmed = 0;
        let r = recency(&claim, now);
        assert!((r - 0.125).abs() < 1e-6);
    }

    #[test]
    fn salience_is_always_clamped() {
        let now = 0;
        let mut claim = base_claim(now);
        claim.emotional_intensity = 1.0;
        claim.stakes = Stakes::Existential;
        claim.confirmation_count = 10;
        let config = MemoryConfig::default();
        let s = compute_salience(&claim, now, &config);
        assert!((0.0..=1.0).contains(&s));
    }
}
