use ramble_core::{BackoffConfig, Millis};

/// `next_retry_at = now + min(max_delay, base_delay * multiplier^attempts) * (1 + jitter)`,
/// jitter drawn uniformly from `[0, jitter_factor)`.
pub fn next_retry_at(now: Millis, attempts: u32, config: &BackoffConfig) -> Millis {
    let exp = config.multiplier.powi(attempts as i32);
    let raw_delay = (config.base_delay_ms as f64 * exp).min(config.max_delay_ms as f64);
    let jitter = rand::random::<f64>() * config.jitter_factor;
    let delay_ms = (raw_delay * (1.0 + jitter)) as i64;
    now + delay_ms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_with_attempts() {
        let config = BackoffConfig::default_spec();
        let now = 0;
        let d1 = next_retry_at(now, 0, &config) - now;
        let d2 = next_retry_at(now, 3, &config) - now;
        assert!(d2 > d1);
    }

    #[test]
    fn delay_is_capped_at_max_with_jitter_bound() {
        let config = BackoffConfig::default_spec();
        let now = 0;
        let delay = next_retry_at(now, 20, &config) - now;
        let ceiling = (config.max_delay_ms as f64 * (1.0 + config.jitter_factor)) as i64;
        assert!(delay <= ceiling);
    }
}
