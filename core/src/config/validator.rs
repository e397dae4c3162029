//! Range checks applied after every load

use crate::config::error::{ConfigError, Result};
use crate::config::loader::SqlGateConfig;

/// Reject configurations the pipeline cannot run with.
pub fn validate(config: &SqlGateConfig) -> Result<()> {
    let fraction = config.gate.max_improvable_fraction;
    if !(0.0..=1.0).contains(&fraction) {
        return Err(invalid(format!(
            "gate.max_improvable_fraction must be within [0, 1], got {fraction}"
        )));
    }

    if config.pipeline.concurrency == 0 {
        return Err(invalid("pipeline.concurrency must be at least 1".to_string()));
    }

    let retry = &config.evaluator.retry;
    if retry.max_attempts == 0 {
        return Err(invalid("evaluator.retry.max_attempts must be at least 1".to_string()));
    }
    if retry.base_delay_ms > retry.max_delay_ms {
        return Err(invalid(format!(
            "evaluator.retry.base_delay_ms ({}) exceeds max_delay_ms ({})",
            retry.base_delay_ms, retry.max_delay_ms
        )));
    }
    if !(0.0..=1.0).contains(&retry.jitter_factor) {
        return Err(invalid(format!(
            "evaluator.retry.jitter_factor must be within [0, 1], got {}",
            retry.jitter_factor
        )));
    }

    let temperature = config.evaluator.temperature;
    if !(0.0..=2.0).contains(&temperature) {
        return Err(invalid(format!(
            "evaluator.temperature must be within [0, 2], got {temperature}"
        )));
    }

    Ok(())
}

fn invalid(message: String) -> ConfigError {
    ConfigError::ValidationError(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate(&SqlGateConfig::default()).is_ok());
    }

    #[test]
    fn each_rule_rejects() {
        let cases: Vec<Box<dyn Fn(&mut SqlGateConfig)>> = vec![
            Box::new(|c: &mut SqlGateConfig| c.gate.max_improvable_fraction = -0.1),
            Box::new(|c: &mut SqlGateConfig| c.gate.max_improvable_fraction = f64::NAN),
            Box::new(|c: &mut SqlGateConfig| c.pipeline.concurrency = 0),
            Box::new(|c: &mut SqlGateConfig| c.evaluator.retry.max_attempts = 0),
            Box::new(|c: &mut SqlGateConfig| c.evaluator.retry.base_delay_ms = c.evaluator.retry.max_delay_ms + 1),
            Box::new(|c: &mut SqlGateConfig| c.evaluator.retry.jitter_factor = 1.5),
            Box::new(|c: &mut SqlGateConfig| c.evaluator.temperature = 2.5),
        ];
        for mutate in cases {
            let mut config = SqlGateConfig::default();
            mutate(&mut config);
            assert!(
                matches!(validate(&config), Err(ConfigError::ValidationError(_))),
                "{config:?} should be rejected"
            );
        }
    }

    #[test]
    fn boundaries_are_accepted() {
        let mut config = SqlGateConfig::default();
        config.gate.max_improvable_fraction = 1.0;
        config.evaluator.temperature = 0.0;
        config.evaluator.retry.base_delay_ms = config.evaluator.retry.max_delay_ms;
        assert!(validate(&config).is_ok());
    }
}
