//! Latency and error injection at the transport boundary

use clap::ValueEnum;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::ops::Range;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_DELAY_MS: Range<u64> = 1000..3000;
pub const DEFAULT_ERROR_RATE: f64 = 0.3;
pub const INJECTED_STATUSES: [u16; 6] = [400, 401, 403, 404, 500, 503];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    #[default]
    Normal,
    Slow,
    ErrorHeavy,
    SadPath,
}

impl Scenario {
    pub fn delays(&self) -> bool {
        matches!(self, Self::Slow | Self::SadPath)
    }

    pub fn injects_errors(&self) -> bool {
        matches!(self, Self::ErrorHeavy | Self::SadPath)
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Normal => "normal",
            Self::Slow => "slow",
            Self::ErrorHeavy => "error-heavy",
            Self::SadPath => "sad-path",
        };
        f.write_str(name)
    }
}

/// What to do with one routed request
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub delay: Option<Duration>,
    /// Status to short-circuit with instead of running the handler
    pub fail_with: Option<u16>,
}

pub struct ScenarioPolicy {
    scenario: Scenario,
    delay_ms: Range<u64>,
    error_rate: f64,
    rng: Mutex<StdRng>,
}

impl ScenarioPolicy {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            delay_ms: DEFAULT_DELAY_MS,
            error_rate: DEFAULT_ERROR_RATE,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_delay_range(mut self, delay_ms: Range<u64>) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn with_error_rate(mut self, rate: f64) -> Self {
        self.error_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn scenario(&self) -> Scenario {
        self.scenario
    }

    /// Roll the dice for one request
    pub fn decide(&self) -> Decision {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);

        let delay = if self.scenario.delays() && !self.delay_ms.is_empty() {
            Some(Duration::from_millis(rng.gen_range(self.delay_ms.clone())))
        } else {
            None
        };
        let fail_with = if self.scenario.injects_errors() && rng.gen_bool(self.error_rate) {
            INJECTED_STATUSES.choose(&mut *rng).copied()
        } else {
            None
        };

        Decision { delay, fail_with }
    }

    /// Sleep if the scenario says so, then report an injected failure status
    pub async fn before_handler(&self) -> Option<u16> {
        let decision = self.decide();
        if let Some(delay) = decision.delay {
            debug!(scenario = %self.scenario, delay_ms = delay.as_millis() as u64, "injecting delay");
            tokio::time::sleep(delay).await;
        }
        if let Some(status) = decision.fail_with {
            debug!(scenario = %self.scenario, status, "injecting failure");
        }
        decision.fail_with
    }
}

/// Error body returned for an injected failure
pub fn failure_body(status: u16) -> Value {
    json!({
        "success": false,
        "error": format!("Injected failure ({})", status),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_never_interferes() {
        let policy = ScenarioPolicy::new(Scenario::Normal).with_seed(1);
        for _ in 0..100 {
            assert_eq!(
                policy.decide(),
                Decision {
                    delay: None,
                    fail_with: None
                }
            );
        }
    }

    #[test]
    fn test_slow_delays_within_range() {
        let policy = ScenarioPolicy::new(Scenario::Slow).with_seed(2);
        for _ in 0..100 {
            let decision = policy.decide();
            let delay = decision.delay.unwrap().as_millis() as u64;
            assert!(DEFAULT_DELAY_MS.contains(&delay));
            assert!(decision.fail_with.is_none());
        }
    }

    #[test]
    fn test_error_heavy_injects_known_statuses() {
        let policy = ScenarioPolicy::new(Scenario::ErrorHeavy).with_seed(3);
        let mut failures = 0;
        for _ in 0..1000 {
            let decision = policy.decide();
            assert!(decision.delay.is_none());
            if let Some(status) = decision.fail_with {
                assert!(INJECTED_STATUSES.contains(&status));
                failures += 1;
            }
        }
        // 30% of 1000 with generous slack
        assert!((200..400).contains(&failures), "{} failures", failures);
    }

    #[test]
    fn test_sad_path_does_both() {
        let policy = ScenarioPolicy::new(Scenario::SadPath)
            .with_seed(4)
            .with_error_rate(1.0)
            .with_delay_range(5..6);
        let decision = policy.decide();
        assert_eq!(decision.delay, Some(Duration::from_millis(5)));
        assert!(decision.fail_with.is_some());
    }

    #[tokio::test]
    async fn test_before_handler_sleeps_and_fails() {
        let policy = ScenarioPolicy::new(Scenario::SadPath)
            .with_error_rate(1.0)
            .with_delay_range(1..2);
        let status = policy.before_handler().await;
        assert!(status.is_some());
    }

    #[test]
    fn test_scenario_names() {
        assert_eq!(Scenario::ErrorHeavy.to_string(), "error-heavy");
        let parsed: Scenario = serde_json::from_str("\"sad-path\"").unwrap();
        assert_eq!(parsed, Scenario::SadPath);
        assert_eq!(
            Scenario::from_str("slow", true).unwrap(),
            Scenario::Slow
        );
    }
}
