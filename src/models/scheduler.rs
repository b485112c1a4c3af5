use std::time::Duration;

use serde_derive::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::dmx;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct Scheduler {
    /// Frames per second sent on the link
    #[validate(range(min = 1.0, max = 44.0), custom(function = "validate_refresh_rate"))]
    pub refresh_rate: f64,
    /// Consecutive send failures before the link is reported as degraded
    #[validate(range(min = 1))]
    pub max_consecutive_failures: u32,
    #[validate(range(min = 1))]
    pub initial_backoff_ms: u32,
    #[validate(range(min = 1))]
    pub max_backoff_ms: u32,
}

fn validate_refresh_rate(refresh_rate: f64) -> Result<(), ValidationError> {
    // NaN slips through range comparisons
    if refresh_rate.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::new("finite"))
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            refresh_rate: dmx::MAX_REFRESH_RATE,
            max_consecutive_failures: 5,
            initial_backoff_ms: 25,
            max_backoff_ms: 1000,
        }
    }
}

impl Scheduler {
    pub fn period(&self) -> Duration {
        let rate = if self.refresh_rate.is_finite() {
            self.refresh_rate.clamp(1., dmx::MAX_REFRESH_RATE)
        } else {
            dmx::MAX_REFRESH_RATE
        };

        Duration::from_secs_f64(1. / rate)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms as _)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms.max(self.initial_backoff_ms) as _)
    }
}
