//! Scheduler configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default wall-clock budget for one drain pass.
pub const DEFAULT_TIMESLICE_MILLIS: u64 = 10;

/// Tuning knobs for a [`Scheduler`](super::Scheduler).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Budget per drain pass. Once a pass has run this long it yields and
    /// re-arms instead of taking the next item.
    pub max_timeslice_millis: u64,
}

impl SchedulerConfig {
    /// Parse a JSON document such as `{"max_timeslice_millis": 4}`.
    ///
    /// Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_timeslice_millis == 0 {
            return Err(ConfigError::ZeroTimeslice);
        }
        Ok(())
    }

    pub fn max_timeslice(&self) -> Duration {
        Duration::from_millis(self.max_timeslice_millis)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_timeslice_millis: DEFAULT_TIMESLICE_MILLIS,
        }
    }
}
