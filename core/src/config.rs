//! Tracker configuration
//!
//! The shared type lives in goldpath-types; this module adds persistence via
//! confy and the derived pace policy.

pub use goldpath_types::TrackerConfig;
use thiserror::Error;

use crate::pace::PacePolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration")]
    Load(#[from] confy::ConfyError),

    #[error("failed to save configuration")]
    Save(#[source] confy::ConfyError),
}

/// Extension trait for TrackerConfig persistence.
pub trait TrackerConfigExt: Sized {
    /// Load the stored configuration, falling back to defaults.
    fn load() -> Self;
    fn save(self) -> Result<(), ConfigError>;
    fn pace_policy(&self) -> PacePolicy;
}

impl TrackerConfigExt for TrackerConfig {
    fn load() -> Self {
        confy::load("goldpath", "config").unwrap_or_default()
    }

    fn save(self) -> Result<(), ConfigError> {
        confy::store("goldpath", "config", self).map_err(ConfigError::Save)
    }

    fn pace_policy(&self) -> PacePolicy {
        PacePolicy {
            min_runs: self.pace_min_runs,
            risk_threshold: self.pace_risk_threshold,
        }
    }
}
