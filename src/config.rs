//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the sync engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Scoping unit for all shared state. Single-tenant; every row the
    /// remote store holds belongs to one household.
    pub household_id: String,
    /// Quiet interval after the last mutation before a remote push fires.
    /// Rapid successive mutations coalesce into one network write.
    pub push_debounce_ms: u64,
    /// Remote-change notifications arriving within this window after a push
    /// are treated as echoes of that push and ignored.
    pub echo_window_ms: u64,
    /// Bursts of genuine remote-change notifications are coalesced into a
    /// single pull after this delay.
    pub pull_coalesce_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            household_id: "default".to_owned(),
            push_debounce_ms: 500,
            echo_window_ms: 2_000,
            pull_coalesce_ms: 500,
        }
    }
}

impl EngineConfig {
    pub fn push_debounce(&self) -> Duration {
        Duration::from_millis(self.push_debounce_ms)
    }

    pub fn echo_window(&self) -> Duration {
        Duration::from_millis(self.echo_window_ms)
    }

    pub fn pull_coalesce(&self) -> Duration {
        Duration::from_millis(self.pull_coalesce_ms)
    }

    /// Default on-disk location for the local state blob
    /// (`~/.config/weekquest/state.json`).
    pub fn default_state_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("weekquest").join("state.json"))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn defaults_match_documented_timings() {
        let config = EngineConfig::default();
        assert_eq!(config.household_id, "default");
        assert_eq!(config.push_debounce(), Duration::from_millis(500));
        assert_eq!(config.echo_window(), Duration::from_millis(2_000));
        assert_eq!(config.pull_coalesce(), Duration::from_millis(500));
    }

    #[test]
    fn partial_config_deserializes_with_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"push_debounce_ms": 100}"#).unwrap();
        assert_eq!(config.push_debounce_ms, 100);
        assert_eq!(config.echo_window_ms, 2_000);
        assert_eq!(config.household_id, "default");
    }
}
