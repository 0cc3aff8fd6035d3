//! Configuration for the interview player
//!
//! Bootstrap configuration comes from a TOML file resolved by
//! `stellar_common::config::resolve_config_path` (CLI → `STELLAR_CONFIG` →
//! user config dir). Every field has a built-in default so an absent or
//! broken file only produces a warning.
//!
//! ```toml
//! port = 5760
//!
//! [player]
//! activate_on_visible = true
//! restart_at_end = true
//! event_capacity = 100
//!
//! [simulator]
//! duration_ms = 60000
//! prepare_delay_ms = 1000
//! tick_ms = 250
//!
//! [logging]
//! level = "info"
//! ```

use crate::playback::simulated::SimulatedConfig;
use serde::Deserialize;
use stellar_common::config::LoggingConfig;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "STELLAR_CONFIG";

/// Config file name looked up in the user config directory
pub const CONFIG_FILE_NAME: &str = "interview.toml";

/// Player behaviour settings
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PlayerConfig {
    /// Start preparing the backend the first time the player becomes visible
    ///
    /// When false, only an explicit user interaction activates the player.
    pub activate_on_visible: bool,

    /// `click()` at end of content rewinds and plays instead of toggling
    pub restart_at_end: bool,

    /// EventBus buffer size
    pub event_capacity: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            activate_on_visible: true,
            restart_at_end: true,
            event_capacity: 100,
        }
    }
}

/// Top-level TOML file layout
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TomlConfig {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub player: PlayerConfig,

    #[serde(default)]
    pub simulator: SimulatedConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            player: PlayerConfig::default(),
            simulator: SimulatedConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_port() -> u16 {
    5760
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(config, TomlConfig::default());
        assert_eq!(config.port, 5760);
        assert!(config.player.activate_on_visible);
        assert!(config.player.restart_at_end);
    }

    #[test]
    fn test_partial_player_table() {
        let config: TomlConfig = toml::from_str(
            r#"
            port = 9000

            [player]
            activate_on_visible = false
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 9000);
        assert!(!config.player.activate_on_visible);
        // Unspecified fields keep their defaults
        assert!(config.player.restart_at_end);
        assert_eq!(config.player.event_capacity, 100);
    }

    #[test]
    fn test_simulator_and_logging_tables() {
        let config: TomlConfig = toml::from_str(
            r#"
            [simulator]
            duration_ms = 5000
            prepare_delay_ms = 10

            [logging]
            level = "trace"
            "#,
        )
        .unwrap();

        assert_eq!(config.simulator.duration_ms, 5000);
        assert_eq!(config.simulator.prepare_delay_ms, 10);
        assert_eq!(config.simulator.tick_ms, SimulatedConfig::default().tick_ms);
        assert_eq!(config.logging.level, "trace");
    }
}
