//! Engine configuration: defaults, JSON overrides, environment overrides.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Tunables for round scheduling, match formats and the pairing search.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Length of each round's scheduling window.
    #[serde(default = "default_round_window_hours")]
    pub round_window_hours: i64,
    #[serde(default = "default_best_of")]
    pub swiss_best_of: u8,
    /// Best-of for double-elimination nodes.
    #[serde(default = "default_best_of")]
    pub bracket_best_of: u8,
    /// Best-of for every playoff round.
    #[serde(default = "default_best_of")]
    pub playoff_best_of: u8,
    /// Maximum search steps the pairing engine may spend on one round.
    #[serde(default = "default_pairing_search_budget")]
    pub pairing_search_budget: usize,
}

/// Longest accepted round window (ten years).
pub const MAX_ROUND_WINDOW_HOURS: i64 = 10 * 366 * 24;

fn default_round_window_hours() -> i64 {
    7 * 24
}

fn default_best_of() -> u8 {
    3
}

fn default_pairing_search_budget() -> usize {
    200_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            round_window_hours: default_round_window_hours(),
            swiss_best_of: default_best_of(),
            bracket_best_of: default_best_of(),
            playoff_best_of: default_best_of(),
            pairing_search_budget: default_pairing_search_budget(),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `ROUND_WINDOW_HOURS`, `SWISS_BEST_OF`, `BRACKET_BEST_OF`,
    /// `PLAYOFF_BEST_OF` and `PAIRING_SEARCH_BUDGET`. Unparseable values are ignored, as are
    /// window lengths outside `1..=MAX_ROUND_WINDOW_HOURS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_parse::<i64>("ROUND_WINDOW_HOURS") {
            if (1..=MAX_ROUND_WINDOW_HOURS).contains(&v) {
                config.round_window_hours = v;
            } else {
                log::warn!("ignoring out-of-range ROUND_WINDOW_HOURS={} (1..={})", v, MAX_ROUND_WINDOW_HOURS);
            }
        }
        if let Some(v) = env_parse("SWISS_BEST_OF") {
            config.swiss_best_of = v;
        }
        if let Some(v) = env_parse("BRACKET_BEST_OF") {
            config.bracket_best_of = v;
        }
        if let Some(v) = env_parse("PLAYOFF_BEST_OF") {
            config.playoff_best_of = v;
        }
        if let Some(v) = env_parse("PAIRING_SEARCH_BUDGET") {
            config.pairing_search_budget = v;
        }
        config
    }

    /// Window length, clamped to `1..=MAX_ROUND_WINDOW_HOURS` hours.
    pub fn round_window(&self) -> Duration {
        Duration::hours(self.round_window_hours.clamp(1, MAX_ROUND_WINDOW_HOURS))
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("ignoring unparseable {}={:?}", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_json_fields_take_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{ "playoff_best_of": 5 }"#).unwrap();
        assert_eq!(config.playoff_best_of, 5);
        assert_eq!(config.swiss_best_of, 3);
        assert_eq!(config.round_window(), Duration::hours(168));
    }

    #[test]
    fn window_hours_outside_range_are_ignored() {
        // Only test touching this variable.
        std::env::set_var("ROUND_WINDOW_HOURS", i64::MAX.to_string());
        assert_eq!(EngineConfig::from_env().round_window_hours, 168);
        std::env::set_var("ROUND_WINDOW_HOURS", "0");
        assert_eq!(EngineConfig::from_env().round_window_hours, 168);
        std::env::set_var("ROUND_WINDOW_HOURS", "48");
        assert_eq!(EngineConfig::from_env().round_window_hours, 48);
        std::env::remove_var("ROUND_WINDOW_HOURS");
    }

    #[test]
    fn oversized_json_window_is_clamped() {
        let config: EngineConfig =
            serde_json::from_str(&format!(r#"{{ "round_window_hours": {} }}"#, i64::MAX)).unwrap();
        assert_eq!(config.round_window(), Duration::hours(MAX_ROUND_WINDOW_HOURS));
    }
}
