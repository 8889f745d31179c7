//! Shared configuration for the browser subprocess helper
//!
//! This crate provides the single source of truth for the knobs the helper
//! reads from its environment. The host process never passes these on the
//! command line; the command line belongs to CEF.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable holding the tracing filter directive
pub const LOG_FILTER_ENV: &str = "BROWSER_SUBPROCESS_LOG";

/// Environment variable overriding the parent poll interval (milliseconds)
pub const PARENT_POLL_ENV: &str = "BROWSER_SUBPROCESS_PARENT_POLL_MS";

/// Environment variable that disables the parent watchdog when set to `1` or `true`
pub const NO_WATCHDOG_ENV: &str = "BROWSER_SUBPROCESS_NO_WATCHDOG";

/// Default tracing filter
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default interval between parent liveness checks when the OS cannot
/// notify us of the exit directly
pub const DEFAULT_PARENT_POLL_MS: u64 = 500;

/// Runtime configuration for a subprocess
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubprocessConfig {
    /// Filter directive handed to the log subscriber
    pub log_filter: String,
    /// Poll interval used by the watchdog fallback path
    pub parent_poll_interval_ms: u64,
    /// Whether `--exit-if-parent-closed` is honoured.
    /// Turning this off keeps a subprocess alive for a debugger after the host dies.
    pub honor_parent_watchdog: bool,
}

impl Default for SubprocessConfig {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            parent_poll_interval_ms: DEFAULT_PARENT_POLL_MS,
            honor_parent_watchdog: true,
        }
    }
}

impl SubprocessConfig {
    /// Build the configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    ///
    /// Unparseable values fall back to the defaults rather than failing;
    /// a subprocess must not refuse to start over a debugging knob.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(filter) = lookup(LOG_FILTER_ENV).filter(|f| !f.trim().is_empty()) {
            config.log_filter = filter;
        }

        if let Some(ms) = lookup(PARENT_POLL_ENV).and_then(|v| v.trim().parse::<u64>().ok()) {
            if ms > 0 {
                config.parent_poll_interval_ms = ms;
            }
        }

        if let Some(value) = lookup(NO_WATCHDOG_ENV) {
            config.honor_parent_watchdog = !matches!(value.trim(), "1" | "true" | "TRUE" | "yes");
        }

        config
    }

    /// Poll interval as a `Duration`
    pub fn parent_poll_interval(&self) -> Duration {
        Duration::from_millis(self.parent_poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = SubprocessConfig::default();
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
        assert_eq!(config.parent_poll_interval_ms, DEFAULT_PARENT_POLL_MS);
        assert!(config.honor_parent_watchdog);
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        let config = SubprocessConfig::from_lookup(|_| None);
        assert_eq!(config, SubprocessConfig::default());
    }

    #[test]
    fn test_environment_overrides() {
        let config = SubprocessConfig::from_lookup(lookup_from(&[
            (LOG_FILTER_ENV, "browser_subprocess=debug"),
            (PARENT_POLL_ENV, "125"),
            (NO_WATCHDOG_ENV, "1"),
        ]));
        assert_eq!(config.log_filter, "browser_subprocess=debug");
        assert_eq!(config.parent_poll_interval(), Duration::from_millis(125));
        assert!(!config.honor_parent_watchdog);
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = SubprocessConfig::from_lookup(lookup_from(&[
            (LOG_FILTER_ENV, "   "),
            (PARENT_POLL_ENV, "soon"),
            (NO_WATCHDOG_ENV, "0"),
        ]));
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
        assert_eq!(config.parent_poll_interval_ms, DEFAULT_PARENT_POLL_MS);
        assert!(config.honor_parent_watchdog);
    }

    #[test]
    fn test_zero_poll_interval_ignored() {
        let config = SubprocessConfig::from_lookup(lookup_from(&[(PARENT_POLL_ENV, "0")]));
        assert_eq!(config.parent_poll_interval_ms, DEFAULT_PARENT_POLL_MS);
    }
}
