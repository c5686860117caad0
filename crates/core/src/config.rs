use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Prefix shared by all environment overrides, e.g. `NOTIFIER_MIN_WAKE_INTERVAL_SECS`.
pub const ENV_PREFIX: &str = "NOTIFIER_";

/// All notifier parameters. Defaults apply to any key not overridden.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierCfg {
    // wake scheduling
    pub min_wake_interval_secs: u64,
    pub wake_budget_secs: u64,

    // persistence
    pub store_path: PathBuf,

    // coordinator
    pub command_buffer: usize,

    // notification content
    pub notification_title: String,
    pub notification_body: String,
}

impl Default for NotifierCfg {
    fn default() -> Self {
        Self {
            min_wake_interval_secs: 15 * 60,
            wake_budget_secs: 30,
            store_path: PathBuf::from("online-notifier.json"),
            command_buffer: 64,
            notification_title: "Back Online".into(),
            notification_body: "Your internet connection has been restored.".into(),
        }
    }
}

impl NotifierCfg {
    /// Load config from `NOTIFIER_*` environment variables.
    pub fn from_env() -> Self {
        let map: HashMap<String, String> = std::env::vars()
            .filter_map(|(k, v)| {
                k.strip_prefix(ENV_PREFIX)
                    .map(|key| (key.to_ascii_lowercase(), v))
            })
            .collect();
        Self::from_map(&map)
    }

    pub fn from_map(m: &HashMap<String, String>) -> Self {
        let d = Self::default();
        Self {
            // Zero would let the host spin on wakes.
            min_wake_interval_secs: get_or(m, "min_wake_interval_secs", d.min_wake_interval_secs).max(1),
            wake_budget_secs: get_or(m, "wake_budget_secs", d.wake_budget_secs).max(1),
            store_path: get_or(m, "store_path", d.store_path),
            command_buffer: get_or(m, "command_buffer", d.command_buffer).max(1),
            notification_title: get_or(m, "notification_title", d.notification_title),
            notification_body: get_or(m, "notification_body", d.notification_body),
        }
    }

    pub fn to_entries(&self) -> Vec<(&str, String, &str)> {
        vec![
            ("min_wake_interval_secs", self.min_wake_interval_secs.to_string(), "Minimum delay before the next periodic wake"),
            ("wake_budget_secs", self.wake_budget_secs.to_string(), "Execution budget of a simulated wake"),
            ("store_path", self.store_path.display().to_string(), "Persisted flag store file"),
            ("command_buffer", self.command_buffer.to_string(), "Coordinator command channel capacity"),
            ("notification_title", self.notification_title.clone(), "Restored notification title"),
            ("notification_body", self.notification_body.clone(), "Restored notification body"),
        ]
    }

    pub fn min_wake_interval(&self) -> Duration {
        Duration::from_secs(self.min_wake_interval_secs)
    }

    pub fn wake_budget(&self) -> Duration {
        Duration::from_secs(self.wake_budget_secs)
    }
}

fn get_or<T: std::str::FromStr>(map: &HashMap<String, String>, key: &str, default: T) -> T {
    map.get(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_interval() {
        let cfg = NotifierCfg::default();
        assert_eq!(cfg.min_wake_interval(), Duration::from_secs(900));
        assert_eq!(cfg.notification_title, "Back Online");
    }

    #[test]
    fn map_overrides_and_fallbacks() {
        let mut m = HashMap::new();
        m.insert("min_wake_interval_secs".to_string(), "60".to_string());
        m.insert("command_buffer".to_string(), "not-a-number".to_string());
        m.insert("store_path".to_string(), "/tmp/flags.json".to_string());
        let cfg = NotifierCfg::from_map(&m);
        assert_eq!(cfg.min_wake_interval_secs, 60);
        assert_eq!(cfg.command_buffer, 64);
        assert_eq!(cfg.store_path, PathBuf::from("/tmp/flags.json"));
    }

    #[test]
    fn zero_interval_is_clamped() {
        let mut m = HashMap::new();
        m.insert("min_wake_interval_secs".to_string(), "0".to_string());
        let cfg = NotifierCfg::from_map(&m);
        assert_eq!(cfg.min_wake_interval_secs, 1);
    }

    #[test]
    fn entries_cover_every_key() {
        let cfg = NotifierCfg::default();
        let entries = cfg.to_entries();
        let map: HashMap<String, String> = entries
            .iter()
            .map(|(k, v, _)| (k.to_string(), v.clone()))
            .collect();
        let back = NotifierCfg::from_map(&map);
        assert_eq!(back.min_wake_interval_secs, cfg.min_wake_interval_secs);
        assert_eq!(back.store_path, cfg.store_path);
        assert_eq!(back.notification_body, cfg.notification_body);
    }
}
