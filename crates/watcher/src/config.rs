use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use campground_watch::{RecGovConfig, WatchConfig, WatchDefinition, WatcherConfig};

/// Which transport delivers notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierKind {
    /// Log notifications instead of sending them
    Log,
    /// Deliver through AWS SES and SNS
    Aws,
}

/// Process settings read from the environment
#[derive(Debug, Clone)]
pub struct Settings {
    /// Path of the JSON watch file
    pub watch_file: PathBuf,
    /// Polling settings shared by every watch
    pub watcher: WatcherConfig,
    /// recreation.gov client settings
    pub rec_gov: RecGovConfig,
    /// Notification transport
    pub notifier: NotifierKind,
    /// Sender address for e-mail notifications
    pub from_email: String,
}

impl Settings {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, falling back to defaults for unset keys
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut watcher = WatcherConfig::default();
        let mut rec_gov = RecGovConfig::default();

        if let Some(secs) = seconds(&lookup, "POLL_INTERVAL_SECS")? {
            watcher.poll_interval = secs;
        }
        if let Some(secs) = seconds(&lookup, "REQUEST_TIMEOUT_SECS")? {
            watcher.request_timeout = secs;
            rec_gov.request_timeout = secs;
        }
        if let Some(secs) = seconds(&lookup, "MAX_BACKOFF_SECS")? {
            watcher.max_backoff = secs;
        }
        if watcher.initial_backoff > watcher.max_backoff {
            watcher.initial_backoff = watcher.max_backoff;
        }
        if let Some(url) = lookup("RECREATION_GOV_BASE_URL") {
            rec_gov.base_url = url.trim_end_matches('/').to_string();
        }

        let notifier = match lookup("NOTIFIER").as_deref() {
            None | Some("log") => NotifierKind::Log,
            Some("aws") => NotifierKind::Aws,
            Some(other) => bail!("NOTIFIER must be \"log\" or \"aws\", got {:?}", other),
        };

        Ok(Self {
            watch_file: lookup("WATCH_CONFIG")
                .unwrap_or_else(|| "watches.json".to_string())
                .into(),
            watcher,
            rec_gov,
            notifier,
            from_email: lookup("FROM_EMAIL")
                .unwrap_or_else(|| "noreply@campsitetracker.com".to_string()),
        })
    }
}

fn seconds(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<Duration>> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let secs: u64 = raw
        .trim()
        .parse()
        .with_context(|| format!("{} must be a whole number of seconds, got {:?}", key, raw))?;
    if secs == 0 {
        bail!("{} must be greater than zero", key);
    }
    Ok(Some(Duration::from_secs(secs)))
}

/// Load and validate every watch in the watch file
pub fn load_watches(path: &Path) -> Result<Vec<WatchDefinition>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read watch file {}", path.display()))?;
    parse_watches(&contents).with_context(|| format!("Invalid watch file {}", path.display()))
}

/// Parse a JSON array of watch records
pub fn parse_watches(json: &str) -> Result<Vec<WatchDefinition>> {
    let configs: Vec<WatchConfig> = serde_json::from_str(json)?;

    configs
        .into_iter()
        .enumerate()
        .map(|(index, config)| {
            config
                .into_definition()
                .with_context(|| format!("watch #{}", index + 1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = settings(&[]).unwrap();
        assert_eq!(settings.watch_file, PathBuf::from("watches.json"));
        assert_eq!(settings.watcher.poll_interval, Duration::from_secs(15 * 60));
        assert_eq!(settings.notifier, NotifierKind::Log);
        assert_eq!(settings.rec_gov.base_url, "https://www.recreation.gov/api");
    }

    #[test]
    fn test_overrides() {
        let settings = settings(&[
            ("WATCH_CONFIG", "/etc/watches.json"),
            ("POLL_INTERVAL_SECS", "60"),
            ("REQUEST_TIMEOUT_SECS", "5"),
            ("MAX_BACKOFF_SECS", "10"),
            ("RECREATION_GOV_BASE_URL", "http://localhost:9000/api/"),
            ("NOTIFIER", "aws"),
            ("FROM_EMAIL", "alerts@example.com"),
        ])
        .unwrap();

        assert_eq!(settings.watch_file, PathBuf::from("/etc/watches.json"));
        assert_eq!(settings.watcher.poll_interval, Duration::from_secs(60));
        assert_eq!(settings.watcher.request_timeout, Duration::from_secs(5));
        assert_eq!(settings.rec_gov.request_timeout, Duration::from_secs(5));
        assert_eq!(settings.watcher.max_backoff, Duration::from_secs(10));
        assert!(settings.watcher.initial_backoff <= settings.watcher.max_backoff);
        assert_eq!(settings.rec_gov.base_url, "http://localhost:9000/api");
        assert_eq!(settings.notifier, NotifierKind::Aws);
        assert_eq!(settings.from_email, "alerts@example.com");
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(settings(&[("POLL_INTERVAL_SECS", "soon")]).is_err());
        assert!(settings(&[("POLL_INTERVAL_SECS", "0")]).is_err());
        assert!(settings(&[("NOTIFIER", "carrier-pigeon")]).is_err());
    }

    #[test]
    fn test_parse_watches() {
        let json = r#"[
            {
                "campgroundName": "Upper Pines",
                "campgroundId": 232447,
                "dates": { "kind": "range", "start": "2025-07-01", "end": "2025-07-03" },
                "recipients": ["camper@example.com"]
            },
            {
                "id": "6f1c1d3e-3c57-4f3e-9d55-0d6b7c0f2a11",
                "campgroundName": "Kirk Creek",
                "campgroundId": 233116,
                "dates": { "kind": "list", "dates": ["2025-08-15"] },
                "site": "012",
                "recipients": ["+14155550100"]
            }
        ]"#;

        let watches = parse_watches(json).unwrap();
        assert_eq!(watches.len(), 2);
        assert_eq!(watches[0].dates.len(), 3);
        assert_eq!(watches[1].site.as_deref(), Some("012"));
        assert_eq!(
            watches[1].id.to_string(),
            "6f1c1d3e-3c57-4f3e-9d55-0d6b7c0f2a11"
        );
    }

    #[test]
    fn test_parse_watches_rejects_invalid_record() {
        let json = r#"[{
            "campgroundName": "Upper Pines",
            "campgroundId": 232447,
            "dates": { "kind": "range", "start": "2025-07-03", "end": "2025-07-01" },
            "recipients": ["camper@example.com"]
        }]"#;
        let err = parse_watches(json).unwrap_err();
        assert!(format!("{:#}", err).contains("watch #1"));
    }
}
