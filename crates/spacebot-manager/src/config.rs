//! Process configuration, read from the environment.

use spacebot_lot::Cutoff;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {key}")]
    Invalid { key: &'static str, value: String },

    #[error("invalid reset time {hour}:{minute} for {domain}")]
    ResetTime {
        domain: &'static str,
        hour: u32,
        minute: u32,
    },
}

#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub slack_auth_token: String,
    pub slack_app_token: String,
    pub slack_ta_channel_id: String,
    pub devices_filename: Option<PathBuf>,
    pub users_filename: PathBuf,
    pub parking_filename: PathBuf,
    pub workspaces_filename: PathBuf,
    /// Testing mode: only the `/test-*` command aliases are answered.
    pub debug: bool,
    pub report_person_id: String,
    pub vacations_hash_filename: Option<PathBuf>,
    pub parking_cutoff: Cutoff,
    pub workspaces_cutoff: Cutoff,
    pub event_queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            slack_auth_token: String::new(),
            slack_app_token: String::new(),
            slack_ta_channel_id: String::new(),
            devices_filename: None,
            users_filename: PathBuf::from("users.json"),
            parking_filename: PathBuf::from("parking.json"),
            workspaces_filename: PathBuf::from("workspaces.json"),
            debug: false,
            report_person_id: String::new(),
            vacations_hash_filename: None,
            parking_cutoff: Cutoff::default(),
            workspaces_cutoff: Cutoff::default(),
            event_queue_capacity: spacebot_core::DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset and empty values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let parking_cutoff = cutoff(
            "parking",
            parse_or(&get, "PARKING_RESET_HOUR", defaults.parking_cutoff.hour)?,
            parse_or(&get, "PARKING_RESET_MIN", defaults.parking_cutoff.minute)?,
        )?;
        let workspaces_cutoff = cutoff(
            "workspaces",
            parse_or(&get, "WORKSPACES_RESET_HOUR", defaults.workspaces_cutoff.hour)?,
            parse_or(&get, "WORKSPACES_RESET_MIN", defaults.workspaces_cutoff.minute)?,
        )?;

        let event_queue_capacity =
            parse_or(&get, "EVENT_QUEUE_CAPACITY", defaults.event_queue_capacity)?;
        if event_queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                key: "EVENT_QUEUE_CAPACITY",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            slack_auth_token: get("SLACK_AUTH_TOKEN").unwrap_or_default(),
            slack_app_token: get("SLACK_APP_TOKEN").unwrap_or_default(),
            slack_ta_channel_id: get("SLACK_TA_CHANNEL_ID").unwrap_or_default(),
            devices_filename: get("DEVICES_FILENAME").map(PathBuf::from),
            users_filename: get("USERS_FILENAME")
                .map(PathBuf::from)
                .unwrap_or(defaults.users_filename),
            parking_filename: get("PARKING_FILENAME")
                .map(PathBuf::from)
                .unwrap_or(defaults.parking_filename),
            workspaces_filename: get("WORKSPACES_FILENAME")
                .map(PathBuf::from)
                .unwrap_or(defaults.workspaces_filename),
            debug: parse_bool(&get, "DEBUG")?,
            report_person_id: get("REPORT_PERSON_ID").unwrap_or_default(),
            vacations_hash_filename: get("VACATIONS_HASH_FILENAME").map(PathBuf::from),
            parking_cutoff,
            workspaces_cutoff,
            event_queue_capacity,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

fn parse_bool(get: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<bool, ConfigError> {
    let Some(raw) = get(key) else {
        return Ok(false);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid { key, value: raw }),
    }
}

fn cutoff(domain: &'static str, hour: u32, minute: u32) -> Result<Cutoff, ConfigError> {
    Cutoff::new(hour, minute).ok_or(ConfigError::ResetTime {
        domain,
        hour,
        minute,
    })
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |token: &str| if token.is_empty() { "" } else { "<redacted>" };
        f.debug_struct("Config")
            .field("slack_auth_token", &redact(&self.slack_auth_token))
            .field("slack_app_token", &redact(&self.slack_app_token))
            .field("slack_ta_channel_id", &self.slack_ta_channel_id)
            .field("devices_filename", &self.devices_filename)
            .field("users_filename", &self.users_filename)
            .field("parking_filename", &self.parking_filename)
            .field("workspaces_filename", &self.workspaces_filename)
            .field("debug", &self.debug)
            .field("report_person_id", &self.report_person_id)
            .field("vacations_hash_filename", &self.vacations_hash_filename)
            .field("parking_cutoff", &self.parking_cutoff)
            .field("workspaces_cutoff", &self.workspaces_cutoff)
            .field("event_queue_capacity", &self.event_queue_capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.parking_cutoff.to_string(), "17:00");
        assert_eq!(cfg.users_filename, PathBuf::from("users.json"));
        assert!(!cfg.debug);
    }

    #[test]
    fn values_are_read() {
        let cfg = config(&[
            ("SLACK_AUTH_TOKEN", "xoxb-secret"),
            ("PARKING_FILENAME", "/var/lib/spacebot/parking.json"),
            ("DEBUG", "true"),
            ("WORKSPACES_RESET_HOUR", "18"),
            ("WORKSPACES_RESET_MIN", "30"),
            ("EVENT_QUEUE_CAPACITY", "32"),
            ("USERS_FILENAME", "  "),
        ])
        .unwrap();
        assert_eq!(cfg.slack_auth_token, "xoxb-secret");
        assert_eq!(cfg.parking_filename, PathBuf::from("/var/lib/spacebot/parking.json"));
        assert!(cfg.debug);
        assert_eq!(cfg.workspaces_cutoff, Cutoff::new(18, 30).unwrap());
        assert_eq!(cfg.parking_cutoff, Cutoff::default());
        assert_eq!(cfg.event_queue_capacity, 32);
        assert_eq!(cfg.users_filename, PathBuf::from("users.json"));
    }

    #[test]
    fn bad_values_are_rejected() {
        assert_eq!(
            config(&[("DEBUG", "maybe")]).unwrap_err(),
            ConfigError::Invalid {
                key: "DEBUG",
                value: "maybe".into()
            }
        );
        assert_eq!(
            config(&[("PARKING_RESET_HOUR", "five")]).unwrap_err(),
            ConfigError::Invalid {
                key: "PARKING_RESET_HOUR",
                value: "five".into()
            }
        );
        assert!(matches!(
            config(&[("PARKING_RESET_HOUR", "24")]).unwrap_err(),
            ConfigError::ResetTime { domain: "parking", .. }
        ));
        assert!(config(&[("EVENT_QUEUE_CAPACITY", "0")]).is_err());
    }

    #[test]
    fn tokens_are_redacted() {
        let cfg = config(&[("SLACK_AUTH_TOKEN", "xoxb-secret"), ("SLACK_APP_TOKEN", "xapp-secret")]).unwrap();
        let debug = format!("{cfg:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("<redacted>"));
    }
}
