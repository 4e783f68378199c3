//! Application-level configuration loading: admin bootstrap list, chat limits and
//! report priority thresholds.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "GAMEON_BACK_CONFIG_PATH";

const DEFAULT_MAX_MESSAGE_LENGTH: usize = 1000;
const DEFAULT_HISTORY_LIMIT: usize = 100;
const DEFAULT_HIGH_PRIORITY_THRESHOLD: usize = 5;
const DEFAULT_MEDIUM_PRIORITY_THRESHOLD: usize = 2;
const DEFAULT_SESSION_TTL_HOURS: u64 = 168;
/// Longest accepted session lifetime (one year).
const MAX_SESSION_TTL_HOURS: u64 = 24 * 365;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    admin_emails: Vec<String>,
    chat: ChatConfig,
    reports: ReportConfig,
    session_ttl: Duration,
}

/// Limits applied to chat messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatConfig {
    /// Maximum number of characters in a message once trimmed.
    pub max_message_length: usize,
    /// Number of messages returned by default when loading history.
    pub history_limit: usize,
}

/// Pending-report counts at which a target is escalated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportConfig {
    /// Pending reports on one target that mark it high priority.
    pub high_priority_threshold: usize,
    /// Pending reports on one target that mark it medium priority.
    pub medium_priority_threshold: usize,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        admins = app_config.admin_emails.len(),
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Replace the admin bootstrap list, normalising entries like signup emails.
    pub fn with_admin_emails<I, S>(mut self, emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.admin_emails = emails
            .into_iter()
            .map(|email| normalize_email(email.as_ref()))
            .collect();
        self
    }

    /// Whether an account created with `email` is granted the admin role.
    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = normalize_email(email);
        self.admin_emails.iter().any(|admin| *admin == email)
    }

    /// Chat limits.
    pub fn chat(&self) -> ChatConfig {
        self.chat
    }

    /// Report escalation thresholds.
    pub fn reports(&self) -> ReportConfig {
        self.reports
    }

    /// Lifetime of a login session.
    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            admin_emails: Vec::new(),
            chat: ChatConfig::default(),
            reports: ReportConfig::default(),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_HOURS * 3600),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            high_priority_threshold: DEFAULT_HIGH_PRIORITY_THRESHOLD,
            medium_priority_threshold: DEFAULT_MEDIUM_PRIORITY_THRESHOLD,
        }
    }
}

/// Lowercase and trim an email so lookups are case-insensitive.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    admin_emails: Vec<String>,
    chat: Option<RawChatConfig>,
    reports: Option<RawReportConfig>,
    session_ttl_hours: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawChatConfig {
    max_message_length: Option<usize>,
    history_limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawReportConfig {
    high_priority_threshold: Option<usize>,
    medium_priority_threshold: Option<usize>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        let chat = value
            .chat
            .map(|raw| ChatConfig {
                max_message_length: raw
                    .max_message_length
                    .unwrap_or(DEFAULT_MAX_MESSAGE_LENGTH),
                history_limit: raw.history_limit.unwrap_or(DEFAULT_HISTORY_LIMIT),
            })
            .unwrap_or(defaults.chat);
        let reports = value
            .reports
            .map(|raw| {
                let high = raw
                    .high_priority_threshold
                    .unwrap_or(DEFAULT_HIGH_PRIORITY_THRESHOLD);
                let medium = raw
                    .medium_priority_threshold
                    .unwrap_or(DEFAULT_MEDIUM_PRIORITY_THRESHOLD);
                if medium > high {
                    warn!(
                        high,
                        medium, "medium report threshold exceeds high threshold; using defaults"
                    );
                    ReportConfig::default()
                } else {
                    ReportConfig {
                        high_priority_threshold: high,
                        medium_priority_threshold: medium,
                    }
                }
            })
            .unwrap_or(defaults.reports);
        let session_ttl = value
            .session_ttl_hours
            .map(|hours| match hours.checked_mul(3600) {
                Some(secs) if (1..=MAX_SESSION_TTL_HOURS).contains(&hours) => {
                    Duration::from_secs(secs)
                }
                _ => {
                    warn!(
                        hours,
                        max = MAX_SESSION_TTL_HOURS,
                        "session_ttl_hours out of range; using default"
                    );
                    defaults.session_ttl
                }
            })
            .unwrap_or(defaults.session_ttl);

        Self {
            admin_emails: Vec::new(),
            chat,
            reports,
            session_ttl,
        }
        .with_admin_emails(value.admin_emails)
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
