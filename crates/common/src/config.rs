use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::de;

pub const DEFAULT_SERVER_PORT: i64 = 13081;
pub const DEFAULT_SCRAPE_INTERVAL_SECS: i64 = 60;
pub const DEFAULT_SMTP_PORT: i64 = 587;

/// Watchdog settings in the shape served and accepted by `/config`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WatchdogConfig {
    pub port: i64,
    pub external: bool,
    #[serde(rename = "scrapeInterval")]
    pub scrape_interval: i64,
    #[serde(deserialize_with = "de::null_as_default")]
    pub hosts: Vec<HostEndpoint>,
    pub alert: AlertConfig,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_SERVER_PORT,
            external: false,
            scrape_interval: DEFAULT_SCRAPE_INTERVAL_SECS,
            hosts: Vec::new(),
            alert: AlertConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct HostEndpoint {
    #[serde(rename = "IP")]
    pub ip: String,
    #[serde(rename = "Port", deserialize_with = "de::display_string")]
    pub port: String,
    #[serde(rename = "CAPath")]
    pub ca_path: String,
    #[serde(rename = "CertPath")]
    pub cert_path: String,
    #[serde(rename = "KeyPath")]
    pub key_path: String,
}

impl HostEndpoint {
    pub fn new(ip: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            port: port.into(),
            ..Self::default()
        }
    }

    pub fn uses_tls(&self) -> bool {
        !self.ca_path.is_empty() && !self.cert_path.is_empty() && !self.key_path.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct AlertConfig {
    pub enable: bool,
    #[serde(deserialize_with = "de::null_as_default")]
    pub webhook: Vec<String>,
    #[serde(rename = "Email")]
    pub email: EmailConfig,
}

impl AlertConfig {
    pub fn webhook_kinds(&self) -> impl Iterator<Item = (&str, WebhookKind)> {
        self.webhook
            .iter()
            .map(|url| (url.as_str(), WebhookKind::detect(url)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EmailConfig {
    pub smtp_endpoint: String,
    pub smtp_port: Option<i64>,
    pub smtp_account: String,
    pub smtp_password: String,
    #[serde(deserialize_with = "de::null_as_default")]
    pub receiver: Vec<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_endpoint: String::new(),
            smtp_port: Some(DEFAULT_SMTP_PORT),
            smtp_account: String::new(),
            smtp_password: String::new(),
            receiver: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {}", join_issues(.0))]
    Invalid(Vec<ValidationIssue>),
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config document: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            Self::Invalid(issues) => issues,
            _ => &[],
        }
    }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl WatchdogConfig {
    /// Replaces zero or missing numeric settings with their defaults.
    pub fn with_defaults(mut self) -> Self {
        if self.port == 0 {
            self.port = DEFAULT_SERVER_PORT;
        }
        if self.scrape_interval == 0 {
            self.scrape_interval = DEFAULT_SCRAPE_INTERVAL_SECS;
        }
        if matches!(self.alert.email.smtp_port, None | Some(0)) {
            self.alert.email.smtp_port = Some(DEFAULT_SMTP_PORT);
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut issues = Vec::new();

        if self.port <= 0 {
            issues.push(ValidationIssue::new("port", "Port must be a positive number"));
        }
        if self.scrape_interval <= 0 {
            issues.push(ValidationIssue::new(
                "scrapeInterval",
                "Interval must be a positive number",
            ));
        }
        for (idx, host) in self.hosts.iter().enumerate() {
            if host.ip.trim().is_empty() {
                issues.push(ValidationIssue::new(
                    format!("hosts[{idx}].IP"),
                    "IP address is required",
                ));
            }
            if host.port.trim().is_empty() {
                issues.push(ValidationIssue::new(
                    format!("hosts[{idx}].Port"),
                    "Port is required",
                ));
            }
        }
        if self.alert.email.smtp_port.is_some_and(|port| port <= 0) {
            issues.push(ValidationIssue::new(
                "alert.Email.smtp_port",
                "SMTP port must be a positive number",
            ));
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(issues))
        }
    }
}

pub fn parse_config(document: &str) -> Result<WatchdogConfig, ConfigError> {
    Ok(serde_json::from_str::<WatchdogConfig>(document)?.with_defaults())
}

pub fn load_config_file(path: impl AsRef<Path>) -> Result<WatchdogConfig, ConfigError> {
    let path = path.as_ref();
    let document = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&document)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WebhookKind {
    Discord,
    Slack,
    Teams,
    DingTalk,
    Lark,
    WeChat,
    Unknown,
}

impl WebhookKind {
    /// Classifies a webhook URL by the vendor name it contains.
    pub fn detect(url: &str) -> Self {
        if url.contains("discord") {
            Self::Discord
        } else if url.contains("slack") {
            Self::Slack
        } else if url.contains("office") {
            Self::Teams
        } else if url.contains("dingtalk") {
            Self::DingTalk
        } else if url.contains("larksuite") || url.contains("feishu") {
            Self::Lark
        } else if url.contains("weixin") || url.contains("qyapi") {
            Self::WeChat
        } else {
            Self::Unknown
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Discord => "discord",
            Self::Slack => "slack",
            Self::Teams => "teams",
            Self::DingTalk => "ding",
            Self::Lark => "lark",
            Self::WeChat => "wechat",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for WebhookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
