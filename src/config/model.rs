use std::fmt::{Debug, Formatter};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub search: SearchConfig,
    pub smtp: SmtpConfig,
    pub mail: MailConfig,
    pub poll_interval: Duration,
    pub state_file: PathBuf,
}

#[derive(Clone)]
pub struct SearchConfig {
    pub endpoint: String,
    /// Sent as is in the `Authorization` header, e.g. `SiteKey <key>`
    pub auth_header: String,
    pub per_page: u32,
    pub skip_past_events: bool,
}

#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// Implicit TLS (usually port 465), otherwise STARTTLS
    pub secure: bool,
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub from: String,
    pub to: Vec<String>,
}

impl Debug for SearchConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("endpoint", &self.endpoint)
            .field("auth_header", &"<redacted>")
            .field("per_page", &self.per_page)
            .field("skip_past_events", &self.skip_past_events)
            .finish()
    }
}

impl Debug for SmtpConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secure", &self.secure)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("Invalid config '{name}'. Expected {expected}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
    },
}
