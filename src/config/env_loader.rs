use crate::config::model::{Config, ConfigError, MailConfig, SearchConfig, SmtpConfig};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://api.cludo.com/api/v3/2677/12845/search";
const DEFAULT_POLL_INTERVAL_MS: u64 = 10 * 60 * 1000;
const DEFAULT_PER_PAGE: u32 = 50;
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_STATE_FILE: &str = "seen.json";

pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(|name| env::var(name).ok())
}

/// Builds the config from any variable source, empty values count as unset
pub fn load_config_from<L>(lookup: L) -> Result<Config, ConfigError>
where
    L: Fn(&str) -> Option<String>,
{
    let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

    let auth_header = load_required_config(&lookup, "IDA_AUTH")?;
    let smtp_host = load_required_config(&lookup, "SMTP_HOST")?;
    let smtp_user = load_required_config(&lookup, "SMTP_USER")?;
    let smtp_password = load_required_config(&lookup, "SMTP_PASS")?;
    let mail_from = lookup("MAIL_FROM")
        .unwrap_or_else(|| smtp_user.clone())
        .trim()
        .to_string();
    let mail_to = load_list_config(&lookup, "MAIL_TO")?;

    if mail_from.is_empty() {
        return Err(ConfigError::Missing("MAIL_FROM"));
    }

    let poll_interval_ms: u64 =
        load_number_config(&lookup, "POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?;
    let per_page: u32 = load_number_config(&lookup, "PER_PAGE", DEFAULT_PER_PAGE)?;

    if poll_interval_ms == 0 {
        return Err(ConfigError::Invalid {
            name: "POLL_INTERVAL_MS",
            expected: "a positive amount of milliseconds",
        });
    }
    if per_page == 0 {
        return Err(ConfigError::Invalid {
            name: "PER_PAGE",
            expected: "a page size of at least 1",
        });
    }

    Ok(Config {
        search: SearchConfig {
            endpoint: lookup("IDA_SEARCH_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_SEARCH_ENDPOINT.to_string()),
            auth_header,
            per_page,
            skip_past_events: load_bool_config(&lookup, "SKIP_PAST_EVENTS", false)?,
        },
        smtp: SmtpConfig {
            host: smtp_host,
            port: load_number_config(&lookup, "SMTP_PORT", DEFAULT_SMTP_PORT)?,
            secure: load_bool_config(&lookup, "SMTP_SECURE", false)?,
            user: smtp_user,
            password: smtp_password,
        },
        mail: MailConfig {
            from: mail_from,
            to: mail_to,
        },
        poll_interval: Duration::from_millis(poll_interval_ms),
        state_file: lookup("STATE_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE)),
    })
}

fn load_required_config(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    lookup(name).ok_or(ConfigError::Missing(name))
}

fn load_list_config(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Vec<String>, ConfigError> {
    let values: Vec<String> = load_required_config(lookup, name)?
        .split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect();

    if values.is_empty() {
        return Err(ConfigError::Missing(name));
    }

    Ok(values)
}

fn load_bool_config(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .to_lowercase()
            .parse()
            .map_err(|_| ConfigError::Invalid {
                name,
                expected: "either 'true' or 'false'",
            }),
    }
}

fn load_number_config<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            expected: "a non-negative integer number",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn required_vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("IDA_AUTH", "SiteKey abc"),
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_USER", "watcher@example.com"),
            ("SMTP_PASS", "hunter2"),
            ("MAIL_TO", "a@example.com"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<Config, ConfigError> {
        load_config_from(|name| vars.get(name).map(|value| value.to_string()))
    }

    #[test_log::test]
    fn should_apply_defaults() {
        let config = load(&required_vars()).unwrap();

        assert_eq!(config.search.endpoint, DEFAULT_SEARCH_ENDPOINT);
        assert_eq!(config.search.auth_header, "SiteKey abc");
        assert_eq!(config.search.per_page, 50);
        assert!(!config.search.skip_past_events);
        assert_eq!(config.smtp.port, 587);
        assert!(!config.smtp.secure);
        assert_eq!(config.mail.from, "watcher@example.com");
        assert_eq!(config.poll_interval, Duration::from_secs(600));
        assert_eq!(config.state_file, PathBuf::from("seen.json"));
    }

    #[test_log::test]
    fn should_split_recipients_by_comma() {
        let mut vars = required_vars();
        vars.insert("MAIL_TO", " a@example.com, b@example.com ,,");

        let config = load(&vars).unwrap();

        assert_eq!(config.mail.to, vec!["a@example.com", "b@example.com"]);
    }

    #[test_log::test]
    fn when_a_required_variable_is_missing_should_refuse() {
        for name in ["IDA_AUTH", "SMTP_HOST", "SMTP_USER", "SMTP_PASS", "MAIL_TO"] {
            let mut vars = required_vars();
            vars.remove(name);

            assert_eq!(load(&vars).unwrap_err(), ConfigError::Missing(name));
        }
    }

    #[test_log::test]
    fn when_recipients_are_only_separators_should_refuse() {
        let mut vars = required_vars();
        vars.insert("MAIL_TO", " , ");

        assert_eq!(load(&vars).unwrap_err(), ConfigError::Missing("MAIL_TO"));
    }

    #[test_log::test]
    fn should_read_optional_overrides() {
        let mut vars = required_vars();
        vars.insert("MAIL_FROM", "IDA Watch <noreply@example.com>");
        vars.insert("SMTP_PORT", "465");
        vars.insert("SMTP_SECURE", "TRUE");
        vars.insert("SKIP_PAST_EVENTS", "true");
        vars.insert("POLL_INTERVAL_MS", "60000");
        vars.insert("PER_PAGE", "20");
        vars.insert("STATE_FILE", "/var/lib/idawatch/seen.json");

        let config = load(&vars).unwrap();

        assert_eq!(config.mail.from, "IDA Watch <noreply@example.com>");
        assert_eq!(config.smtp.port, 465);
        assert!(config.smtp.secure);
        assert!(config.search.skip_past_events);
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert_eq!(config.search.per_page, 20);
        assert_eq!(
            config.state_file,
            PathBuf::from("/var/lib/idawatch/seen.json")
        );
    }

    #[test_log::test]
    fn when_a_value_is_malformed_should_refuse() {
        let mut vars = required_vars();
        vars.insert("SKIP_PAST_EVENTS", "ja");

        assert!(matches!(
            load(&vars).unwrap_err(),
            ConfigError::Invalid {
                name: "SKIP_PAST_EVENTS",
                ..
            }
        ));

        let mut vars = required_vars();
        vars.insert("PER_PAGE", "0");

        assert!(matches!(
            load(&vars).unwrap_err(),
            ConfigError::Invalid {
                name: "PER_PAGE",
                ..
            }
        ));
    }

    #[test_log::test]
    fn debug_output_should_not_leak_credentials() {
        let config = load(&required_vars()).unwrap();
        let debug = format!("{:?}", config);

        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("SiteKey abc"));
    }
}
