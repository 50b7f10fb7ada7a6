use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use url::Url;

pub const DEFAULT_GRADES_PATH: &str =
    "portal/portal.xsl?x=portal.PortalOutline&lang=en&mode=grades&x=portal.PortalGrades";
pub const DEFAULT_DATA_FILE: &str = "data.csv";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} is not a valid URL: {value}")]
    InvalidUrl {
        key: &'static str,
        value: String,
        #[source]
        source: url::ParseError,
    },
}

/// Portal location and login, read once at startup.
#[derive(Clone)]
pub struct Config {
    pub base_url: Url,
    pub login_url: Url,
    pub username: String,
    pub password: String,
    pub grades_path: String,
    pub data_file: PathBuf,
}

// Keep the password out of debug output.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url.as_str())
            .field("login_url", &self.login_url.as_str())
            .field("username", &self.username)
            .field("grades_path", &self.grades_path)
            .field("data_file", &self.data_file)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from: String,
    pub to: String,
}

fn required<F>(get: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn optional<F>(get: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_url(key: &'static str, value: String) -> Result<Url, ConfigError> {
    Url::parse(&value).map_err(|source| ConfigError::InvalidUrl { key, value, source })
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut base = required(&get, "GRADES_BASE_URL")?;
        // Relative joins only keep the last path segment when it ends in '/'.
        if !base.ends_with('/') {
            base.push('/');
        }

        Ok(Self {
            base_url: parse_url("GRADES_BASE_URL", base)?,
            login_url: parse_url("GRADES_LOGIN_URL", required(&get, "GRADES_LOGIN_URL")?)?,
            username: required(&get, "GRADES_USERNAME")?,
            password: required(&get, "GRADES_PASSWORD")?,
            grades_path: optional(&get, "GRADES_PAGE_PATH")
                .unwrap_or_else(|| DEFAULT_GRADES_PATH.to_string()),
            data_file: optional(&get, "GRADES_DATA_FILE")
                .unwrap_or_else(|| DEFAULT_DATA_FILE.to_string())
                .into(),
        })
    }

    pub fn grades_url(&self) -> Result<Url, ConfigError> {
        let path = self.grades_path.trim_start_matches('/');
        self.base_url
            .join(path)
            .map_err(|source| ConfigError::InvalidUrl {
                key: "GRADES_PAGE_PATH",
                value: self.grades_path.clone(),
                source,
            })
    }
}

impl EmailConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            smtp_host: required(&get, "SMTP_HOST")?,
            smtp_username: required(&get, "SMTP_USERNAME")?,
            smtp_password: required(&get, "SMTP_PASSWORD")?,
            from: required(&get, "EMAIL_FROM")?,
            to: required(&get, "EMAIL_TO")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn base_pairs() -> Vec<(&'static str, &'static str)> {
        vec![
            ("GRADES_BASE_URL", "https://campus.example.org/campus"),
            ("GRADES_LOGIN_URL", "https://campus.example.org/campus/portal/district.jsp"),
            ("GRADES_USERNAME", "student"),
            ("GRADES_PASSWORD", "hunter2"),
        ]
    }

    #[test]
    fn loads_required_keys_with_defaults() {
        let config = Config::from_lookup(lookup(&base_pairs())).unwrap();
        assert_eq!(config.base_url.as_str(), "https://campus.example.org/campus/");
        assert_eq!(config.username, "student");
        assert_eq!(config.grades_path, DEFAULT_GRADES_PATH);
        assert_eq!(config.data_file, PathBuf::from("data.csv"));
    }

    #[test]
    fn grades_url_extends_the_base_path() {
        let mut pairs = base_pairs();
        pairs.push(("GRADES_PAGE_PATH", "/portal/grades?mode=all"));
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(
            config.grades_url().unwrap().as_str(),
            "https://campus.example.org/campus/portal/grades?mode=all"
        );
    }

    #[test]
    fn missing_or_blank_keys_are_rejected() {
        let pairs: Vec<_> = base_pairs()
            .into_iter()
            .filter(|(k, _)| *k != "GRADES_PASSWORD")
            .collect();
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("GRADES_PASSWORD")));

        let mut pairs = base_pairs();
        pairs[2] = ("GRADES_USERNAME", "   ");
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("GRADES_USERNAME")));
    }

    #[test]
    fn bad_urls_are_rejected() {
        let mut pairs = base_pairs();
        pairs[1] = ("GRADES_LOGIN_URL", "not a url");
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { key: "GRADES_LOGIN_URL", .. }));
    }

    #[test]
    fn debug_output_hides_the_password() {
        let config = Config::from_lookup(lookup(&base_pairs())).unwrap();
        assert!(!format!("{config:?}").contains("hunter2"));
    }

    #[test]
    fn email_settings_are_all_required() {
        let err = EmailConfig::from_lookup(lookup(&[("SMTP_HOST", "smtp.example.org")]))
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::Missing("SMTP_USERNAME")));
    }
}
