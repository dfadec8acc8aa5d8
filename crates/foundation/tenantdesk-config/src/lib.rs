//! # tenantdesk-config
//!
//! Layered configuration: defaults, then an optional YAML file, then
//! environment variables. Environment keys keep their historical names
//! (`DB_URL`, `ADMIN_SECRET_KEY`, ...) so existing deployments carry over.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tenantdesk_core::token::parse_duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Missing required setting: {0}")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AppEnv {
    #[default]
    #[serde(rename = "production")]
    Production,
    #[serde(rename = "dev")]
    Dev,
    #[serde(rename = "devLocal")]
    DevLocal,
}

impl AppEnv {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "production" | "prod" => Some(AppEnv::Production),
            "dev" => Some(AppEnv::Dev),
            "devLocal" => Some(AppEnv::DevLocal),
            _ => None,
        }
    }

    /// Development environments echo ids and links in replies and use a
    /// fixed password for generated accounts.
    pub fn is_dev(self) -> bool {
        matches!(self, AppEnv::Dev | AppEnv::DevLocal)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Request body limit, e.g. `50mb`.
    pub max_size: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            max_size: "50mb".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub name: String,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "mongodb://localhost:27017".into(),
            name: "tenantdesk".into(),
            pool_size: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub admin_secret: String,
    pub admin_expires: String,
    pub admin_passlink_expires: String,
    pub cap_secret: String,
    pub cap_expires: String,
    pub customer_secret: String,
    pub customer_expires: String,
    pub lead_invite_expires: String,
    pub crypto_secret: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_secret: String::new(),
            admin_expires: "1d".into(),
            admin_passlink_expires: "1h".into(),
            cap_secret: String::new(),
            cap_expires: "1d".into(),
            customer_secret: String::new(),
            customer_expires: "1d".into(),
            lead_invite_expires: "7d".into(),
            crypto_secret: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    /// Email of the first superadmin.
    pub email: String,
    /// When unset a password is generated and mailed.
    pub admin_password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub title: String,
    pub fe_host: String,
    pub fe_port: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Tenantdesk".into(),
            fe_host: "localhost".into(),
            fe_port: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    /// Sender of internal notifications.
    pub notify_from: String,
    /// Recipients of internal notifications.
    pub notify_to: Vec<String>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: "localhost".into(),
            smtp_port: 587,
            notify_from: String::new(),
            notify_to: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub env: AppEnv,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub seed: SeedConfig,
    pub site: SiteConfig,
    pub mail: MailConfig,
}

impl Config {
    /// Load defaults, the YAML file (explicit path, else the per-user config
    /// file when it exists), then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = path.map(Path::to_path_buf).or_else(|| {
            default_path().filter(|p| p.exists())
        });
        let mut config = match file {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Apply overrides from a key lookup (the process environment in
    /// production, a map in tests).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(raw) = get("APP_ENV").or_else(|| get("NODE_ENV")) {
            self.env = AppEnv::parse(&raw).ok_or(Error::InvalidValue {
                key: "APP_ENV",
                value: raw,
            })?;
        }

        set_string(&get, "HOST", &mut self.server.host);
        set_parsed(&get, "PORT", &mut self.server.port)?;
        set_string(&get, "MAX_SIZE", &mut self.server.max_size);

        set_string(&get, "DB_URL", &mut self.database.url);
        set_string(&get, "DB", &mut self.database.name);
        set_parsed(&get, "DB_POOL_SIZE", &mut self.database.pool_size)?;

        set_string(&get, "ADMIN_SECRET_KEY", &mut self.auth.admin_secret);
        set_string(&get, "ADMIN_JWT_EXPIRES", &mut self.auth.admin_expires);
        set_string(&get, "ADMIN_PASSLINK_EXPIRE", &mut self.auth.admin_passlink_expires);
        set_string(&get, "CAP_SECRET_KEY", &mut self.auth.cap_secret);
        set_string(&get, "CAP_JWT_EXPIRES", &mut self.auth.cap_expires);
        set_string(&get, "CUSTOMER_SECRET_KEY", &mut self.auth.customer_secret);
        set_string(&get, "CUSTOMER_JWT_EXPIRES", &mut self.auth.customer_expires);
        set_string(&get, "LEAD_INVITE_EXPIRE", &mut self.auth.lead_invite_expires);
        set_string(&get, "CRYPTO_SECRET", &mut self.auth.crypto_secret);

        set_string(&get, "EMAIL", &mut self.seed.email);
        if let Some(pass) = get("SEED_ADMIN_PASSWORD") {
            self.seed.admin_password = Some(pass);
        }

        set_string(&get, "TITLE", &mut self.site.title);
        set_string(&get, "FE_HOST", &mut self.site.fe_host);
        set_string(&get, "FE_PORT", &mut self.site.fe_port);

        set_string(&get, "SMTP_HOST", &mut self.mail.smtp_host);
        set_parsed(&get, "SMTP_PORT", &mut self.mail.smtp_port)?;
        set_string(&get, "NOTIFY_FROM", &mut self.mail.notify_from);
        if let Some(raw) = get("NOTIFY_TO") {
            self.mail.notify_to = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        Ok(())
    }

    /// Reject configurations the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        let secrets = [
            ("ADMIN_SECRET_KEY", &self.auth.admin_secret),
            ("CAP_SECRET_KEY", &self.auth.cap_secret),
            ("CUSTOMER_SECRET_KEY", &self.auth.customer_secret),
            ("CRYPTO_SECRET", &self.auth.crypto_secret),
        ];
        if let Some((key, _)) = secrets.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(Error::Missing(*key));
        }
        self.admin_ttl()?;
        self.admin_passlink_ttl()?;
        self.cap_ttl()?;
        self.lead_invite_ttl()?;
        self.max_body_bytes()?;
        Ok(())
    }

    pub fn admin_ttl(&self) -> Result<u64> {
        duration("ADMIN_JWT_EXPIRES", &self.auth.admin_expires)
    }

    pub fn admin_passlink_ttl(&self) -> Result<u64> {
        duration("ADMIN_PASSLINK_EXPIRE", &self.auth.admin_passlink_expires)
    }

    pub fn cap_ttl(&self) -> Result<u64> {
        duration("CAP_JWT_EXPIRES", &self.auth.cap_expires)
    }

    pub fn lead_invite_ttl(&self) -> Result<u64> {
        duration("LEAD_INVITE_EXPIRE", &self.auth.lead_invite_expires)
    }

    /// `MAX_SIZE` in bytes. Accepts `50mb`, `512kb`, `1gb` or a byte count.
    pub fn max_body_bytes(&self) -> Result<usize> {
        parse_size(&self.server.max_size).ok_or_else(|| Error::InvalidValue {
            key: "MAX_SIZE",
            value: self.server.max_size.clone(),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Public front-end origin, used when seeding general settings.
    pub fn site_url(&self) -> String {
        if self.site.fe_port.is_empty() {
            format!("https://{}", self.site.fe_host)
        } else {
            format!("https://{}:{}", self.site.fe_host, self.site.fe_port)
        }
    }

    /// Settings for running against a local stack. The secrets are
    /// placeholders and must never reach production.
    pub fn local() -> Self {
        let mut config = Self {
            env: AppEnv::DevLocal,
            ..Self::default()
        };
        config.auth.admin_secret = "local-admin-secret".into();
        config.auth.cap_secret = "local-cap-secret".into();
        config.auth.customer_secret = "local-customer-secret".into();
        config.auth.crypto_secret = "local-crypto-secret".into();
        config.seed.email = "admin@localhost.test".into();
        config.mail.notify_from = "notify@localhost.test".into();
        config.mail.notify_to = vec!["sales@localhost.test".into()];
        config
    }
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tenantdesk").join("config.yaml"))
}

fn set_string<G>(get: &G, key: &str, target: &mut String)
where
    G: Fn(&str) -> Option<String>,
{
    if let Some(value) = get(key) {
        *target = value;
    }
}

fn set_parsed<G, T>(get: &G, key: &'static str, target: &mut T) -> Result<()>
where
    G: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    if let Some(value) = get(key) {
        *target = value
            .trim()
            .parse()
            .map_err(|_| Error::InvalidValue { key, value })?;
    }
    Ok(())
}

fn duration(key: &'static str, raw: &str) -> Result<u64> {
    parse_duration(raw).map_err(|_| Error::InvalidValue {
        key,
        value: raw.to_string(),
    })
}

fn parse_size(raw: &str) -> Option<usize> {
    let raw = raw.trim().to_ascii_lowercase();
    let split = raw.find(|c: char| !c.is_ascii_digit()).unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let value: usize = digits.parse().ok()?;
    let factor = match unit.trim() {
        "" | "b" => 1,
        "kb" => 1024,
        "mb" => 1024 * 1024,
        "gb" => 1024 * 1024 * 1024,
        _ => return None,
    };
    value.checked_mul(factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn env_overrides_defaults() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("NODE_ENV", "dev"),
                ("PORT", "9000"),
                ("DB", "crm"),
                ("NOTIFY_TO", "a@x.io, b@x.io,"),
                ("SEED_ADMIN_PASSWORD", "hunter2"),
            ]))
            .unwrap();
        assert_eq!(config.env, AppEnv::Dev);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.database.name, "crm");
        assert_eq!(config.mail.notify_to, vec!["a@x.io", "b@x.io"]);
        assert_eq!(config.seed.admin_password.as_deref(), Some("hunter2"));
    }

    #[test]
    fn app_env_takes_precedence_over_node_env() {
        let mut config = Config::default();
        config
            .apply_env(env(&[("APP_ENV", "production"), ("NODE_ENV", "dev")]))
            .unwrap();
        assert_eq!(config.env, AppEnv::Production);
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let mut config = Config::default();
        let err = config.apply_env(env(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, Error::InvalidValue { key: "PORT", .. }));
    }

    #[test]
    fn yaml_layer() {
        let config = Config::from_yaml(
            "env: devLocal\nserver:\n  port: 7000\nauth:\n  admin_secret: abc\n",
        )
        .unwrap();
        assert_eq!(config.env, AppEnv::DevLocal);
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.auth.admin_secret, "abc");
    }

    #[test]
    fn validate_requires_secrets() {
        assert!(matches!(
            Config::default().validate(),
            Err(Error::Missing("ADMIN_SECRET_KEY"))
        ));
        assert!(Config::local().validate().is_ok());
    }

    #[test]
    fn sizes() {
        assert_eq!(parse_size("50mb"), Some(50 * 1024 * 1024));
        assert_eq!(parse_size("512KB"), Some(512 * 1024));
        assert_eq!(parse_size("1000"), Some(1000));
        assert_eq!(parse_size("lots"), None);
    }

    #[test]
    fn site_url_with_and_without_port() {
        let mut config = Config::default();
        config.site.fe_host = "app.example.com".into();
        assert_eq!(config.site_url(), "https://app.example.com");
        config.site.fe_port = "8443".into();
        assert_eq!(config.site_url(), "https://app.example.com:8443");
    }
}
