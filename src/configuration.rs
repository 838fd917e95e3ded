use std::env;
use std::env::current_dir;
use std::fmt::Display;
use std::time::Duration;

use config::Config;
use config::ConfigError;
use secrecy::Secret;
use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;

/// Global configuration, loaded from `configuration/*.yaml` and `APP_*` env
/// vars. See `get_configuration`.
#[derive(Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub email_service: EmailServiceSettings,
    pub rate_limit: RateLimitSettings,
}

/// Server configuration
#[derive(Deserialize, Clone)]
pub struct ApplicationSettings {
    /// Should be localhost on dev machine, 0.0.0.0 on prod
    pub host: String,

    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
}

/// Which email marketing provider receives signups. Only one is active at a
/// time. Names are case-insensitive (`ConvertKit` works); an unknown name
/// stops startup rather than silently picking Mailchimp.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(try_from = "String")]
pub enum EmailServiceKind {
    #[default]
    Mailchimp,
    Convertkit,
}

impl TryFrom<String> for EmailServiceKind {
    type Error = String;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "mailchimp" => Ok(Self::Mailchimp),
            "convertkit" => Ok(Self::Convertkit),
            e => Err(format!(
                "{e} is not a supported email provider; use `mailchimp` or `convertkit`"
            )),
        }
    }
}

/// Email provider credentials. `audience_id` is the Mailchimp audience (list)
/// id, or the ConvertKit form id.
#[derive(Deserialize, Clone)]
pub struct EmailServiceSettings {
    #[serde(default)]
    pub provider: EmailServiceKind,

    pub api_key: Secret<String>,

    pub audience_id: String,

    /// Overrides the provider's public API host; only really useful for
    /// pointing the service at a mock server in tests
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_milliseconds: u64,
}

impl EmailServiceSettings {
    pub fn timeout(&self) -> Duration { Duration::from_millis(self.timeout_milliseconds) }
}

/// Sliding window applied to `POST /api/waitlist`, per client ip
#[derive(Deserialize, Clone)]
pub struct RateLimitSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub window_milliseconds: u64,

    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_requests: usize,
}

impl RateLimitSettings {
    pub fn window(&self) -> Duration { Duration::from_millis(self.window_milliseconds) }
}

#[derive(Debug)]
pub enum Environment {
    Local,
    Production,
}

impl Display for Environment {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Environment::Local => "local",
                Environment::Production => "production",
            }
        )
    }
}

impl TryFrom<String> for Environment {
    type Error = String;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            e => Err(format!("{e} is not a supported environment; use `local` or `production`")),
        }
    }
}

/// Load yaml configuration files at `<project_root>/configuration`.
///
/// `base.yaml` is read first, then the file for `APP_ENVIRONMENT` (`local` if
/// unset), then env vars, each layer overriding the last:
///
/// `APP_EMAIL_SERVICE__API_KEY=abc-us4` -> `Settings.email_service.api_key`
///
/// `production.yaml` carries no credentials; if they are not provided by env
/// vars, deserialisation fails and the server will not start.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let cfg_dir = current_dir()
        .map_err(|e| ConfigError::Message(format!("could not get current dir: {e}")))?
        .join("configuration");

    let env: Environment = env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".to_string())
        .try_into()
        .map_err(ConfigError::Message)?;

    let settings = Config::builder()
        .add_source(config::File::from(cfg_dir.join("base.yaml")))
        .add_source(config::File::from(cfg_dir.join(format!("{env}.yaml"))))
        .add_source(
            // env vars are -always- parsed as String, hence `serde-aux` for the
            // numeric fields
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}
