mod convertkit;
mod mailchimp;

use std::fmt::Debug;
use std::time::Duration;

use chrono::SecondsFormat;
use chrono::Utc;
pub use convertkit::ConvertKitClient;
pub use mailchimp::MailchimpClient;
use reqwest::Client;
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use secrecy::Secret;

use crate::configuration::EmailServiceKind;
use crate::configuration::EmailServiceSettings;
use crate::domain::SignupSource;
use crate::domain::WaitlistEmail;
use crate::utils::error_chain_fmt;

/// Attached to every signup, whichever provider is active
pub const SIGNUP_TAGS: [&str; 2] = ["PataDoc_Waitlist", "Pre_Launch"];

/// What the provider did with a signup. Both are successes; a duplicate just
/// means the address was already on the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignupOutcome {
    Subscribed,
    Duplicate,
}

/// Why a signup did not go through. The route switches on these variants, so
/// providers must translate their own responses into one of them.
#[derive(thiserror::Error)]
pub enum SubscribeError {
    /// Some providers report existing subscribers as a failure, with nothing
    /// but free text to go on
    #[error("The email provider reported an existing subscriber")]
    Duplicate,
    /// Timeouts, refused connections, and 502/503/504 from upstream
    #[error("The email provider is unavailable")]
    Unavailable(#[source] anyhow::Error),
    #[error("The email provider rejected the signup with {status}: {detail}")]
    Rejected { status: StatusCode, detail: String },
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl Debug for SubscribeError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

/// Raised while building an `EmailService`, i.e. before any request is sent.
/// Any of these stops the server from starting.
#[derive(thiserror::Error, Debug)]
pub enum ConfigurationError {
    #[error("Email service configuration missing: api_key")]
    MissingApiKey,
    #[error("Email service configuration missing: audience_id")]
    MissingAudienceId,
    #[error("Mailchimp api key has no datacenter suffix (expected e.g. `<key>-us4`)")]
    MissingDatacenter,
    #[error("Could not build http client for the email service")]
    HttpClient(#[source] reqwest::Error),
}

/// The active email provider. New providers are added as variants (and a
/// matching `EmailServiceKind`), never by branching on names at call sites.
///
/// Establishing a HTTP connection is expensive, so this is built once at
/// startup and shared by all workers through `web::Data`.
#[derive(Debug)]
pub enum EmailService {
    Mailchimp(MailchimpClient),
    ConvertKit(ConvertKitClient),
}

impl EmailService {
    pub fn from_settings(cfg: &EmailServiceSettings) -> Result<Self, ConfigurationError> {
        if cfg.api_key.expose_secret().trim().is_empty() {
            return Err(ConfigurationError::MissingApiKey);
        }
        if cfg.audience_id.trim().is_empty() {
            return Err(ConfigurationError::MissingAudienceId);
        }

        let http_client = http_client(cfg.timeout())?;
        let api_key = Secret::new(cfg.api_key.expose_secret().trim().to_string());
        let audience_id = cfg.audience_id.trim().to_string();

        let service = match cfg.provider {
            EmailServiceKind::Mailchimp => Self::Mailchimp(MailchimpClient::new(
                http_client,
                cfg.base_url.clone(),
                api_key,
                audience_id,
            )?),
            EmailServiceKind::Convertkit => Self::ConvertKit(ConvertKitClient::new(
                http_client,
                cfg.base_url.clone(),
                api_key,
                audience_id,
            )),
        };
        Ok(service)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Mailchimp(_) => "mailchimp",
            Self::ConvertKit(_) => "convertkit",
        }
    }

    /// Add `email` to the provider's list. Sends exactly one request; retrying
    /// is up to the caller.
    #[tracing::instrument(
        name = "Subscribing email with provider",
        skip_all,
        fields(provider = %self.name(), email = %email, source = %source),
        err
    )]
    pub async fn subscribe(
        &self,
        email: &WaitlistEmail,
        source: SignupSource,
    ) -> Result<SignupOutcome, SubscribeError> {
        match self {
            Self::Mailchimp(c) => c.subscribe(email, source).await,
            Self::ConvertKit(c) => c.subscribe(email, source).await,
        }
    }
}

fn http_client(timeout: Duration) -> Result<Client, ConfigurationError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(ConfigurationError::HttpClient)
}

/// `SIGNUP_DATE`/`signup_date`: UTC, millisecond precision, `Z` suffix
fn signup_date() -> String { Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true) }

/// Failures before any response arrived
fn transport_error(e: reqwest::Error) -> SubscribeError {
    match e.is_timeout() || e.is_connect() {
        true => SubscribeError::Unavailable(e.into()),
        false => SubscribeError::UnexpectedError(e.into()),
    }
}

/// Turn a non-success response into a variant. Providers don't agree on a
/// machine-readable duplicate code, so their free text is inspected here (and
/// only here) for duplicate and availability hints.
fn classify_failure(
    status: StatusCode,
    detail: String,
) -> SubscribeError {
    let lowered = detail.to_lowercase();
    if lowered.contains("duplicate") || lowered.contains("already exists") {
        return SubscribeError::Duplicate;
    }
    let unavailable = matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    ) || lowered.contains("timeout")
        || lowered.contains("unavailable");
    match unavailable {
        true => SubscribeError::Unavailable(anyhow::anyhow!("{status}: {detail}")),
        false => SubscribeError::Rejected { status, detail },
    }
}
