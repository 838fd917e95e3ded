use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use secrecy::Secret;
use serde::Deserialize;
use serde::Serialize;

use super::classify_failure;
use super::signup_date;
use super::transport_error;
use super::ConfigurationError;
use super::SignupOutcome;
use super::SubscribeError;
use super::SIGNUP_TAGS;
use crate::domain::SignupSource;
use crate::domain::WaitlistEmail;

/// Mailchimp Marketing API v3. Members are added to a single audience (list).
#[derive(Debug)]
pub struct MailchimpClient {
    http_client: Client,
    base_url: String,
    api_key: Secret<String>,
    audience_id: String,
}

#[derive(Serialize)]
struct AddMemberRequest<'a> {
    email_address: &'a str,
    status: &'a str,
    merge_fields: MergeFields<'a>,
    tags: [&'a str; 2],
}

#[derive(Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
struct MergeFields<'a> {
    signup_source: &'a str,
    signup_date: String,
}

/// Mailchimp errors are "problem details" documents; only these two fields
/// matter to us
#[derive(Deserialize, Default, Debug)]
struct ProblemDetail {
    title: Option<String>,
    detail: Option<String>,
}

impl MailchimpClient {
    /// Without `base_url`, requests go to the datacenter named by the api key's
    /// suffix (`<key>-us4` -> `https://us4.api.mailchimp.com`).
    pub fn new(
        http_client: Client,
        base_url: Option<String>,
        api_key: Secret<String>,
        audience_id: String,
    ) -> Result<Self, ConfigurationError> {
        let base_url = match base_url {
            Some(url) => url,
            None => {
                let datacenter = datacenter(api_key.expose_secret())
                    .ok_or(ConfigurationError::MissingDatacenter)?;
                format!("https://{datacenter}.api.mailchimp.com")
            }
        };
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            audience_id,
        })
    }

    pub async fn subscribe(
        &self,
        email: &WaitlistEmail,
        source: SignupSource,
    ) -> Result<SignupOutcome, SubscribeError> {
        let url = format!("{}/3.0/lists/{}/members", self.base_url, self.audience_id);
        let body = AddMemberRequest {
            email_address: email.as_ref(),
            status: "subscribed",
            merge_fields: MergeFields {
                signup_source: source.as_str(),
                signup_date: signup_date(),
            },
            tags: SIGNUP_TAGS,
        };

        let resp = self
            .http_client
            .post(&url)
            .header(
                AUTHORIZATION,
                format!("apikey {}", self.api_key.expose_secret()),
            )
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if status.is_success() {
            tracing::info!("added to mailchimp audience");
            return Ok(SignupOutcome::Subscribed);
        }

        // error bodies are not guaranteed to be json (e.g. from a proxy in front
        // of the api)
        let problem: ProblemDetail = resp.json().await.unwrap_or_default();

        if status == StatusCode::BAD_REQUEST && problem.title.as_deref() == Some("Member Exists") {
            tracing::info!("email already in mailchimp audience");
            return Ok(SignupOutcome::Duplicate);
        }

        tracing::error!(
            %status,
            title = ?problem.title,
            detail = ?problem.detail,
            "mailchimp api error"
        );
        let detail = problem
            .detail
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_default();
        Err(classify_failure(status, detail))
    }
}

/// The segment after the first `-`, if any
fn datacenter(api_key: &str) -> Option<&str> {
    api_key
        .split('-')
        .nth(1)
        .filter(|dc| !dc.is_empty())
}
