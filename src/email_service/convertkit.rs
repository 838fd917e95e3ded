use reqwest::Client;
use secrecy::ExposeSecret;
use secrecy::Secret;
use serde::Deserialize;
use serde::Serialize;

use super::classify_failure;
use super::signup_date;
use super::transport_error;
use super::SignupOutcome;
use super::SubscribeError;
use super::SIGNUP_TAGS;
use crate::domain::SignupSource;
use crate::domain::WaitlistEmail;

const CONVERTKIT_API: &str = "https://api.convertkit.com";

/// ConvertKit API v3. Subscribers are added through a form; the api key
/// travels in the body rather than a header.
#[derive(Debug)]
pub struct ConvertKitClient {
    http_client: Client,
    base_url: String,
    api_key: Secret<String>,
    form_id: String,
}

#[derive(Serialize)]
struct SubscribeRequest<'a> {
    api_key: &'a str,
    email: &'a str,
    fields: Fields<'a>,
    tags: [&'a str; 2],
}

#[derive(Serialize)]
struct Fields<'a> {
    signup_source: &'a str,
    signup_date: String,
}

#[derive(Deserialize, Default, Debug)]
struct MessageBody {
    message: Option<String>,
}

impl MessageBody {
    fn already_subscribed(&self) -> bool {
        self.message
            .as_deref()
            .is_some_and(|m| m.contains("already subscribed"))
    }
}

impl ConvertKitClient {
    pub fn new(
        http_client: Client,
        base_url: Option<String>,
        api_key: Secret<String>,
        form_id: String,
    ) -> Self {
        let base_url = base_url.unwrap_or_else(|| CONVERTKIT_API.to_string());
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            form_id,
        }
    }

    pub async fn subscribe(
        &self,
        email: &WaitlistEmail,
        source: SignupSource,
    ) -> Result<SignupOutcome, SubscribeError> {
        let url = format!("{}/v3/forms/{}/subscribe", self.base_url, self.form_id);
        let body = SubscribeRequest {
            api_key: self.api_key.expose_secret(),
            email: email.as_ref(),
            fields: Fields {
                signup_source: source.as_str(),
                signup_date: signup_date(),
            },
            tags: SIGNUP_TAGS,
        };

        let resp = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        // convertkit may answer 200 for an existing subscriber, with only the
        // message to tell the difference; it has also been seen on error
        // responses, so both paths check it
        let body: MessageBody = resp.json().await.unwrap_or_default();

        if body.already_subscribed() {
            tracing::info!("email already subscribed to convertkit form");
            return Ok(SignupOutcome::Duplicate);
        }

        if status.is_success() {
            tracing::info!("added to convertkit form");
            return Ok(SignupOutcome::Subscribed);
        }

        tracing::error!(%status, message = ?body.message, "convertkit api error");
        let detail = body
            .message
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_default();
        Err(classify_failure(status, detail))
    }
}
