use std::fmt::Debug;

use actix_web::http::header;
use actix_web::http::header::HeaderMap;
use actix_web::http::StatusCode;
use actix_web::web;
use actix_web::HttpRequest;
use actix_web::HttpResponse;
use actix_web::ResponseError;
use anyhow::Context;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::domain::SignupRequest;
use crate::domain::SignupSource;
use crate::domain::WaitlistEmail;
use crate::email_service::EmailService;
use crate::email_service::SignupOutcome;
use crate::email_service::SubscribeError;
use crate::rate_limit::RateLimiter;
use crate::rate_limit::UNKNOWN_CLIENT;
use crate::utils::error_chain_fmt;

/// Every way a signup can fail, each with a fixed status and `code`. The
/// `Display` text is shown to users as-is, so it must never contain anything
/// from upstream.
#[derive(thiserror::Error)]
pub enum WaitlistError {
    #[error("Too many requests. Please try again later.")]
    RateLimited,
    #[error("Invalid request format")]
    MalformedRequest(#[source] anyhow::Error),
    #[error("Email address is required")]
    MissingField,
    #[error("Please enter a valid email address")]
    InvalidFormat,
    #[error("This email is already on our waitlist. Thank you for your interest!")]
    Duplicate,
    #[error("Service temporarily unavailable. Please try again in a moment.")]
    UpstreamUnavailable(#[source] SubscribeError),
    #[error("Unable to process signup. Please try again later.")]
    UpstreamError(#[source] SubscribeError),
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("An unexpected error occurred. Please try again later.")]
    UnexpectedError(#[from] anyhow::Error),
}

impl Debug for WaitlistError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl WaitlistError {
    /// Machine-readable counterpart of the message
    pub fn code(&self) -> &'static str {
        match self {
            Self::RateLimited => "RATE_LIMIT_EXCEEDED",
            Self::MalformedRequest(_) => "INVALID_JSON",
            Self::MissingField => "MISSING_EMAIL",
            Self::InvalidFormat => "INVALID_EMAIL",
            Self::Duplicate => "DUPLICATE_EMAIL",
            Self::UpstreamUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::UpstreamError(_) => "EMAIL_SERVICE_ERROR",
            Self::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            Self::UnexpectedError(_) => "INTERNAL_ERROR",
        }
    }
}

/// Body of every non-200 response from `/api/waitlist`
#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}

impl ResponseError for WaitlistError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::MalformedRequest(_) | Self::MissingField | Self::InvalidFormat => {
                StatusCode::BAD_REQUEST
            }
            Self::Duplicate => StatusCode::CONFLICT,
            Self::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::UpstreamError(_) | Self::UnexpectedError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut resp = HttpResponse::build(self.status_code());
        if let Self::MethodNotAllowed = self {
            resp.insert_header((header::ALLOW, "POST"));
        }
        resp.json(ErrorBody {
            error: self.to_string(),
            code: self.code().to_string(),
        })
    }
}

/// The json body, before any validation. Every field is optional at this
/// stage, and of any type; absent and wrongly-typed fields are told apart in
/// `TryFrom`. Unknown fields are ignored.
#[derive(Deserialize, Debug)]
pub struct WaitlistPayload {
    #[serde(default)]
    email: Option<Value>,
    #[serde(default)]
    source: Option<Value>,
    /// 1-based attempt number sent by the browser; only logged
    #[serde(default)]
    attempt: Option<Value>,
}

impl WaitlistPayload {
    /// Anything that is not a json object is malformed, even if it is valid
    /// json (`serde` would otherwise happily build a struct from an array)
    fn parse(body: &[u8]) -> Result<Self, WaitlistError> {
        let value: Value = serde_json::from_slice(body)
            .context("request body is not valid json")
            .map_err(WaitlistError::MalformedRequest)?;
        if !value.is_object() {
            return Err(WaitlistError::MalformedRequest(anyhow::anyhow!(
                "request body is not a json object"
            )));
        }
        Ok(serde_json::from_value(value).context("could not read json object")?)
    }
}

impl TryFrom<WaitlistPayload> for SignupRequest {
    type Error = WaitlistError;
    fn try_from(value: WaitlistPayload) -> Result<Self, Self::Error> {
        // presence is judged on the raw value: `"   "` was sent, so it is
        // invalid rather than missing
        let email = match value.email {
            None | Some(Value::Null) => return Err(WaitlistError::MissingField),
            Some(Value::String(email)) if email.is_empty() => {
                return Err(WaitlistError::MissingField)
            }
            Some(Value::String(email)) => {
                WaitlistEmail::parse(&email).map_err(|_| WaitlistError::InvalidFormat)?
            }
            Some(_) => return Err(WaitlistError::InvalidFormat),
        };
        let source = SignupSource::parse(value.source.as_ref().and_then(Value::as_str));
        Ok(SignupRequest { email, source })
    }
}

/// First address in `X-Forwarded-For`, else `X-Real-IP`, else the shared
/// `unknown` bucket. Not an identity; only used to key the rate limiter.
pub fn client_id(headers: &HeaderMap) -> String {
    let first_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    first_value("x-forwarded-for")
        .or_else(|| first_value("x-real-ip"))
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

#[derive(Serialize)]
struct SuccessBody {
    success: bool,
    message: &'static str,
}

/// `POST /api/waitlist`
///
/// Steps, in order; the first failure short-circuits:
///     1. rate limit by client ip (429)
///     2. parse json body (400)
///     3. require and validate `email` (400)
///     4. clamp `source` (never fails)
///     5. forward to the email provider (409/503/500)
///
/// # Request example
///
/// ```sh
///     curl -v -H 'Content-Type: application/json' \
///         --data '{"email":"john@foo.com","source":"hero"}' \
///         http://127.0.0.1:8000/api/waitlist
/// ```
///
/// The body is taken as raw bytes (rather than `web::Json`) so that unreadable
/// bodies still produce our own `INVALID_JSON` response, and only after the
/// rate limit has been checked.
#[tracing::instrument(
    name = "Adding email to waitlist",
    skip(req, body, email_service, rate_limiter),
    fields(
        client_id=tracing::field::Empty,
        email=tracing::field::Empty,
        source=tracing::field::Empty,
        attempt=tracing::field::Empty,
    )
)]
pub async fn join_waitlist(
    req: HttpRequest,
    body: Result<web::Bytes, actix_web::Error>,
    email_service: web::Data<EmailService>,
    rate_limiter: web::Data<RateLimiter>,
) -> Result<HttpResponse, WaitlistError> {
    let client_id = client_id(req.headers());
    tracing::Span::current().record("client_id", tracing::field::display(&client_id));

    if !rate_limiter.allow(&client_id) {
        tracing::warn!("rate limit exceeded for client {client_id}");
        return Err(WaitlistError::RateLimited);
    }

    // `actix_web::Error` is not `Send`, so it cannot be wrapped by anyhow as-is
    let body = body.map_err(|e| {
        WaitlistError::MalformedRequest(anyhow::anyhow!("could not read request body: {e}"))
    })?;
    let payload = WaitlistPayload::parse(&body)?;
    if let Some(attempt) = payload.attempt.as_ref().and_then(Value::as_u64) {
        tracing::Span::current().record("attempt", attempt);
    }

    let signup: SignupRequest = payload.try_into()?;
    tracing::Span::current()
        .record("email", tracing::field::display(&signup.email))
        .record("source", tracing::field::display(signup.source));

    match email_service.subscribe(&signup.email, signup.source).await {
        Ok(SignupOutcome::Subscribed) => {
            tracing::info!(
                email = %signup.email,
                source = %signup.source,
                client_id = %client_id,
                timestamp = %Utc::now().to_rfc3339(),
                "waitlist signup"
            );
            Ok(HttpResponse::Ok().json(SuccessBody {
                success: true,
                message: "Successfully added to waitlist",
            }))
        }

        Ok(SignupOutcome::Duplicate) | Err(SubscribeError::Duplicate) => {
            tracing::info!(
                email = %signup.email,
                source = %signup.source,
                client_id = %client_id,
                timestamp = %Utc::now().to_rfc3339(),
                "duplicate waitlist signup attempt"
            );
            Err(WaitlistError::Duplicate)
        }

        Err(e) => {
            tracing::error!(
                error.cause_chain=?e,
                error.message=%e,
                "email service integration failed"
            );
            match e {
                SubscribeError::Unavailable(_) => Err(WaitlistError::UpstreamUnavailable(e)),
                _ => Err(WaitlistError::UpstreamError(e)),
            }
        }
    }
}

/// Any method other than `POST` on `/api/waitlist`
pub async fn method_not_allowed() -> HttpResponse { WaitlistError::MethodNotAllowed.error_response() }
