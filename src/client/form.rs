use std::time::Duration;

use super::errors::classify_status;
use super::errors::classify_transport;
use super::errors::ClientErrorKind;
use super::errors::INVALID_EMAIL_MESSAGE;
use super::errors::MAX_RETRIES_MESSAGE;
use super::errors::REQUIRED_FIELD_MESSAGE;
use super::errors::TROUBLESHOOTING_TIPS;
use super::feedback::AnalyticsEvent;
use super::feedback::AnalyticsSink;
use super::feedback::Announcer;
use super::feedback::Interaction;
use super::feedback::Priority;
use super::feedback::TrackedEvent;
use super::transport::AttemptOutcome;
use super::transport::WaitlistClient;
use crate::domain::EmailRejection;
use crate::domain::SignupSource;
use crate::domain::WaitlistEmail;

/// Manual "try again" presses per submission. Each one runs a fresh round of
/// automatic retries.
pub const MAX_MANUAL_RETRIES: u32 = 3;

pub const SUBMITTING_ANNOUNCEMENT: &str = "Submitting your email to the waitlist";
pub const SUCCESS_ANNOUNCEMENT: &str =
    "Successfully joined the waitlist! You will receive updates when the app launches.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Submitting,
    Success,
    Error {
        kind: ClientErrorKind,
        message: String,
        /// Requests sent so far for this submission
        attempts: u32,
    },
}

/// What a submission (or retry) came to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupResult {
    pub success: bool,
    pub duplicate: bool,
    pub error_kind: Option<ClientErrorKind>,
    pub message: String,
}

impl SignupResult {
    fn success() -> Self {
        Self {
            success: true,
            duplicate: false,
            error_kind: None,
            message: SUCCESS_ANNOUNCEMENT.to_string(),
        }
    }

    fn failure(
        kind: ClientErrorKind,
        message: impl Into<String>,
        duplicate: bool,
    ) -> Self {
        Self {
            success: false,
            duplicate,
            error_kind: Some(kind),
            message: message.into(),
        }
    }
}

/// One signup form (hero, footer, ...). Owns the field value, its inline
/// error, and the submission state machine
/// (`Idle -> Submitting -> Success | Error`, `Error -> Submitting` on retry).
pub struct WaitlistForm<A, N> {
    client: WaitlistClient,
    source: SignupSource,
    analytics: A,
    announcer: N,
    email: String,
    field_error: Option<&'static str>,
    state: SubmissionState,
    /// Requests sent for the current submission, across all rounds
    attempts: u32,
    manual_retries: u32,
    retry_pause: Duration,
}

impl<A, N> WaitlistForm<A, N>
where
    A: AnalyticsSink,
    N: Announcer,
{
    pub fn new(
        client: WaitlistClient,
        source: SignupSource,
        analytics: A,
        announcer: N,
    ) -> Self {
        Self {
            client,
            source,
            analytics,
            announcer,
            email: String::new(),
            field_error: None,
            state: SubmissionState::Idle,
            attempts: 0,
            manual_retries: 0,
            retry_pause: Duration::from_millis(1000),
        }
    }

    /// Pause before a manual retry starts sending
    pub fn with_retry_pause(
        mut self,
        pause: Duration,
    ) -> Self {
        self.retry_pause = pause;
        self
    }

    pub fn email(&self) -> &str { &self.email }

    pub fn field_error(&self) -> Option<&'static str> { self.field_error }

    pub fn state(&self) -> &SubmissionState { &self.state }

    pub fn attempts(&self) -> u32 { self.attempts }

    pub fn manual_retries(&self) -> u32 { self.manual_retries }

    pub fn source(&self) -> SignupSource { self.source }

    /// Submit is disabled while a request is in flight or the field is invalid
    pub fn can_submit(&self) -> bool {
        self.state != SubmissionState::Submitting && self.field_error.is_none()
    }

    pub fn can_retry(&self) -> bool {
        match &self.state {
            SubmissionState::Error { kind, .. } => {
                kind.is_retryable() && self.manual_retries < MAX_MANUAL_RETRIES
            }
            _ => false,
        }
    }

    /// Offered once a retryable error has used up every manual retry
    pub fn troubleshooting_tips(&self) -> Option<&'static [&'static str]> {
        match &self.state {
            SubmissionState::Error { kind, .. }
                if kind.is_retryable() && self.manual_retries >= MAX_MANUAL_RETRIES =>
            {
                Some(&TROUBLESHOOTING_TIPS)
            }
            _ => None,
        }
    }

    /// The field changed. Validation runs as the user types; an empty field
    /// is not flagged until submit.
    pub fn input(
        &mut self,
        value: &str,
    ) {
        self.email = value.to_string();
        self.field_error = match WaitlistEmail::parse(value) {
            Err(EmailRejection::Malformed) => Some(INVALID_EMAIL_MESSAGE),
            _ => None,
        };
        if matches!(self.state, SubmissionState::Error { .. }) {
            self.state = SubmissionState::Idle;
        }
        self.track_interaction(Interaction::Input);
    }

    pub fn focus(&mut self) { self.track_interaction(Interaction::Focus); }

    pub fn blur(&mut self) { self.track_interaction(Interaction::Blur); }

    /// Validate locally, then send. An invalid email never reaches the
    /// network.
    pub async fn submit(&mut self) -> SignupResult {
        let email = match self.validate() {
            Ok(email) => email,
            Err(result) => return result,
        };
        self.attempts = 0;
        self.manual_retries = 0;
        self.run(email).await
    }

    /// Manual retry after a retryable error. Returns `None` when there is
    /// nothing to retry; once every manual retry is spent the error message
    /// is replaced (and announced) and `None` is returned.
    pub async fn retry(&mut self) -> Option<SignupResult> {
        if !self.can_retry() {
            let mut exhausted = false;
            if let SubmissionState::Error { message, kind, .. } = &mut self.state {
                if kind.is_retryable() && message.as_str() != MAX_RETRIES_MESSAGE {
                    *message = MAX_RETRIES_MESSAGE.to_string();
                    exhausted = true;
                }
            }
            if exhausted {
                self.announcer.announce(
                    &format!("Error joining waitlist: {MAX_RETRIES_MESSAGE}"),
                    Priority::Assertive,
                );
            }
            return None;
        }

        self.manual_retries += 1;
        self.emit(AnalyticsEvent::Error {
            error_type: "manual_retry_attempt".to_string(),
            error_message: format!("retry {}", self.manual_retries),
            error_location: self.source,
        });
        tokio::time::sleep(self.retry_pause).await;

        let email = match self.validate() {
            Ok(email) => email,
            Err(result) => return Some(result),
        };
        Some(self.run(email).await)
    }

    /// Blank input (whitespace only included) asks for an email rather than
    /// a valid one; the endpoint is stricter and calls that `INVALID_EMAIL`.
    fn validate(&mut self) -> Result<WaitlistEmail, SignupResult> {
        WaitlistEmail::parse(&self.email).map_err(|e| {
            let message = match e {
                EmailRejection::Missing => REQUIRED_FIELD_MESSAGE,
                EmailRejection::Malformed => INVALID_EMAIL_MESSAGE,
            };
            self.field_error = Some(message);
            SignupResult::failure(ClientErrorKind::Validation, message, false)
        })
    }

    async fn run(
        &mut self,
        email: WaitlistEmail,
    ) -> SignupResult {
        self.state = SubmissionState::Submitting;
        self.field_error = None;
        self.announcer
            .announce(SUBMITTING_ANNOUNCEMENT, Priority::Polite);
        self.emit(AnalyticsEvent::SubmitAttempt {
            form_location: self.source,
        });

        let budget = self.client.policy().max_attempts;
        let report = self
            .client
            .submit_with_retry(email.as_ref(), self.source, self.attempts, budget)
            .await;
        self.attempts += report.attempts;

        match report.outcome {
            AttemptOutcome::Accepted => {
                self.state = SubmissionState::Success;
                self.attempts = 0;
                self.manual_retries = 0;
                self.email.clear();
                self.emit(AnalyticsEvent::SignupSuccess {
                    form_location: self.source,
                });
                self.announcer
                    .announce(SUCCESS_ANNOUNCEMENT, Priority::Assertive);
                SignupResult::success()
            }
            AttemptOutcome::Rejected { status, error } => {
                let c = classify_status(status);
                let message = error.unwrap_or_else(|| c.message.to_string());
                self.fail(c.kind, message, c.duplicate, "api_error")
            }
            AttemptOutcome::Failed(e) => {
                let c = classify_transport(&e);
                tracing::warn!(error = %e, kind = c.kind.as_str(), "waitlist submission failed");
                self.fail(c.kind, c.message.to_string(), false, "network_error")
            }
        }
    }

    fn fail(
        &mut self,
        kind: ClientErrorKind,
        message: String,
        duplicate: bool,
        error_type: &str,
    ) -> SignupResult {
        self.state = SubmissionState::Error {
            kind,
            message: message.clone(),
            attempts: self.attempts,
        };
        self.emit(AnalyticsEvent::Error {
            error_type: error_type.to_string(),
            error_message: message.clone(),
            error_location: self.source,
        });
        self.announcer.announce(
            &format!("Error joining waitlist: {message}"),
            Priority::Assertive,
        );
        SignupResult::failure(kind, message, duplicate)
    }

    fn track_interaction(
        &self,
        interaction_type: Interaction,
    ) {
        self.emit(AnalyticsEvent::FormInteraction {
            form_location: self.source,
            interaction_type,
        });
    }

    fn emit(
        &self,
        event: AnalyticsEvent,
    ) {
        if let Err(e) = self.analytics.track(&TrackedEvent::now(event)) {
            tracing::warn!(error = %e, "failed to track analytics event");
        }
    }
}
