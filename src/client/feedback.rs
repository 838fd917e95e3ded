use chrono::SecondsFormat;
use chrono::Utc;
use serde::Serialize;

use crate::domain::SignupSource;

/// How urgently a screen reader should read an announcement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    /// Read when the user is idle (`aria-live="polite"`)
    Polite,
    /// Interrupts whatever is being read (`aria-live="assertive"`)
    Assertive,
}

/// Whatever renders the form's live region. Rendering is not our concern.
pub trait Announcer {
    fn announce(
        &self,
        message: &str,
        priority: Priority,
    );
}

/// Writes announcements to the log; for headless use
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAnnouncer;

impl Announcer for TracingAnnouncer {
    fn announce(
        &self,
        message: &str,
        priority: Priority,
    ) {
        tracing::info!(?priority, "announce: {message}");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Interaction {
    Focus,
    Blur,
    Input,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AnalyticsEvent {
    FormInteraction {
        form_location: SignupSource,
        interaction_type: Interaction,
    },
    #[serde(rename = "waitlist_submit_attempt")]
    SubmitAttempt { form_location: SignupSource },
    #[serde(rename = "waitlist_signup_success")]
    SignupSuccess { form_location: SignupSource },
    #[serde(rename = "error_occurred")]
    Error {
        error_type: String,
        error_message: String,
        error_location: SignupSource,
    },
}

/// An event as handed to a sink: the event itself, flattened, plus when it
/// happened
#[derive(Debug, Clone, Serialize)]
pub struct TrackedEvent {
    #[serde(flatten)]
    pub event: AnalyticsEvent,
    pub timestamp: String,
}

impl TrackedEvent {
    pub fn now(event: AnalyticsEvent) -> Self {
        Self {
            event,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Destination for analytics events (a tag manager data layer, a collector
/// endpoint...). Errors are logged by the caller and otherwise ignored; a
/// broken sink must never stop a signup.
pub trait AnalyticsSink {
    fn track(
        &self,
        event: &TrackedEvent,
    ) -> Result<(), anyhow::Error>;
}

/// Emits each event as a json string on the `analytics` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAnalytics;

impl AnalyticsSink for TracingAnalytics {
    fn track(
        &self,
        event: &TrackedEvent,
    ) -> Result<(), anyhow::Error> {
        let json = serde_json::to_string(event)?;
        tracing::info!(target: "analytics", event = %json, "analytics event tracked");
        Ok(())
    }
}
