use reqwest::StatusCode;
use serde::Serialize;

pub const INVALID_EMAIL_MESSAGE: &str = "Please enter a valid email address.";
pub const REQUIRED_FIELD_MESSAGE: &str = "Email is required.";
pub const DUPLICATE_EMAIL_MESSAGE: &str =
    "This email is already on our waitlist. Thank you for your interest!";
pub const RATE_LIMITED_MESSAGE: &str =
    "Too many requests. Please wait a moment before trying again.";
pub const MAX_RETRIES_MESSAGE: &str =
    "Maximum retry attempts reached. Please refresh the page and try again.";

/// Shown instead of a retry button once the attempt budget is spent
pub const TROUBLESHOOTING_TIPS: [&str; 3] = [
    "Refreshing your browser",
    "Checking your internet connection",
    "Trying again in a few minutes",
];

/// What went wrong, from the point of view of someone filling in the form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientErrorKind {
    Network,
    Validation,
    Server,
    Timeout,
    Unknown,
}

impl ClientErrorKind {
    /// Fallback message, used when the server did not send one
    pub fn message(&self) -> &'static str {
        match self {
            Self::Network => "Network error. Please check your connection and try again.",
            Self::Validation => INVALID_EMAIL_MESSAGE,
            Self::Server => "Server error. Please try again in a moment.",
            Self::Timeout => "Request timed out. Please try again.",
            Self::Unknown => "Something went wrong. Please try again.",
        }
    }

    /// Whether the user is offered a "try again" button
    pub fn is_retryable(&self) -> bool { matches!(self, Self::Network | Self::Timeout | Self::Server) }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Validation => "validation",
            Self::Server => "server",
            Self::Timeout => "timeout",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub kind: ClientErrorKind,
    pub message: &'static str,
    pub duplicate: bool,
}

impl Classification {
    fn new(
        kind: ClientErrorKind,
        message: &'static str,
    ) -> Self {
        Self {
            kind,
            message,
            duplicate: false,
        }
    }
}

/// Classify a non-2xx response from `/api/waitlist`
pub fn classify_status(status: StatusCode) -> Classification {
    match status.as_u16() {
        400 => Classification::new(ClientErrorKind::Validation, INVALID_EMAIL_MESSAGE),
        409 => Classification {
            kind: ClientErrorKind::Validation,
            message: DUPLICATE_EMAIL_MESSAGE,
            duplicate: true,
        },
        429 => Classification::new(ClientErrorKind::Server, RATE_LIMITED_MESSAGE),
        500 | 502 | 503 | 504 => {
            Classification::new(ClientErrorKind::Server, ClientErrorKind::Server.message())
        }
        _ => Classification::new(ClientErrorKind::Unknown, ClientErrorKind::Unknown.message()),
    }
}

/// Classify a request that never produced a response
pub fn classify_transport(e: &reqwest::Error) -> Classification {
    let kind = if e.is_timeout() {
        ClientErrorKind::Timeout
    } else if e.is_connect() || e.is_request() {
        ClientErrorKind::Network
    } else {
        ClientErrorKind::Unknown
    };
    Classification::new(kind, kind.message())
}
