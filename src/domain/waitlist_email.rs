use std::fmt::Display;

use once_cell::sync::Lazy;
use regex::Regex;

/// Longest address accepted, counted in `char`s (unicode scalar values) after
/// normalisation. A browser's `String.length` counts UTF-16 code units, so the
/// two disagree on characters outside the BMP (e.g. emoji): such an address can
/// pass here at a length a browser would report as over 254.
const MAX_EMAIL_LENGTH: usize = 254;

// `\s` is unicode-aware in `regex`, so this rejects the same whitespace a
// browser would
static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));

/// Why an address was refused. Callers show different messages for each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailRejection {
    /// Nothing was entered
    Missing,
    /// Something was entered, but it does not look like `local@domain.tld`,
    /// or it is too long
    Malformed,
}

impl Display for EmailRejection {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::Missing => write!(f, "Email address is required"),
            Self::Malformed => write!(f, "Please enter a valid email address"),
        }
    }
}

/// A trimmed, lowercased email address that has passed the format and length
/// checks. The only way in is `WaitlistEmail::parse`, so anything holding one
/// can hand it to an email provider without checking again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitlistEmail(String);

impl WaitlistEmail {
    pub fn parse(raw: &str) -> Result<Self, EmailRejection> {
        let normalised = raw.trim().to_lowercase();
        if normalised.is_empty() {
            return Err(EmailRejection::Missing);
        }
        match is_valid_email(&normalised) {
            true => Ok(Self(normalised)),
            false => Err(EmailRejection::Malformed),
        }
    }
}

/// Check an already-normalised address against the pattern and the length cap
fn is_valid_email(email: &str) -> bool {
    email.chars().count() <= MAX_EMAIL_LENGTH && EMAIL_PATTERN.is_match(email)
}

impl AsRef<str> for WaitlistEmail {
    fn as_ref(&self) -> &str { &self.0 }
}

impl Display for WaitlistEmail {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
