use std::fmt::Display;

use serde::Serialize;

/// Where on the page a signup form lives. Forms send this along with the
/// email, and it is forwarded to the email provider as a merge field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignupSource {
    Hero,
    FooterCta,
    Modal,
    Unknown,
}

impl SignupSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hero => "hero",
            Self::FooterCta => "footer_cta",
            Self::Modal => "modal",
            Self::Unknown => "unknown",
        }
    }

    /// Clamp a raw `source` value to the set the endpoint accepts. Absent or
    /// unrecognised values become `Unknown`; this never fails.
    ///
    /// Note: `modal` is a valid form location, but is not in the accepted set,
    /// so it is recorded as `unknown`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("hero") => Self::Hero,
            Some("footer_cta") => Self::FooterCta,
            _ => Self::Unknown,
        }
    }
}

impl Display for SignupSource {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
