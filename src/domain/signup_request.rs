use super::SignupSource;
use super::WaitlistEmail;

/// A parsed signup, ready to be forwarded to the email provider. Lives for a
/// single request.
#[derive(Debug, Clone)]
pub struct SignupRequest {
    pub email: WaitlistEmail,
    pub source: SignupSource,
}
