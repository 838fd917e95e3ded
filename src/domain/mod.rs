mod signup_request;
mod signup_source;
mod waitlist_email;
// allow external `use` statements to skip `waitlist_email` etc
pub use signup_request::SignupRequest;
pub use signup_source::SignupSource;
pub use waitlist_email::EmailRejection;
pub use waitlist_email::WaitlistEmail;
