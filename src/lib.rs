//! Waitlist signup service: a single `POST /api/waitlist` endpoint that
//! validates an email, rate-limits by client ip, and forwards the signup to an
//! email marketing provider (Mailchimp or ConvertKit).
//!
//! `client` is the other end of the wire: the form controller that the
//! landing page runs, with validation, timeouts and retries.

pub mod client;
pub mod configuration;
pub mod domain;
pub mod email_service;
pub mod rate_limit;
pub mod routes;
pub mod startup;
pub mod telemetry;
pub mod utils;
