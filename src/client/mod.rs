//! Client side of `POST /api/waitlist`: the transport with retry/backoff, the
//! error taxonomy shown to users, and the per-form submission state machine.

mod errors;
mod feedback;
mod form;
mod transport;

pub use errors::*;
pub use feedback::*;
pub use form::*;
pub use transport::*;
