//! Catch records and the submission API.

mod client;
mod form;

pub(crate) use client::{error_message, message_suffix, parse_body};
pub use client::{RecordClient, RecordError};
pub use form::{CatchRecord, FormError};
