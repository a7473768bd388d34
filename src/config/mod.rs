//! Configuration module: localised messages and form options.

mod i18n;
pub mod options;

pub use i18n::{get_messages, operation_failed, Messages, MESSAGES_EN, MESSAGES_PT};
