//! Accounts: sign-in, sign-up and password reset.

mod client;

pub use client::{AuthClient, AuthError, AuthSession, NewAccount, User, MIN_PASSWORD_LEN};
