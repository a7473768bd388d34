//! Client for account sign-in, sign-up and password reset.

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::{get_messages, operation_failed};
use crate::record::{error_message, message_suffix, parse_body};

/// Minimum password length accepted by the sign-in and reset forms.
pub const MIN_PASSWORD_LEN: usize = 6;

static EMAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+@\S+\.\S+").expect("valid regex"));

/// Authentication errors.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("invalid e-mail address")]
    InvalidEmail,
    #[error("password must have at least 6 characters")]
    PasswordTooShort,
    #[error("name must have at least 2 characters")]
    NameTooShort,
    #[error("reset code is required")]
    MissingCode,
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("HTTP {status}{}", message_suffix(.message))]
    Api { status: u16, message: Option<String> },
    #[error("login response did not contain a token")]
    MissingToken,
}

impl AuthError {
    /// Localised message: field hints for bad input, the generic notice otherwise.
    pub fn user_message(&self, lang: &str) -> String {
        let messages = get_messages(lang);
        match self {
            AuthError::InvalidEmail => messages.invalid_email.to_string(),
            AuthError::PasswordTooShort => messages.password_too_short.to_string(),
            AuthError::NameTooShort => messages.name_too_short.to_string(),
            other => operation_failed(lang, &other.to_string()),
        }
    }
}

/// Signed-in user as returned by `/auth/login`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
    #[serde(rename = "avatarUrl", default)]
    pub avatar_url: Option<String>,
}

impl User {
    /// Name to greet the user with, falling back to the e-mail.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.email)
    }
}

/// Bearer token plus the user it belongs to.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AuthSession {
    pub token: String,
    pub user: User,
}

/// Sign-up form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(rename = "avatarUrl")]
    pub avatar_url: Option<String>,
}

impl NewAccount {
    pub fn new(name: impl Into<String>, email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            email: email.into().trim().to_string(),
            password: password.into(),
            avatar_url: None,
        }
    }

    pub fn with_avatar(mut self, avatar_url: impl Into<String>) -> Self {
        self.avatar_url = Some(avatar_url.into());
        self
    }

    pub fn validate(&self) -> Result<(), AuthError> {
        if self.name.chars().count() < 2 {
            return Err(AuthError::NameTooShort);
        }
        check_email(&self.email)?;
        check_password(&self.password)
    }
}

#[derive(Debug, Deserialize)]
struct ResetRequested {
    #[serde(rename = "devCode", default)]
    dev_code: Option<String>,
}

fn check_email(email: &str) -> Result<(), AuthError> {
    if EMAIL.is_match(email) {
        Ok(())
    } else {
        Err(AuthError::InvalidEmail)
    }
}

fn check_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::PasswordTooShort);
    }
    Ok(())
}

/// Client for `/auth` and `/reset`.
#[derive(Clone)]
pub struct AuthClient {
    base_url: String,
    client: Client,
}

impl AuthClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Sign in and return the bearer token with the user profile.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let email = email.trim();
        check_email(email)?;
        check_password(password)?;

        let body = self
            .send(self.client.post(self.url("/auth/login")).json(&json!({
                "email": email,
                "password": password,
            })))
            .await?;
        let session: AuthSession =
            serde_json::from_value(body).map_err(|_| AuthError::MissingToken)?;
        if session.token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        tracing::info!("Signed in as user #{}", session.user.id);
        Ok(session)
    }

    /// Create an account. The user signs in separately afterwards.
    pub async fn register(&self, account: &NewAccount) -> Result<(), AuthError> {
        account.validate()?;
        self.send(self.client.post(self.url("/auth/register")).json(account))
            .await?;
        tracing::info!("Account created for {}", account.email);
        Ok(())
    }

    /// Ask for a password-reset code.
    ///
    /// The server answers the same way whether or not the address exists.
    /// Development servers include the code, which is returned here.
    pub async fn request_reset(&self, email: &str) -> Result<Option<String>, AuthError> {
        let email = email.trim();
        check_email(email)?;

        let body = self
            .send(self.client.post(self.url("/reset/request")).json(&json!({ "email": email })))
            .await?;
        let requested: ResetRequested =
            serde_json::from_value(body).unwrap_or(ResetRequested { dev_code: None });
        if requested.dev_code.is_some() {
            tracing::debug!("Server returned a development reset code");
        }
        Ok(requested.dev_code)
    }

    /// Set a new password using a reset code.
    pub async fn confirm_reset(&self, email: &str, code: &str, new_password: &str) -> Result<(), AuthError> {
        let email = email.trim();
        let code = code.trim();
        check_email(email)?;
        if code.is_empty() {
            return Err(AuthError::MissingCode);
        }
        check_password(new_password)?;

        self.send(self.client.post(self.url("/reset/confirm")).json(&json!({
            "email": email,
            "code": code,
            "newPassword": new_password,
        })))
        .await?;
        tracing::info!("Password reset confirmed for {}", email);
        Ok(())
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, AuthError> {
        let response = request.send().await?;
        let status = response.status();
        let body = parse_body(&response.text().await?);

        if !status.is_success() {
            tracing::warn!("Auth request failed with HTTP {}", status.as_u16());
            return Err(AuthError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        Ok(body)
    }
}
