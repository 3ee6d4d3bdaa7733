//! OAuth login for desktop use
//!
//! The implicit flow hands the access token back in the URL fragment of a
//! redirect to `http://localhost:<port>/`. [`CallbackListener`] serves that
//! redirect and resolves with exactly one [`AuthOutcome`].

pub mod listener;

pub use listener::CallbackListener;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use std::time::Duration;
use thiserror::Error;

/// Login dialog of the implicit OAuth flow
pub const AUTHORIZE_URL: &str = "https://www.facebook.com/dialog/oauth";

/// Login errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The user cancelled or the provider refused
    #[error("Login denied: {0}")]
    Denied(String),

    /// Nobody completed the login in time
    #[error("No login callback received within {0:?}")]
    Timeout(Duration),

    /// The listener stopped before any callback arrived
    #[error("Login listener closed before a callback arrived")]
    Closed,
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Terminal result of one login attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Access token issued
    Token(String),
    /// Login refused, with the provider's reason (e.g. `user_denied`)
    Denied(String),
}

impl AuthOutcome {
    pub fn into_token(self) -> AuthResult<String> {
        match self {
            AuthOutcome::Token(token) => Ok(token),
            AuthOutcome::Denied(reason) => Err(AuthError::Denied(reason)),
        }
    }
}

/// Login dialog URL for `app_id`, redirecting to `redirect_uri`
pub fn login_url(app_id: &str, redirect_uri: &str) -> String {
    format!(
        "{}?client_id={}&redirect_uri={}&response_type=token&display=popup",
        AUTHORIZE_URL,
        utf8_percent_encode(app_id, NON_ALPHANUMERIC),
        utf8_percent_encode(redirect_uri, NON_ALPHANUMERIC),
    )
}
