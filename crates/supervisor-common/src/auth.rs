//! HTTP Basic authentication for the supervisor control API
//!
//! supervisord's `[inet_http_server]` and `[unix_http_server]` sections can
//! require a username and password. When credentials are configured every
//! request carries an `Authorization: Basic ...` header; otherwise no header
//! is sent at all.
//!
//! # Example
//!
//! ```
//! use supervisor_common::auth::Credentials;
//!
//! let credentials = Credentials::new("user", "pass");
//! assert_eq!(credentials.authorization_header(), "Basic dXNlcjpwYXNz");
//! ```

use std::fmt;

use base64::Engine as _;

/// Username/password pair sent with every request.
///
/// Both halves are always present; a client without credentials simply holds
/// no `Credentials` value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Builds credentials only when both parts are given.
    pub fn from_parts(username: Option<String>, password: Option<String>) -> Option<Self> {
        match (username, password) {
            (Some(username), Some(password)) => Some(Self::new(username, password)),
            _ => None,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Value of the `Authorization` header: `Basic base64(username:password)`.
    pub fn authorization_header(&self) -> String {
        let token = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", self.username, self.password));
        format!("Basic {}", token)
    }
}

// Keep the password out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
