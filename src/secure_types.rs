//! Secure Types Module
//!
//! LDAP bind credentials that are zeroed from memory when dropped and never
//! printed, so a `-p` password given on the command line does not end up in
//! the log file.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// A string that zeroes its contents on drop and is redacted when formatted.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecureString {
    inner: String,
}

impl SecureString {
    pub fn new(s: String) -> Self {
        Self { inner: s }
    }

    /// Temporarily exposes the secret.
    ///
    /// # Security
    /// Use the returned reference immediately (e.g. for a bind) and do not store it.
    pub fn expose_secret(&self) -> &str {
        &self.inner
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecureString([REDACTED])")
    }
}

impl fmt::Display for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Simple-bind credentials for the directory connection.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    /// Bind principal, `DOMAIN\user`, a UPN or a DN
    username: String,
    password: SecureString,
}

impl Credentials {
    pub fn new(username: String, password: String) -> Self {
        Self {
            username,
            password: SecureString::new(password),
        }
    }

    /// Builds credentials from optional command-line values.
    ///
    /// A login without password binds with an empty password, which Active
    /// Directory treats as an unauthenticated bind; no login means "use the
    /// integrated identity" and yields `None`.
    pub fn from_options(login: Option<String>, password: Option<String>) -> Option<Self> {
        login.map(|login| Self::new(login, password.unwrap_or_default()))
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// # Security
    /// Use this method only when needed for authentication.
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    pub fn has_password(&self) -> bool {
        !self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl fmt::Display for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credentials(username: {}, password: [REDACTED])", self.username)
    }
}
