//! Error handling module
//!
//! Structured error types for the SYSVOL owner collector. Every failure the
//! per-object pipeline can hit has its own variant so the orchestrator can log
//! it precisely and decide whether to skip one edge or the whole object.

use thiserror::Error;

/// Main error type for the collector
#[derive(Error, Debug)]
pub enum SysvolError {
    /// The GPO short name is not a `{GUID}` container identifier
    #[error("Malformed GPO identifier <{0}>")]
    MalformedIdentifier(String),

    /// A composed path does not fit the platform path limit
    #[error("Path too long ({len} units, limit {limit}): {path}")]
    PathTooLong {
        path: String,
        len: usize,
        limit: usize,
    },

    /// Storage for a synthesized identity could not be obtained
    #[error("Unable to allocate identity string for <{0}>")]
    AllocationFailure(String),

    /// The file-system object could not be opened
    #[error("Cannot open file <{path}> : <{code}>")]
    OpenFailed { path: String, code: u32 },

    /// The owner could not be read from the security descriptor
    #[error("Cannot get security information for <{path}> : <{code}>")]
    QueryFailed { path: String, code: u32 },

    /// The owner record could not be rendered or written
    #[error("Cannot write owner control relation for <{identity}>: {reason}")]
    RenderFailure { identity: String, reason: String },

    /// The requested OS privilege could not be enabled
    #[error("Cannot enable privilege {name} for the current process: {reason}")]
    PrivilegeUnavailable { name: String, reason: String },

    /// LDAP connection error
    #[error("LDAP connection failed: {0}")]
    ConnectionError(String),

    /// LDAP query/search error
    #[error("LDAP query failed: {0}")]
    QueryError(String),

    /// Authentication error
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Output sink error
    #[error("Output error: {0}")]
    OutputError(String),
}

impl SysvolError {
    /// Only a missing privilege that the operator explicitly asked for stops
    /// the run; everything else is skipped and logged.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SysvolError::PrivilegeUnavailable { .. })
    }
}

impl From<ldap3::LdapError> for SysvolError {
    fn from(err: ldap3::LdapError) -> Self {
        match err {
            ldap3::LdapError::LdapResult { result } => {
                match result.rc {
                    // 49 = Invalid credentials
                    49 => SysvolError::AuthError(format!(
                        "Invalid credentials: {}",
                        result.text
                    )),
                    // 32 = No such object
                    32 => SysvolError::NotFound(format!(
                        "Object not found: {}",
                        result.text
                    )),
                    // 50 = Insufficient access rights
                    50 => SysvolError::PermissionDenied(format!(
                        "Insufficient access rights: {}",
                        result.text
                    )),
                    // 51 = Busy
                    51 => SysvolError::Timeout(format!(
                        "Server is busy: {}",
                        result.text
                    )),
                    // 52 = Unavailable
                    52 => SysvolError::ConnectionError(format!(
                        "Server unavailable: {}",
                        result.text
                    )),
                    // 53 = Unwilling to perform
                    53 => SysvolError::PermissionDenied(format!(
                        "Server unwilling to perform operation: {}",
                        result.text
                    )),
                    _ => SysvolError::QueryError(format!(
                        "LDAP error code {}: {}",
                        result.rc, result.text
                    )),
                }
            }
            ldap3::LdapError::EndOfStream => {
                SysvolError::ConnectionError("Connection closed unexpectedly".to_string())
            }
            ldap3::LdapError::Io { source } => {
                SysvolError::ConnectionError(format!("I/O error: {}", source))
            }
            ldap3::LdapError::Timeout { elapsed: _ } => {
                SysvolError::Timeout("LDAP operation timed out".to_string())
            }
            _ => SysvolError::QueryError(format!("LDAP error: {}", err)),
        }
    }
}

impl From<std::io::Error> for SysvolError {
    fn from(err: std::io::Error) -> Self {
        SysvolError::OutputError(format!("I/O error: {}", err))
    }
}

/// Result type alias for collector operations
pub type Result<T> = std::result::Result<T, SysvolError>;
