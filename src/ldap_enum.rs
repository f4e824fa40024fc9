//! Directory enumeration
//!
//! Connects to a domain controller and walks every object matching a filter,
//! handing each one to a callback as soon as its page arrives. Large domains
//! routinely hold more GPOs than the default 1000-entry size limit, so the
//! search always uses the Simple Paged Results control.
//!
//! All calls are synchronous (`ldap3::LdapConn`); the collector processes
//! results strictly one at a time.

use std::time::Duration;

use ldap3::controls::{ControlParser, PagedResults};
use ldap3::{LdapConn, LdapConnSettings, Scope, SearchEntry};
use tracing::{debug, info, warn};

use crate::collector::DirectoryObjectRef;
use crate::errors::{Result, SysvolError};
use crate::ldap_helpers::{attrs, filters, SearchEntryExt};
use crate::secure_types::Credentials;

/// Default connection and operation timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default page size for paged searches
pub const DEFAULT_PAGE_SIZE: i32 = 500;

/// Simple Paged Results control
pub const PAGED_RESULTS_OID: &str = "1.2.840.113556.1.4.319";

pub const LDAP_PORT: u16 = 389;
pub const LDAPS_PORT: u16 = 636;

/// Directory connection settings
#[derive(Debug, Clone)]
pub struct LdapConfig {
    /// Domain controller host name or address
    pub server: String,
    pub port: Option<u16>,
    pub use_tls: bool,
    /// Search base; read from the RootDSE when absent
    pub base_dn: Option<String>,
    /// Simple-bind credentials; integrated authentication when absent
    pub credentials: Option<Credentials>,
    pub timeout: Duration,
    pub page_size: i32,
}

impl LdapConfig {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            port: None,
            use_tls: false,
            base_dn: None,
            credentials: None,
            timeout: DEFAULT_TIMEOUT,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Host part of `server`, without any scheme or port
    pub fn host(&self) -> &str {
        let host = self
            .server
            .trim_start_matches("ldaps://")
            .trim_start_matches("ldap://");
        host.split(':').next().unwrap_or(host)
    }

    /// Connection URL. `ldaps://` in `server` or port 636 imply TLS.
    pub fn url(&self) -> String {
        let explicit_port = self
            .server
            .rsplit_once(':')
            .and_then(|(_, port)| port.parse::<u16>().ok());
        let port = self.port.or(explicit_port);
        let use_tls =
            self.use_tls || self.server.starts_with("ldaps://") || port == Some(LDAPS_PORT);
        let port = port.unwrap_or(if use_tls { LDAPS_PORT } else { LDAP_PORT });

        let scheme = if use_tls { "ldaps" } else { "ldap" };
        format!("{}://{}:{}", scheme, self.host(), port)
    }
}

/// Source of directory objects for the collector
pub trait DirectoryEnumerator {
    /// Calls `callback` once per object matching `filter`, passing its DN and
    /// the first value of `short_name_attr`. Returns the number of objects
    /// handed to the callback.
    fn for_each_object(
        &mut self,
        filter: &str,
        short_name_attr: &str,
        callback: &mut dyn FnMut(DirectoryObjectRef<'_>),
    ) -> Result<u64>;
}

/// Paged enumeration over a synchronous LDAP connection
pub struct LdapEnumerator {
    ldap: LdapConn,
    base_dn: String,
    timeout: Duration,
    page_size: i32,
}

impl LdapEnumerator {
    /// Connects, binds and settles the search base.
    ///
    /// TLS certificate verification is disabled to support enterprise
    /// environments with internal CAs.
    pub fn connect(config: &LdapConfig) -> Result<Self> {
        let url = config.url();
        info!("Connecting to LDAP server: {}", url);

        let settings = LdapConnSettings::new()
            .set_conn_timeout(config.timeout)
            .set_no_tls_verify(true);
        let mut ldap = LdapConn::with_settings(settings, &url).map_err(|e| {
            SysvolError::ConnectionError(format!("Failed to connect to {}: {}", url, e))
        })?;

        bind(&mut ldap, config)?;

        let base_dn = match &config.base_dn {
            Some(base_dn) => base_dn.clone(),
            None => discover_base_dn(&mut ldap, config.timeout)?,
        };
        info!("Successfully connected to {}, search base <{}>", url, base_dn);

        Ok(Self {
            ldap,
            base_dn,
            timeout: config.timeout,
            page_size: config.page_size,
        })
    }

    pub fn unbind(mut self) -> Result<()> {
        self.ldap.unbind()?;
        Ok(())
    }
}

fn bind(ldap: &mut LdapConn, config: &LdapConfig) -> Result<()> {
    match &config.credentials {
        Some(credentials) => {
            info!("Simple bind as {}", credentials.username());
            if !credentials.has_password() {
                warn!("Binding with an empty password; the server may treat it as anonymous");
            }
            ldap.with_timeout(config.timeout)
                .simple_bind(credentials.username(), credentials.password())?
                .success()
                .map_err(|e| SysvolError::AuthError(format!("Simple bind rejected: {}", e)))?;
        }
        None => bind_integrated(ldap, config)?,
    }
    Ok(())
}

/// GSSAPI/Kerberos bind with the current Windows logon
#[cfg(windows)]
fn bind_integrated(ldap: &mut LdapConn, config: &LdapConfig) -> Result<()> {
    info!("GSSAPI bind (SPN: ldap/{})", config.host());
    ldap.sasl_gssapi_bind(config.host())?
        .success()
        .map_err(|e| SysvolError::AuthError(format!("GSSAPI bind rejected: {}", e)))?;
    Ok(())
}

#[cfg(not(windows))]
fn bind_integrated(ldap: &mut LdapConn, config: &LdapConfig) -> Result<()> {
    warn!("No credentials supplied, binding anonymously - access will be limited");
    ldap.with_timeout(config.timeout)
        .simple_bind("", "")?
        .success()
        .map_err(|e| SysvolError::AuthError(format!("Anonymous bind rejected: {}", e)))?;
    Ok(())
}

/// Reads `defaultNamingContext` from the RootDSE
fn discover_base_dn(ldap: &mut LdapConn, timeout: Duration) -> Result<String> {
    let (entries, _res) = ldap
        .with_timeout(timeout)
        .search("", Scope::Base, filters::ANY, vec![attrs::DEFAULT_NAMING_CONTEXT])?
        .success()?;

    entries
        .into_iter()
        .next()
        .map(SearchEntry::construct)
        .and_then(|entry| entry.get_optional_attr(attrs::DEFAULT_NAMING_CONTEXT))
        .ok_or_else(|| {
            SysvolError::ConfigError(
                "RootDSE does not expose defaultNamingContext; pass the base DN explicitly"
                    .to_string(),
            )
        })
}

impl DirectoryEnumerator for LdapEnumerator {
    fn for_each_object(
        &mut self,
        filter: &str,
        short_name_attr: &str,
        callback: &mut dyn FnMut(DirectoryObjectRef<'_>),
    ) -> Result<u64> {
        info!(
            "Starting paged search in {} with filter {} (page_size: {})",
            self.base_dn, filter, self.page_size
        );

        let mut cookie: Vec<u8> = Vec::new();
        let mut page_count = 0u32;
        let mut visited = 0u64;

        loop {
            page_count += 1;

            let paged_control = PagedResults {
                size: self.page_size,
                cookie: cookie.clone(),
            };

            let result = self
                .ldap
                .with_timeout(self.timeout)
                .with_controls(vec![paged_control.into()])
                .search(&self.base_dn, Scope::Subtree, filter, vec![short_name_attr])?;

            let entries = result.0;
            let ldap_result = result.1;

            // rc=4 is sizeLimitExceeded - keep the partial page
            match ldap_result.rc {
                0 => {}
                4 => warn!(
                    "Size limit exceeded on page {}, continuing with {} partial entries",
                    page_count,
                    entries.len()
                ),
                rc => {
                    return Err(SysvolError::QueryError(format!(
                        "LDAP paged search failed: rc={}, text={}",
                        rc, ldap_result.text
                    )))
                }
            }

            debug!("Page {} returned {} entries", page_count, entries.len());

            for entry in entries {
                let entry = SearchEntry::construct(entry);
                match entry.get_optional_attr(short_name_attr) {
                    Some(short_name) => {
                        visited += 1;
                        callback(DirectoryObjectRef::new(&entry.dn, &short_name));
                    }
                    None => warn!(
                        "Entry <{}> has no '{}' attribute, skipping",
                        entry.dn, short_name_attr
                    ),
                }
            }

            let mut has_more_pages = false;
            for ctrl in &ldap_result.ctrls {
                let raw_ctrl = &ctrl.1;
                if raw_ctrl.ctype == PAGED_RESULTS_OID {
                    if let Some(ref val) = raw_ctrl.val {
                        let pr: PagedResults = PagedResults::parse(val);
                        cookie = pr.cookie;
                        has_more_pages = !cookie.is_empty();
                    }
                    break;
                }
            }

            if !has_more_pages {
                info!(
                    "Paged search completed: {} pages, {} objects",
                    page_count, visited
                );
                break;
            }
        }

        Ok(visited)
    }
}
