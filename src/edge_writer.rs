//! Control Relation Output
//!
//! Renders owners to text and appends one tab-separated record per ownership
//! edge:
//!
//! ```text
//! relation        owner                   subject
//! SYSVOL_OWNER    CORP\Domain Admins      CN={31B2F340-...},CN=Policies,CN=System,DC=corp,DC=local
//! ```
//!
//! The owner column carries the resolved account name when the SID can be
//! looked up, otherwise the SID string.

use std::io::Write;

use serde::Serialize;

use crate::errors::{Result, SysvolError};
use crate::gpo_path::FsPath;
use crate::owner::OwnerDescriptor;
use crate::sid_utils::{sid_to_string, unix_user_sid};

/// Relation keyword for SYSVOL ownership edges
pub const CONTROL_SYSVOL_OWNER_KEYWORD: &str = "SYSVOL_OWNER";

/// Column header of the TSV output
pub const TSV_HEADER: &str = "relation\towner\tsubject";

/// One ownership fact: whoever owns `subject_path` controls `object_identity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnershipEdge {
    pub subject_path: FsPath,
    pub object_identity: String,
    pub relation_keyword: &'static str,
}

impl OwnershipEdge {
    pub fn sysvol_owner(subject_path: FsPath, object_identity: impl Into<String>) -> Self {
        Self {
            subject_path,
            object_identity: object_identity.into(),
            relation_keyword: CONTROL_SYSVOL_OWNER_KEYWORD,
        }
    }
}

/// Sink for ownership edges
pub trait EdgeWriter {
    /// Renders `owner` and appends one record for `edge`.
    fn write_edge(&mut self, owner: &OwnerDescriptor, edge: &OwnershipEdge) -> Result<()>;
}

#[cfg(windows)]
mod windows_impl {
    use windows::core::{PCWSTR, PWSTR};
    use windows::Win32::Security::{LookupAccountSidW, PSID, SID_NAME_USE};

    /// Resolves a binary SID to `DOMAIN\name`
    pub(super) fn lookup_account(sid: &[u8]) -> Option<String> {
        let psid = PSID(sid.as_ptr() as *mut _);
        let mut name_len = 0u32;
        let mut domain_len = 0u32;
        let mut sid_use = SID_NAME_USE::default();

        // First call only reports the buffer sizes
        unsafe {
            let _ = LookupAccountSidW(
                PCWSTR::null(),
                psid,
                PWSTR::null(),
                &mut name_len,
                PWSTR::null(),
                &mut domain_len,
                &mut sid_use,
            );
        }
        if name_len == 0 {
            return None;
        }

        let mut name = vec![0u16; name_len as usize];
        let mut domain = vec![0u16; domain_len.max(1) as usize];
        unsafe {
            LookupAccountSidW(
                PCWSTR::null(),
                psid,
                PWSTR(name.as_mut_ptr()),
                &mut name_len,
                PWSTR(domain.as_mut_ptr()),
                &mut domain_len,
                &mut sid_use,
            )
        }
        .ok()?;

        let name = String::from_utf16_lossy(&name[..name_len as usize]);
        let domain = String::from_utf16_lossy(&domain[..domain_len as usize]);
        if domain.is_empty() {
            Some(name)
        } else {
            Some(format!("{}\\{}", domain, name))
        }
    }
}

/// Textual form of an owner: account name when resolvable, SID otherwise.
pub fn render_owner(owner: &OwnerDescriptor) -> std::result::Result<String, String> {
    match owner {
        OwnerDescriptor::Sid(sid) => {
            #[cfg(windows)]
            {
                if let Some(account) = windows_impl::lookup_account(sid) {
                    return Ok(account);
                }
            }
            sid_to_string(sid)
        }
        OwnerDescriptor::UnixUid(uid) => Ok(unix_user_sid(*uid)),
    }
}

/// Keeps a field on a single TSV cell
fn sanitize_field(field: &str) -> String {
    field
        .chars()
        .map(|c| if matches!(c, '\t' | '\r' | '\n') { ' ' } else { c })
        .collect()
}

/// Writes edges as tab-separated records to any `Write` sink.
pub struct TsvEdgeWriter<W: Write> {
    out: W,
    records: u64,
}

impl<W: Write> TsvEdgeWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, records: 0 }
    }

    /// Creates the writer and emits the column header first.
    pub fn with_header(mut out: W) -> Result<Self> {
        writeln!(out, "{}", TSV_HEADER)?;
        Ok(Self::new(out))
    }

    pub fn records_written(&self) -> u64 {
        self.records
    }

    /// Flushes and hands the sink back.
    pub fn finish(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

impl<W: Write> EdgeWriter for TsvEdgeWriter<W> {
    fn write_edge(&mut self, owner: &OwnerDescriptor, edge: &OwnershipEdge) -> Result<()> {
        let render_failure = |reason: String| SysvolError::RenderFailure {
            identity: edge.object_identity.clone(),
            reason,
        };

        let owner = render_owner(owner).map_err(render_failure)?;

        writeln!(
            self.out,
            "{}\t{}\t{}",
            edge.relation_keyword,
            sanitize_field(&owner),
            sanitize_field(&edge.object_identity)
        )
        .map_err(|e| render_failure(e.to_string()))?;

        self.records += 1;
        Ok(())
    }
}
