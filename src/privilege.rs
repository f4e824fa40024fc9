//! Process privilege elevation
//!
//! Enables a named privilege (e.g. `SeBackupPrivilege`) in the current
//! process token. Called once at startup, before any SYSVOL access.

use tracing::info;

use crate::errors::{Result, SysvolError};

/// Privilege granting read access regardless of DACLs
pub const SE_BACKUP_NAME: &str = "SeBackupPrivilege";

#[cfg(windows)]
mod windows_impl {
    use super::*;
    use windows::core::{HSTRING, PCWSTR};
    use windows::Win32::Foundation::{
        CloseHandle, GetLastError, ERROR_NOT_ALL_ASSIGNED, FALSE, HANDLE, LUID,
    };
    use windows::Win32::Security::{
        AdjustTokenPrivileges, LookupPrivilegeValueW, LUID_AND_ATTRIBUTES,
        SE_PRIVILEGE_ENABLED, TOKEN_ADJUST_PRIVILEGES, TOKEN_PRIVILEGES, TOKEN_QUERY,
    };
    use windows::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};

    pub(super) fn enable(name: &str) -> Result<()> {
        let unavailable = |reason: String| SysvolError::PrivilegeUnavailable {
            name: name.to_string(),
            reason,
        };

        let mut token = HANDLE::default();
        unsafe {
            OpenProcessToken(
                GetCurrentProcess(),
                TOKEN_ADJUST_PRIVILEGES | TOKEN_QUERY,
                &mut token,
            )
        }
        .map_err(|e| unavailable(format!("OpenProcessToken failed: {}", e)))?;

        let result = (|| {
            let mut luid = LUID::default();
            unsafe { LookupPrivilegeValueW(PCWSTR::null(), &HSTRING::from(name), &mut luid) }
                .map_err(|e| unavailable(format!("LookupPrivilegeValueW failed: {}", e)))?;

            let privileges = TOKEN_PRIVILEGES {
                PrivilegeCount: 1,
                Privileges: [LUID_AND_ATTRIBUTES {
                    Luid: luid,
                    Attributes: SE_PRIVILEGE_ENABLED,
                }],
            };

            unsafe { AdjustTokenPrivileges(token, FALSE, Some(&privileges as *const _), 0, None, None) }
                .map_err(|e| unavailable(format!("AdjustTokenPrivileges failed: {}", e)))?;

            // AdjustTokenPrivileges succeeds even when the token does not hold the privilege
            if unsafe { GetLastError() } == ERROR_NOT_ALL_ASSIGNED {
                return Err(unavailable("privilege not held by the current token".to_string()));
            }
            Ok(())
        })();

        unsafe {
            let _ = CloseHandle(token);
        }
        result
    }
}

/// Enables `name` for the current process.
///
/// Fails with `PrivilegeUnavailable` when the token does not hold the
/// privilege, and always outside Windows.
pub fn enable_privilege(name: &str) -> Result<()> {
    #[cfg(windows)]
    {
        windows_impl::enable(name)?;
        info!("Enabled {} for the current process", name);
        Ok(())
    }

    #[cfg(not(windows))]
    {
        info!("Privilege {} requested on a platform without token privileges", name);
        Err(SysvolError::PrivilegeUnavailable {
            name: name.to_string(),
            reason: "token privileges are only available on Windows".to_string(),
        })
    }
}
