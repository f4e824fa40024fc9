//! Owner Extraction
//!
//! Reads the owner component of a SYSVOL object's security descriptor.
//!
//! On Windows the owner SID is read with `GetNamedSecurityInfoW`, or, when
//! elevated read is configured, through a handle opened with backup semantics
//! so that an enabled `SeBackupPrivilege` bypasses the DACL. Only the owner
//! is requested, never the full ACL.
//!
//! On other platforms (SYSVOL mounted over CIFS, replicated copies) the owner
//! is the file's uid.

use tracing::debug;

use crate::errors::{Result, SysvolError};
use crate::gpo_path::FsPath;

/// Owner of a file-system object, as read from its security metadata.
///
/// Opaque to the collector; turned into text by the edge writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerDescriptor {
    /// Binary SID (MS-DTYP 2.4.2)
    Sid(Vec<u8>),
    /// Unix uid
    UnixUid(u32),
}

/// Source of owner information for resolved SYSVOL paths
pub trait OwnerExtractor {
    fn extract_owner(&self, path: &FsPath) -> Result<OwnerDescriptor>;
}

/// Reads owners from the local file system
#[derive(Debug, Clone, Copy, Default)]
pub struct FsOwnerExtractor {
    use_elevated_read: bool,
}

impl FsOwnerExtractor {
    pub fn new(use_elevated_read: bool) -> Self {
        Self { use_elevated_read }
    }
}

impl OwnerExtractor for FsOwnerExtractor {
    fn extract_owner(&self, path: &FsPath) -> Result<OwnerDescriptor> {
        debug!("Reading owner of <{}> (elevated: {})", path, self.use_elevated_read);
        read_owner(path, self.use_elevated_read)
    }
}

#[cfg(windows)]
mod windows_impl {
    use super::*;
    use windows::core::HSTRING;
    use windows::Win32::Foundation::{
        CloseHandle, LocalFree, ERROR_ACCESS_DENIED, ERROR_BAD_NETPATH, ERROR_BAD_NET_NAME,
        ERROR_FILE_NOT_FOUND, ERROR_INVALID_NAME, ERROR_PATH_NOT_FOUND, ERROR_SHARING_VIOLATION,
        ERROR_SUCCESS, HANDLE, HLOCAL, WIN32_ERROR,
    };
    use windows::Win32::Security::Authorization::{
        GetNamedSecurityInfoW, GetSecurityInfo, SE_FILE_OBJECT,
    };
    use windows::Win32::Security::{
        GetLengthSid, IsValidSid, OWNER_SECURITY_INFORMATION, PSECURITY_DESCRIPTOR, PSID,
    };
    use windows::Win32::Storage::FileSystem::{
        CreateFileW, FILE_FLAG_BACKUP_SEMANTICS, FILE_SHARE_DELETE, FILE_SHARE_READ,
        FILE_SHARE_WRITE, OPEN_EXISTING, READ_CONTROL,
    };

    /// Win32 error code carried by an HRESULT built from it
    fn win32_code(err: &windows::core::Error) -> u32 {
        (err.code().0 as u32) & 0xFFFF
    }

    /// Codes for which the object itself could not be reached
    fn is_open_failure(status: WIN32_ERROR) -> bool {
        [
            ERROR_FILE_NOT_FOUND,
            ERROR_PATH_NOT_FOUND,
            ERROR_ACCESS_DENIED,
            ERROR_BAD_NETPATH,
            ERROR_BAD_NET_NAME,
            ERROR_INVALID_NAME,
            ERROR_SHARING_VIOLATION,
        ]
        .contains(&status)
    }

    pub(super) fn read_owner(path: &FsPath, elevated: bool) -> Result<OwnerDescriptor> {
        let wide = HSTRING::from(path.as_str());
        let mut owner = PSID::default();
        let mut sd = PSECURITY_DESCRIPTOR::default();

        let status = if elevated {
            let handle = unsafe {
                CreateFileW(
                    &wide,
                    READ_CONTROL.0,
                    FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE,
                    None,
                    OPEN_EXISTING,
                    FILE_FLAG_BACKUP_SEMANTICS,
                    HANDLE::default(),
                )
            }
            .map_err(|e| SysvolError::OpenFailed {
                path: path.to_string(),
                code: win32_code(&e),
            })?;

            let status = unsafe {
                GetSecurityInfo(
                    handle,
                    SE_FILE_OBJECT,
                    OWNER_SECURITY_INFORMATION,
                    Some(&mut owner as *mut _),
                    None,
                    None,
                    None,
                    Some(&mut sd as *mut _),
                )
            };
            unsafe {
                let _ = CloseHandle(handle);
            }
            status
        } else {
            let status = unsafe {
                GetNamedSecurityInfoW(
                    &wide,
                    SE_FILE_OBJECT,
                    OWNER_SECURITY_INFORMATION,
                    Some(&mut owner as *mut _),
                    None,
                    None,
                    None,
                    Some(&mut sd as *mut _),
                )
            };
            if is_open_failure(status) {
                return Err(SysvolError::OpenFailed {
                    path: path.to_string(),
                    code: status.0,
                });
            }
            status
        };

        if status != ERROR_SUCCESS {
            return Err(SysvolError::QueryFailed {
                path: path.to_string(),
                code: status.0,
            });
        }

        // `owner` points into `sd`; copy it out before releasing the descriptor
        let sid = unsafe {
            if owner.0.is_null() || !IsValidSid(owner).as_bool() {
                None
            } else {
                let len = GetLengthSid(owner) as usize;
                Some(std::slice::from_raw_parts(owner.0 as *const u8, len).to_vec())
            }
        };

        unsafe {
            let _ = LocalFree(HLOCAL(sd.0));
        }

        sid.map(OwnerDescriptor::Sid).ok_or_else(|| SysvolError::QueryFailed {
            path: path.to_string(),
            code: windows::Win32::Foundation::ERROR_INVALID_SID.0,
        })
    }
}

#[cfg(windows)]
use windows_impl::read_owner;

#[cfg(unix)]
fn read_owner(path: &FsPath, _elevated: bool) -> Result<OwnerDescriptor> {
    use std::os::unix::fs::MetadataExt;

    // The privilege helper refuses elevated read outside Windows, so the flag
    // never reaches this point set.
    let metadata = std::fs::metadata(path.as_path()).map_err(|e| SysvolError::OpenFailed {
        path: path.to_string(),
        code: e.raw_os_error().unwrap_or(0) as u32,
    })?;

    Ok(OwnerDescriptor::UnixUid(metadata.uid()))
}

#[cfg(not(any(unix, windows)))]
fn read_owner(path: &FsPath, _elevated: bool) -> Result<OwnerDescriptor> {
    std::fs::metadata(path.as_path()).map_err(|e| SysvolError::OpenFailed {
        path: path.to_string(),
        code: e.raw_os_error().unwrap_or(0) as u32,
    })?;

    Err(SysvolError::QueryFailed {
        path: path.to_string(),
        code: 0,
    })
}
