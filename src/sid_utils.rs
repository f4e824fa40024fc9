//! SID Utilities
//!
//! Textual rendering of security identifiers (MS-DTYP 2.4.2) for owners read
//! from SYSVOL security descriptors.

/// Samba's identifier authority for Unix users, `S-1-22-1-<uid>`
pub const UNIX_USER_SID_PREFIX: &str = "S-1-22-1";

/// Convert a binary SID to string format (S-1-5-21-...)
///
/// # Format (MS-DTYP 2.4.2):
/// ```text
/// Offset  Size  Field
/// 0       1     Revision
/// 1       1     SubAuthorityCount
/// 2       6     IdentifierAuthority
/// 8       4*N   SubAuthorities (N = SubAuthorityCount)
/// ```
pub fn sid_to_string(bytes: &[u8]) -> Result<String, String> {
    if bytes.len() < 8 {
        return Err("SID too short (minimum 8 bytes)".to_string());
    }

    let revision = bytes[0];
    let sub_auth_count = bytes[1] as usize;

    if bytes.len() < 8 + (sub_auth_count * 4) {
        return Err(format!(
            "SID data insufficient for {} sub-authorities",
            sub_auth_count
        ));
    }

    // 48-bit identifier authority (big-endian)
    let id_auth = u64::from_be_bytes([
        0,
        0,
        bytes[2],
        bytes[3],
        bytes[4],
        bytes[5],
        bytes[6],
        bytes[7],
    ]);

    let mut sid = format!("S-{}-{}", revision, id_auth);

    // Sub-authorities (little-endian)
    for chunk in bytes[8..8 + sub_auth_count * 4].chunks_exact(4) {
        let sub_auth = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        sid.push_str(&format!("-{}", sub_auth));
    }

    Ok(sid)
}

/// SID under which Samba exposes a Unix uid
pub fn unix_user_sid(uid: u32) -> String {
    format!("{}-{}", UNIX_USER_SID_PREFIX, uid)
}
