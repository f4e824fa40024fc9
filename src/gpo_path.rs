//! GPO Path Resolution
//!
//! Maps a groupPolicyContainer's `cn` (`{GUID}`) onto its folder under the
//! SYSVOL `Policies` root, and derives the `User` / `Machine` sub-folders
//! together with the distinguished names they correspond to in the directory.
//!
//! Everything here is purely syntactic: no file-system access happens until
//! the owner extractor is handed a resolved [`FsPath`].

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::errors::{Result, SysvolError};

/// Win32 `MAX_PATH`, terminator included
pub const MAX_PATH: usize = 260;

/// Separator used when composing SYSVOL paths
pub const PATH_SEPARATOR: char = std::path::MAIN_SEPARATOR;

/// Length of a textual GUID without braces
pub const STR_GUID_LEN: usize = 36;

/// Length of a braced GPO container name: `{` + GUID + `}`
pub const GPO_CONTAINER_NAME_LEN: usize = 1 + STR_GUID_LEN + 1;

/// Length-checked absolute file-system path.
///
/// The content never exceeds `MAX_PATH - 1` UTF-16 units, which is what fits
/// a `MAX_PATH` wide-char buffer with its terminator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct FsPath(String);

impl FsPath {
    /// Wraps `path`, failing with `PathTooLong` when it would not fit `MAX_PATH`.
    pub fn new(path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let len = wide_len(&path);
        if len >= MAX_PATH {
            return Err(SysvolError::PathTooLong {
                path,
                len,
                limit: MAX_PATH - 1,
            });
        }
        Ok(Self(path))
    }

    /// Composes `self + separator + component` under the same length limit.
    pub fn join(&self, component: &str) -> Result<Self> {
        let mut composed = String::with_capacity(self.0.len() + 1 + component.len());
        composed.push_str(&self.0);
        composed.push(PATH_SEPARATOR);
        composed.push_str(component);
        Self::new(composed)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    /// Length in UTF-16 units, the unit `MAX_PATH` is expressed in
    pub fn wide_len(&self) -> usize {
        wide_len(&self.0)
    }
}

impl fmt::Display for FsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<Path> for FsPath {
    fn as_ref(&self) -> &Path {
        self.as_path()
    }
}

fn wide_len(s: &str) -> usize {
    s.encode_utf16().count()
}

/// Returns true when `name` has the `{` + 36 units + `}` shape of a GPO
/// container, counted in UTF-16 units like every other length here. The GUID
/// body itself is not interpreted.
pub fn is_gpo_container_name(name: &str) -> bool {
    let units: Vec<u16> = name.encode_utf16().collect();
    units.len() == GPO_CONTAINER_NAME_LEN
        && units[0] == u16::from(b'{')
        && units[GPO_CONTAINER_NAME_LEN - 1] == u16::from(b'}')
}

/// Resolves the SYSVOL folder of a GPO from its container name.
///
/// Malformed names are rejected before any path is composed.
pub fn resolve_gpo_path(policies_root: &str, container_name: &str) -> Result<FsPath> {
    if !is_gpo_container_name(container_name) {
        return Err(SysvolError::MalformedIdentifier(container_name.to_string()));
    }

    FsPath::new(policies_root)?.join(container_name)
}

/// Standard sub-containers of a GPO folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SubElement {
    User,
    Machine,
}

impl SubElement {
    /// Processing order used by the collector
    pub const ALL: [SubElement; 2] = [SubElement::User, SubElement::Machine];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubElement::User => "User",
            SubElement::Machine => "Machine",
        }
    }
}

impl fmt::Display for SubElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves a sub-folder of a GPO folder.
///
/// When `parent_dn` is given, the sub-folder's directory correlate
/// `CN=<element>,<parent_dn>` is synthesized and returned to the caller; it is
/// not verified against the directory. Without a parent DN the identity is
/// `None`.
pub fn resolve_sub_element(
    element: SubElement,
    parent_path: &FsPath,
    parent_dn: Option<&str>,
) -> Result<(FsPath, Option<String>)> {
    let path = parent_path.join(element.as_str())?;

    let dn = match parent_dn {
        Some(parent_dn) => Some(synthesize_sub_dn(element, parent_dn)?),
        None => None,
    };

    Ok((path, dn))
}

/// Builds `CN=<element>,<parent_dn>` into a buffer reserved at its exact size.
fn synthesize_sub_dn(element: SubElement, parent_dn: &str) -> Result<String> {
    const PREFIX: &str = "CN=";
    let name = element.as_str();
    let len = PREFIX.len() + name.len() + 1 + parent_dn.len();

    let mut dn = String::new();
    dn.try_reserve_exact(len)
        .map_err(|_| SysvolError::AllocationFailure(format!("{}{},{}", PREFIX, name, parent_dn)))?;

    dn.push_str(PREFIX);
    dn.push_str(name);
    dn.push(',');
    dn.push_str(parent_dn);

    Ok(dn)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GPO_CN: &str = "{AAAAAAAA-AAAA-AAAA-AAAA-AAAAAAAAAAAA}";

    fn sep() -> String {
        PATH_SEPARATOR.to_string()
    }

    #[test]
    fn test_container_name_shape() {
        assert!(is_gpo_container_name(GPO_CN));
        assert!(is_gpo_container_name("{31B2F340-016D-11D2-945F-00C04FB984F9}"));

        // wrong length
        assert!(!is_gpo_container_name(""));
        assert!(!is_gpo_container_name("{}"));
        assert!(!is_gpo_container_name("{AAAAAAAA-AAAA-AAAA-AAAA-AAAAAAAAAAA}"));
        assert!(!is_gpo_container_name("{AAAAAAAA-AAAA-AAAA-AAAA-AAAAAAAAAAAAA}"));
        // right length, wrong delimiters
        assert!(!is_gpo_container_name("(AAAAAAAA-AAAA-AAAA-AAAA-AAAAAAAAAAAA)"));
        assert!(!is_gpo_container_name("AAAAAAAAA-AAAA-AAAA-AAAA-AAAAAAAAAAAA}"));
        assert!(!is_gpo_container_name("{AAAAAAAA-AAAA-AAAA-AAAA-AAAAAAAAAAAAA"));
    }

    #[test]
    fn test_container_body_not_interpreted() {
        // Only the delimiters and the length matter
        assert!(is_gpo_container_name("{not a guid but 36 characters long!!!}"));
    }

    #[test]
    fn test_container_length_counts_utf16_units() {
        // U+1F600 is one char but two UTF-16 units
        let wide_body = format!("{{\u{1F600}{}}}", "A".repeat(34));
        assert_eq!(wide_body.chars().count(), 37);
        assert!(is_gpo_container_name(&wide_body));

        let too_wide = format!("{{\u{1F600}{}}}", "A".repeat(35));
        assert_eq!(too_wide.chars().count(), 38);
        assert!(!is_gpo_container_name(&too_wide));
    }

    #[test]
    fn test_resolve_gpo_path() {
        let root = format!("{0}{0}dom{0}Policies", sep());
        let path = resolve_gpo_path(&root, GPO_CN).unwrap();
        assert_eq!(path.as_str(), format!("{}{}{}", root, sep(), GPO_CN));
    }

    #[cfg(windows)]
    #[test]
    fn test_resolve_gpo_path_unc() {
        let path = resolve_gpo_path(r"\\dom\Policies", GPO_CN).unwrap();
        assert_eq!(
            path.as_str(),
            r"\\dom\Policies\{AAAAAAAA-AAAA-AAAA-AAAA-AAAAAAAAAAAA}"
        );
    }

    #[test]
    fn test_resolve_gpo_path_rejects_malformed() {
        for name in ["", "Policies", "{AAAA}", "[AAAAAAAA-AAAA-AAAA-AAAA-AAAAAAAAAAAA]"] {
            let err = resolve_gpo_path("/sysvol/Policies", name).unwrap_err();
            assert!(matches!(err, SysvolError::MalformedIdentifier(ref n) if n == name));
        }
    }

    #[test]
    fn test_resolve_gpo_path_too_long() {
        // 221 + 1 + 38 = 260 units, one more than fits
        let root = "r".repeat(221);
        let err = resolve_gpo_path(&root, GPO_CN).unwrap_err();
        assert!(matches!(err, SysvolError::PathTooLong { len: 260, limit: 259, .. }));

        let root = "r".repeat(220);
        let path = resolve_gpo_path(&root, GPO_CN).unwrap();
        assert_eq!(path.wide_len(), MAX_PATH - 1);
    }

    #[test]
    fn test_path_limit_counts_wide_units() {
        // U+1F512 takes two UTF-16 units
        let wide = "\u{1F512}".repeat(130);
        assert!(FsPath::new(wide).is_err());
        let narrow = "a".repeat(130);
        assert!(FsPath::new(narrow).is_ok());
    }

    #[test]
    fn test_resolve_sub_element_with_identity() {
        let parent = FsPath::new("X").unwrap();
        let (path, dn) =
            resolve_sub_element(SubElement::User, &parent, Some("CN=Foo,DC=x")).unwrap();

        assert_eq!(path.as_str(), format!("X{}User", sep()));
        let dn = dn.unwrap();
        assert_eq!(dn, "CN=User,CN=Foo,DC=x");
        assert!(dn.capacity() >= dn.len());
        assert!(dn.capacity() <= dn.len() + 1);
    }

    #[test]
    fn test_resolve_sub_element_machine() {
        let parent = FsPath::new("X").unwrap();
        let (path, dn) = resolve_sub_element(
            SubElement::Machine,
            &parent,
            Some("CN={31B2F340-016D-11D2-945F-00C04FB984F9},CN=Policies,CN=System,DC=corp,DC=local"),
        )
        .unwrap();

        assert_eq!(path.as_str(), format!("X{}Machine", sep()));
        assert_eq!(
            dn.as_deref(),
            Some("CN=Machine,CN={31B2F340-016D-11D2-945F-00C04FB984F9},CN=Policies,CN=System,DC=corp,DC=local")
        );
    }

    #[test]
    fn test_resolve_sub_element_without_identity() {
        let parent = FsPath::new("X").unwrap();
        let (path, dn) = resolve_sub_element(SubElement::User, &parent, None).unwrap();
        assert_eq!(path.as_str(), format!("X{}User", sep()));
        assert!(dn.is_none());
    }

    #[test]
    fn test_resolve_sub_element_overflow() {
        // parent of 254 units: "\User" reaches 259 and fits, "\Machine" does not
        let parent = FsPath::new("p".repeat(254)).unwrap();
        assert!(resolve_sub_element(SubElement::User, &parent, Some("CN=Foo")).is_ok());

        let err = resolve_sub_element(SubElement::Machine, &parent, Some("CN=Foo")).unwrap_err();
        assert!(matches!(err, SysvolError::PathTooLong { .. }));
    }

    #[test]
    fn test_sub_element_order() {
        assert_eq!(SubElement::ALL, [SubElement::User, SubElement::Machine]);
        assert_eq!(SubElement::Machine.to_string(), "Machine");
    }
}
