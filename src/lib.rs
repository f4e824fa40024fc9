//! SYSVOL owner control relations
//!
//! For every Group Policy container in Active Directory, reads the owner of
//! the GPO folder in SYSVOL and of its `User` and `Machine` sub-folders and
//! reports each owner as controlling the corresponding directory object.

pub mod cli;
pub mod collector;
pub mod edge_writer;
pub mod errors;
pub mod gpo_path;
pub mod ldap_enum;
pub mod ldap_helpers;
pub mod owner;
pub mod privilege;
pub mod secure_types;
pub mod sid_utils;

pub use collector::{DirectoryObjectRef, GpoOwnerCollector, RunStats, SysvolConfig};
pub use edge_writer::{EdgeWriter, OwnershipEdge, TsvEdgeWriter, CONTROL_SYSVOL_OWNER_KEYWORD};
pub use errors::{Result, SysvolError};
pub use gpo_path::{FsPath, SubElement};
pub use ldap_enum::{DirectoryEnumerator, LdapConfig, LdapEnumerator};
pub use owner::{FsOwnerExtractor, OwnerDescriptor, OwnerExtractor};
