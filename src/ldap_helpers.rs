//! LDAP Helper Utilities
//!
//! Attribute extraction helpers for search results, plus the attribute
//! names and filters used by the collector.

use ldap3::SearchEntry;

/// Extension trait for SearchEntry to simplify attribute extraction
pub trait SearchEntryExt {
    /// Get an optional string attribute (returns None if missing)
    fn get_optional_attr(&self, name: &str) -> Option<String>;
}

impl SearchEntryExt for SearchEntry {
    fn get_optional_attr(&self, name: &str) -> Option<String> {
        self.attrs
            .get(name)
            .and_then(|v| v.first())
            .cloned()
    }
}

/// LDAP attribute name constants
pub mod attrs {
    pub const COMMON_NAME: &str = "cn";
    pub const DEFAULT_NAMING_CONTEXT: &str = "defaultNamingContext";
}

/// LDAP filter patterns
pub mod filters {
    /// Group Policy containers
    pub const GPO: &str = "(objectClass=groupPolicyContainer)";

    /// Any object, used for base-scope reads such as the RootDSE
    pub const ANY: &str = "(objectClass=*)";
}
