//! SYSVOL Owner Collector
//!
//! Per-GPO orchestration: for each groupPolicyContainer returned by the
//! directory, resolve its SYSVOL folder and the `User` / `Machine`
//! sub-folders, read the owner of each and report one `SYSVOL_OWNER` edge
//! per owner found.
//!
//! Every failure is local to the GPO (or to a single edge) and is logged;
//! the enumeration always moves on to the next result.
//!
//! Only the GPO root folder and its two standard sub-folders are examined.
//! Other artifacts that also give control over a GPO (`gpt.ini`,
//! `Registry.pol`, scripts) are not.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::edge_writer::{EdgeWriter, OwnershipEdge};
use crate::errors::SysvolError;
use crate::gpo_path::{resolve_gpo_path, resolve_sub_element, FsPath, SubElement};
use crate::owner::OwnerExtractor;

/// Process-wide SYSVOL settings, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysvolConfig {
    /// Path of the SYSVOL `Policies` folder
    pub policies_root: String,
    /// Read owners through backup semantics (`SeBackupPrivilege`)
    pub use_elevated_read: bool,
    /// Attempt the root edge even when a sub-folder path cannot be composed.
    ///
    /// Off by default: a sub-folder failure then suppresses all three edges
    /// of the GPO, which is the historical output of this collector.
    pub report_root_independently: bool,
}

impl SysvolConfig {
    pub fn new(policies_root: impl Into<String>) -> Self {
        Self {
            policies_root: policies_root.into(),
            use_elevated_read: false,
            report_root_independently: false,
        }
    }
}

/// One GPO as returned by the directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryObjectRef<'a> {
    pub distinguished_name: &'a str,
    /// `cn` of the groupPolicyContainer, `{GUID}`
    pub short_name: &'a str,
}

impl<'a> DirectoryObjectRef<'a> {
    pub fn new(distinguished_name: &'a str, short_name: &'a str) -> Self {
        Self {
            distinguished_name,
            short_name,
        }
    }
}

/// Counters for one collection run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub objects_seen: u64,
    /// Short name malformed, or root path too long
    pub objects_rejected: u64,
    /// A sub-folder path or identity could not be composed
    pub objects_incomplete: u64,
    pub edges_written: u64,
    pub open_failures: u64,
    pub query_failures: u64,
    pub render_failures: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunStats {
    pub fn start(&mut self) {
        self.started_at = Some(Utc::now());
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn edges_skipped(&self) -> u64 {
        self.open_failures + self.query_failures + self.render_failures
    }

    fn record_skipped_edge(&mut self, err: &SysvolError) {
        match err {
            SysvolError::OpenFailed { .. } => self.open_failures += 1,
            SysvolError::QueryFailed { .. } => self.query_failures += 1,
            _ => self.render_failures += 1,
        }
    }
}

/// Drives path resolution, owner extraction and edge output for each GPO.
///
/// The sink is borrowed: the collector never opens nor closes it.
pub struct GpoOwnerCollector<'a, E: OwnerExtractor, W: EdgeWriter> {
    config: &'a SysvolConfig,
    extractor: &'a E,
    sink: &'a mut W,
    stats: RunStats,
}

impl<'a, E: OwnerExtractor, W: EdgeWriter> GpoOwnerCollector<'a, E, W> {
    pub fn new(config: &'a SysvolConfig, extractor: &'a E, sink: &'a mut W) -> Self {
        let mut stats = RunStats::default();
        stats.start();
        Self {
            config,
            extractor,
            sink,
            stats,
        }
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn into_stats(self) -> RunStats {
        self.stats
    }

    /// Handles one directory result and returns the number of edges written.
    ///
    /// Edges are attempted in the order root, `User`, `Machine`.
    pub fn process(&mut self, object: DirectoryObjectRef<'_>) -> usize {
        self.stats.objects_seen += 1;
        let gpo_dn = object.distinguished_name;

        let gpo_path = match resolve_gpo_path(&self.config.policies_root, object.short_name) {
            Ok(path) => path,
            Err(e) => {
                error!("Invalid GPO name <{}> ({}): {}", object.short_name, gpo_dn, e);
                self.stats.objects_rejected += 1;
                return 0;
            }
        };

        let mut written = 0;
        if self.config.report_root_independently {
            written += self.report_owner(&gpo_path, Some(gpo_dn)) as usize;
        }

        let mut resolved = Vec::with_capacity(SubElement::ALL.len());
        for element in SubElement::ALL {
            match resolve_sub_element(element, &gpo_path, Some(gpo_dn)) {
                Ok(sub) => resolved.push(sub),
                Err(e) => {
                    error!(
                        "Failed to format GPO sub element '{}' for <{}>: {}",
                        element, gpo_dn, e
                    );
                    self.stats.objects_incomplete += 1;
                    return written;
                }
            }
        }

        if !self.config.report_root_independently {
            written += self.report_owner(&gpo_path, Some(gpo_dn)) as usize;
        }
        for (path, dn) in &resolved {
            written += self.report_owner(path, dn.as_deref()) as usize;
        }

        debug!("GPO <{}>: {} owner edge(s) written", gpo_dn, written);
        written
    }

    /// Extracts the owner of `path` and writes the edge towards `identity`.
    fn report_owner(&mut self, path: &FsPath, identity: Option<&str>) -> bool {
        let Some(identity) = identity else {
            warn!("No directory correlate for <{}>, skipping owner", path);
            return false;
        };

        let owner = match self.extractor.extract_owner(path) {
            Ok(owner) => owner,
            Err(e) => {
                error!("{}", e);
                self.stats.record_skipped_edge(&e);
                return false;
            }
        };

        let edge = OwnershipEdge::sysvol_owner(path.clone(), identity);
        match self.sink.write_edge(&owner, &edge) {
            Ok(()) => {
                self.stats.edges_written += 1;
                true
            }
            Err(e) => {
                error!("Cannot write owner control relation for <{}>: {}", identity, e);
                self.stats.record_skipped_edge(&e);
                false
            }
        }
    }
}
