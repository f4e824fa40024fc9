//! Command line surface
//!
//! Options are grouped the way the collector uses them: directory connection,
//! general output, and SYSVOL. Tokens that none of them recognizes are dropped
//! before parsing so that a shared command line (the same arguments handed to
//! several collectors) does not abort this one.

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use clap::{CommandFactory, Parser};

use crate::collector::SysvolConfig;
use crate::errors::{Result, SysvolError};
use crate::ldap_enum::{LdapConfig, DEFAULT_PAGE_SIZE};
use crate::secure_types::Credentials;

pub const DEFAULT_OUTFILE: &str = "control.sysvol.owner.tsv";

#[derive(Parser, Debug)]
#[command(
    name = "sysvol-control",
    version,
    about = "Reports the owners of GPO folders in SYSVOL as control relations"
)]
pub struct Cli {
    #[arg(short = 's', long, help_heading = "LDAP options", help = "Domain controller to query (defaults to the logon server)")]
    pub server: Option<String>,
    #[arg(short = 'n', long, help_heading = "LDAP options", help = "LDAP port (389, or 636 with --ldaps)")]
    pub port: Option<u16>,
    #[arg(long, help_heading = "LDAP options", help = "Connect over LDAPS")]
    pub ldaps: bool,
    #[arg(short = 'b', long, allow_hyphen_values = true, help_heading = "LDAP options", help = "Search base (defaults to the domain naming context)")]
    pub base_dn: Option<String>,
    #[arg(short = 'l', long, allow_hyphen_values = true, help_heading = "LDAP options", help = "Bind principal; integrated authentication when absent")]
    pub login: Option<String>,
    #[arg(short = 'p', long, allow_hyphen_values = true, help_heading = "LDAP options", help = "Bind password")]
    pub password: Option<String>,
    #[arg(long, default_value_t = 15, help_heading = "LDAP options", help = "Connection and operation timeout in seconds")]
    pub timeout: u64,
    #[arg(
        long,
        default_value_t = DEFAULT_PAGE_SIZE,
        value_parser = clap::value_parser!(i32).range(1..),
        help_heading = "LDAP options",
        help = "Entries per result page"
    )]
    pub page_size: i32,

    #[arg(short = 'o', long, default_value = DEFAULT_OUTFILE, help_heading = "General options", help = "Output TSV file")]
    pub outfile: PathBuf,
    #[arg(long, help_heading = "General options", help = "Log filter (overrides RUST_LOG), e.g. debug")]
    pub log_level: Option<String>,
    #[arg(long, help_heading = "General options", help = "Also write the log to this file")]
    pub log_file: Option<PathBuf>,
    #[arg(long, help_heading = "General options", help = "Print run statistics as JSON on stdout")]
    pub json: bool,

    #[arg(short = 'S', long = "sysvol", allow_hyphen_values = true, value_name = "SYSVOL", help_heading = "Sysvol options", help = "Path of the sysvol 'Policies' folder")]
    pub sysvol: Option<String>,
    #[arg(short = 'B', long = "backup-privilege", help_heading = "Sysvol options", help = "Use 'SeBackupPrivilege' to access sysvol files")]
    pub backup_privilege: bool,
    #[arg(long, help_heading = "Sysvol options", help = "Report the GPO folder owner even when a sub-folder path cannot be built")]
    pub root_independent: bool,
}

impl Cli {
    /// Full usage text, printed when the SYSVOL path is missing.
    pub fn usage() -> String {
        Self::command().render_help().to_string()
    }

    /// `None` when `-S` was not given.
    pub fn sysvol_config(&self) -> Option<SysvolConfig> {
        let root = self.sysvol.as_ref()?;
        let mut config = SysvolConfig::new(root.clone());
        config.use_elevated_read = self.backup_privilege;
        config.report_root_independently = self.root_independent;
        Some(config)
    }

    pub fn ldap_config(&self) -> Result<LdapConfig> {
        let server = match &self.server {
            Some(server) => server.clone(),
            None => default_server().ok_or_else(|| {
                SysvolError::ConfigError(
                    "No domain controller given (-s) and none found in LOGONSERVER/USERDNSDOMAIN"
                        .to_string(),
                )
            })?,
        };

        let mut config = LdapConfig::new(server);
        config.port = self.port;
        config.use_tls = self.ldaps;
        config.base_dn = self.base_dn.clone();
        config.credentials = Credentials::from_options(self.login.clone(), self.password.clone());
        config.timeout = Duration::from_secs(self.timeout);
        config.page_size = self.page_size;
        Ok(config)
    }
}

/// Logon server of the current session, else its DNS domain
fn default_server() -> Option<String> {
    std::env::var("LOGONSERVER")
        .ok()
        .map(|s| s.trim_start_matches('\\').to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| std::env::var("USERDNSDOMAIN").ok().filter(|s| !s.is_empty()))
}

const VALUE_SHORTS: &[char] = &['s', 'n', 'b', 'l', 'p', 'o', 'S'];
const FLAG_SHORTS: &[char] = &['B', 'h', 'V'];
const VALUE_LONGS: &[&str] = &[
    "server", "port", "base-dn", "login", "password", "timeout", "page-size", "outfile",
    "log-level", "log-file", "sysvol",
];
const FLAG_LONGS: &[&str] = &[
    "ldaps", "json", "backup-privilege", "root-independent", "help", "version",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArgKind {
    Known { takes_value: bool },
    Unknown,
    Positional,
}

fn looks_like_flag(arg: &str) -> bool {
    arg.len() > 1 && arg.starts_with('-')
}

fn classify(arg: &str) -> ArgKind {
    if let Some(long) = arg.strip_prefix("--") {
        let (name, inline_value) = match long.split_once('=') {
            Some((name, _)) => (name, true),
            None => (long, false),
        };
        if VALUE_LONGS.contains(&name) {
            return ArgKind::Known { takes_value: !inline_value };
        }
        if FLAG_LONGS.contains(&name) && !inline_value {
            return ArgKind::Known { takes_value: false };
        }
        return ArgKind::Unknown;
    }

    if !looks_like_flag(arg) {
        return ArgKind::Positional;
    }

    // Short options may be grouped (-BS path) or carry their value (-Spath)
    let mut chars = arg[1..].chars();
    while let Some(c) = chars.next() {
        if VALUE_SHORTS.contains(&c) {
            return ArgKind::Known { takes_value: chars.as_str().is_empty() };
        }
        if !FLAG_SHORTS.contains(&c) {
            return ArgKind::Unknown;
        }
    }
    ArgKind::Known { takes_value: false }
}

/// Command line after unknown tokens were dropped
#[derive(Debug, Default)]
pub struct FilteredArgs {
    pub kept: Vec<OsString>,
    pub skipped: Vec<String>,
}

/// Drops options this collector does not know.
///
/// An unknown option also swallows the following token when that token is
/// not itself an option, since it is most likely the unknown option's value.
/// Stray positional tokens are dropped too. Everything after `--` is kept.
pub fn strip_unknown_args<I>(args: I) -> FilteredArgs
where
    I: IntoIterator,
    I::Item: Into<OsString>,
{
    let mut args = args.into_iter().map(Into::into).peekable();
    let mut filtered = FilteredArgs::default();

    if let Some(program) = args.next() {
        filtered.kept.push(program);
    }

    while let Some(arg) = args.next() {
        let text = arg.to_string_lossy().into_owned();
        if text == "--" {
            filtered.kept.push(arg);
            filtered.kept.extend(args.by_ref());
            break;
        }

        match classify(&text) {
            ArgKind::Known { takes_value } => {
                filtered.kept.push(arg);
                if takes_value {
                    if let Some(value) = args.next() {
                        filtered.kept.push(value);
                    }
                }
            }
            ArgKind::Unknown => {
                filtered.skipped.push(text);
                let next_is_value = args
                    .peek()
                    .map(|next| !looks_like_flag(&next.to_string_lossy()))
                    .unwrap_or(false);
                if next_is_value {
                    if let Some(value) = args.next() {
                        filtered.skipped.push(value.to_string_lossy().into_owned());
                    }
                }
            }
            ArgKind::Positional => filtered.skipped.push(text),
        }
    }

    filtered
}
