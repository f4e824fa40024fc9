use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use sysvol_control::cli::{strip_unknown_args, Cli};
use sysvol_control::ldap_helpers::{attrs, filters};
use sysvol_control::privilege::{enable_privilege, SE_BACKUP_NAME};
use sysvol_control::{
    DirectoryEnumerator, DirectoryObjectRef, FsOwnerExtractor, GpoOwnerCollector, LdapEnumerator,
    TsvEdgeWriter,
};

/// Console on stderr, plus an optional plain-text log file.
fn init_logging(cli: &Cli) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = match &cli.log_level {
        Some(level) => EnvFilter::try_new(level)
            .with_context(|| format!("Invalid log level '{}'", level))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let console_layer = fmt::layer().with_writer(io::stderr).with_ansi(true);

    let (file_layer, guard) = match &cli.log_file {
        Some(log_file) => {
            let dir = log_file
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = log_file
                .file_name()
                .with_context(|| format!("Invalid log file path {}", log_file.display()))?;

            let file_appender = RollingFileAppender::new(Rotation::NEVER, dir, name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let Some(sysvol) = cli.sysvol_config() else {
        eprintln!("{}", Cli::usage());
        return Ok(ExitCode::FAILURE);
    };

    if sysvol.use_elevated_read {
        if let Err(e) = enable_privilege(SE_BACKUP_NAME) {
            error!("Cannot enable backup privilege for the current process: {}", e);
            return Ok(ExitCode::FAILURE);
        }
    }

    let ldap_config = cli.ldap_config()?;
    let mut directory =
        LdapEnumerator::connect(&ldap_config).context("Cannot connect to the directory")?;

    let outfile = File::create(&cli.outfile)
        .with_context(|| format!("Cannot create output file {}", cli.outfile.display()))?;
    let mut sink = TsvEdgeWriter::with_header(BufWriter::new(outfile))?;
    let extractor = FsOwnerExtractor::new(sysvol.use_elevated_read);

    info!(
        "Collecting SYSVOL owners under {} into {}",
        sysvol.policies_root,
        cli.outfile.display()
    );

    let mut collector = GpoOwnerCollector::new(&sysvol, &extractor, &mut sink);
    let visited = directory
        .for_each_object(filters::GPO, attrs::COMMON_NAME, &mut |object: DirectoryObjectRef<'_>| {
            collector.process(object);
        })
        .context("GPO enumeration failed")?;
    let mut stats = collector.into_stats();
    stats.finish();

    sink.finish().context("Cannot flush output file")?;
    if let Err(e) = directory.unbind() {
        warn!("LDAP unbind failed: {}", e);
    }

    info!(
        "Done: {} GPO(s), {} edge(s) written, {} skipped, {} GPO(s) rejected, {} incomplete",
        visited,
        stats.edges_written,
        stats.edges_skipped(),
        stats.objects_rejected,
        stats.objects_incomplete
    );

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    }

    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let filtered = strip_unknown_args(std::env::args_os());
    let cli = Cli::parse_from(filtered.kept);

    let _guard = match init_logging(&cli) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("=======================================================");
    info!("SYSVOL owner control collector {}", env!("CARGO_PKG_VERSION"));
    info!("=======================================================");

    for skipped in &filtered.skipped {
        warn!("Skipping unknown option or argument '{}'", skipped);
    }

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
