//! Command-line surface of the `specter` binary.
//!
//! One-shot invocations and REPL lines go through the same [`Cli`] parser and
//! the same dispatch; a command never sees flags from an earlier line.

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use specter_core::catalog::{listing, MonitorQuery};
use specter_core::scope::{DEFAULT_LIMIT_HINT, DEFAULT_SCHEMA, DEFAULT_SHARE, DEFAULT_TABLE};
use specter_core::{QueryScope, SearchFilters, DEFAULT_PROFILE_PATH};

use crate::broker::{LocationBroker, SharingBroker};
use crate::config::{ClientConfig, TimeoutConfig, DEFAULT_MAX_OBJECT_BYTES};
use crate::executor::{DataFusionExecutor, QueryExecutor};
use crate::logging::LogFormat;
use crate::pipeline::Pipeline;
use crate::repl;

/// Banner shown when no subcommand is given.
pub const BANNER: &str = "Specter: audit-log search and monitoring over shared tables.\n\
                          Run `specter --help` for commands, or `specter interactive` for a shell.";

/// First line of `monitor --list`.
pub const LISTING_HEADER: &str = "Available monitoring queries:";

/// `Specter CLI v<version>`.
#[must_use]
pub fn version_line() -> String {
    format!("Specter CLI v{}", env!("CARGO_PKG_VERSION"))
}

/// Query audit logs shared through a credential-vending exchange.
#[derive(Debug, Parser)]
#[command(name = "specter")]
#[command(about = "Search and monitor audit logs in a shared table")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Options that apply to every command.
#[derive(Debug, Clone, Args)]
pub struct GlobalOptions {
    /// Path to the sharing profile.
    #[arg(long, env = "SPECTER_PROFILE", default_value = DEFAULT_PROFILE_PATH, global = true)]
    pub profile: PathBuf,

    #[arg(long, default_value = DEFAULT_SHARE, global = true)]
    pub share: String,

    #[arg(long, default_value = DEFAULT_SCHEMA, global = true)]
    pub schema: String,

    #[arg(long, default_value = DEFAULT_TABLE, global = true)]
    pub table: String,

    /// Advisory row count sent with each exchange.
    #[arg(long, default_value_t = DEFAULT_LIMIT_HINT, global = true)]
    pub limit_hint: u64,

    /// Connect timeout in seconds (0 disables).
    #[arg(long, default_value_t = 10, global = true)]
    pub connect_timeout_secs: u64,

    /// Request timeout for the exchange and object fetch in seconds (0 disables).
    #[arg(long, default_value_t = 60, global = true)]
    pub request_timeout_secs: u64,

    /// Upper bound on one query in seconds (0 disables).
    #[arg(long, default_value_t = 0, global = true)]
    pub query_timeout_secs: u64,

    /// Largest data object loaded into memory, in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_OBJECT_BYTES, global = true)]
    pub max_object_bytes: u64,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,
}

impl GlobalOptions {
    /// Builds the pipeline configuration from the parsed flags.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            profile_path: self.profile.clone(),
            scope: QueryScope::new(
                self.share.clone(),
                self.schema.clone(),
                self.table.clone(),
            ),
            limit_hint: self.limit_hint,
            timeouts: TimeoutConfig {
                connect: TimeoutConfig::from_secs(self.connect_timeout_secs),
                request: TimeoutConfig::from_secs(self.request_timeout_secs),
                query: TimeoutConfig::from_secs(self.query_timeout_secs),
            },
            max_object_bytes: self.max_object_bytes,
        }
    }

    /// Command-line arguments that reproduce the pipeline settings.
    ///
    /// Logging flags are left out; the subscriber is installed once per
    /// process.
    #[must_use]
    pub fn to_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["--profile".into(), self.profile.clone().into()];
        for (flag, value) in [
            ("--share", self.share.clone()),
            ("--schema", self.schema.clone()),
            ("--table", self.table.clone()),
            ("--limit-hint", self.limit_hint.to_string()),
            ("--connect-timeout-secs", self.connect_timeout_secs.to_string()),
            ("--request-timeout-secs", self.request_timeout_secs.to_string()),
            ("--query-timeout-secs", self.query_timeout_secs.to_string()),
            ("--max-object-bytes", self.max_object_bytes.to_string()),
        ] {
            args.push(flag.into());
            args.push(value.into());
        }
        args
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Search audit logs by user, service, action, date, or source IP.
    Search(SearchArgs),
    /// Run built-in monitoring queries.
    Monitor(MonitorArgs),
    /// Print the version.
    Version,
    /// Start an interactive shell.
    Interactive,
}

#[derive(Debug, Clone, Args)]
pub struct SearchArgs {
    /// Filter by user email.
    #[arg(long)]
    pub user: Option<String>,
    /// Filter by service name.
    #[arg(long)]
    pub service: Option<String>,
    /// Filter by action name.
    #[arg(long)]
    pub action: Option<String>,
    /// Only events after this date.
    #[arg(long)]
    pub date: Option<String>,
    /// Filter by source IP address.
    #[arg(long = "source_ip", visible_alias = "source-ip")]
    pub source_ip: Option<String>,
    /// Export to `<base>.csv` instead of printing.
    #[arg(long, value_name = "BASE")]
    pub export: Option<String>,
}

impl SearchArgs {
    #[must_use]
    pub fn filters(&self) -> SearchFilters {
        SearchFilters {
            user: self.user.clone(),
            service: self.service.clone(),
            action: self.action.clone(),
            date: self.date.clone(),
            source_ip: self.source_ip.clone(),
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct MonitorArgs {
    /// Query to run: 0 for all, otherwise its 1-based number.
    #[arg(long, default_value_t = 0)]
    pub run: usize,
    /// List the available queries and exit.
    #[arg(long)]
    pub list: bool,
    /// Export to `<base>.csv` (`<base>_<name>.csv` per query when running all).
    #[arg(long, value_name = "BASE")]
    pub export: Option<String>,
}

/// Builds a pipeline over the sharing broker and the DataFusion executor.
///
/// # Errors
///
/// Returns an error if either HTTP client cannot be built.
pub fn build_pipeline<W: Write>(config: ClientConfig, out: W) -> Result<Pipeline<W>> {
    let broker: Arc<dyn LocationBroker> = Arc::new(SharingBroker::new(&config)?);
    let executor: Arc<dyn QueryExecutor> = Arc::new(DataFusionExecutor::new(&config)?);
    Ok(Pipeline::new(config, broker, executor, out))
}

/// Entry point for a parsed command line.
///
/// # Errors
///
/// Returns the first fatal error of the command.
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        None => {
            println!("{BANNER}");
            Ok(())
        }
        Some(Command::Interactive) => repl::run(cli.global).await,
        Some(command) => {
            let mut pipeline = build_pipeline(cli.global.client_config(), std::io::stdout())?;
            cancellable(execute(&mut pipeline, command)).await
        }
    }
}

/// Runs one non-interactive command against `pipeline`.
///
/// # Errors
///
/// Returns the pipeline error, or a refusal for `interactive`.
pub async fn execute<W: Write>(pipeline: &mut Pipeline<W>, command: Command) -> Result<()> {
    match command {
        Command::Search(args) => {
            pipeline
                .search(&args.filters(), args.export.as_deref())
                .await?;
        }
        Command::Monitor(args) if args.list => {
            for line in listing_lines(pipeline.catalog()) {
                println!("{line}");
            }
        }
        Command::Monitor(args) => {
            pipeline.monitor(args.run, args.export.as_deref()).await?;
        }
        Command::Version => println!("{}", version_line()),
        Command::Interactive => anyhow::bail!("already in interactive mode"),
    }
    Ok(())
}

/// Output of `monitor --list`: a header, then one `[i] name - description`
/// line per query.
#[must_use]
pub fn listing_lines(catalog: &[MonitorQuery]) -> Vec<String> {
    let mut lines = vec![LISTING_HEADER.to_string()];
    lines.extend(listing(catalog));
    lines
}

/// Drives `fut` to completion unless Ctrl-C arrives first.
///
/// # Errors
///
/// Returns `fut`'s error, or an error when interrupted.
pub async fn cancellable<T>(fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
    tokio::select! {
        result = fut => result,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            anyhow::bail!("interrupted")
        }
    }
}
