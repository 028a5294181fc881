//! Argument parsing and command dispatch.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use ledgerdesk_telemetry::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, command_span, init_logging};
use tracing::Instrument;
use url::Url;
use uuid::Uuid;

use crate::client::{AppContext, CliResult, parse_url};
use crate::commands::bulk::handle_bulk;
use crate::commands::list::{handle_list, handle_screens};
use crate::commands::session::{handle_login, handle_logout};

pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub(crate) const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api/";

/// Parses CLI arguments, executes the requested command, and reports the
/// outcome. Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    let logging = LoggingConfig {
        level: &cli.log_level,
        format: cli.log_format.unwrap_or(LogFormat::Pretty),
        build_sha: option_env!("LEDGERDESK_BUILD_SHA").unwrap_or("dev"),
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("warning: {err:#}");
    }

    let command_name = command_label(&cli.command);
    let trace_id = Uuid::new_v4().to_string();
    let span = command_span(command_name);

    let result = async {
        let ctx = AppContext::from_cli(&cli, &trace_id)?;
        dispatch(&ctx, cli.command, cli.output).await
    }
    .instrument(span)
    .await;

    match result {
        Ok(()) => 0,
        Err(err) => {
            let exit_code = err.exit_code();
            tracing::debug!(command = command_name, exit_code, "command failed");
            eprintln!("error: {}", err.display_message());
            exit_code
        }
    }
}

pub(crate) async fn dispatch(
    ctx: &AppContext,
    command: Command,
    output: OutputFormat,
) -> CliResult<()> {
    match command {
        Command::Login(args) => handle_login(ctx, args).await,
        Command::Logout => handle_logout(ctx),
        Command::Screens => handle_screens(output),
        Command::Ls(args) => handle_list(ctx, args, output).await,
        Command::Bulk(args) => handle_bulk(ctx, args, output).await,
    }
}

#[derive(Parser)]
#[command(name = "ledgerdesk", about = "Console for the ledgerdesk admin list screens", version)]
pub(crate) struct Cli {
    #[arg(
        long,
        global = true,
        env = "LEDGERDESK_API_URL",
        value_parser = parse_url,
        default_value = DEFAULT_API_URL
    )]
    pub(crate) api_url: Url,
    #[arg(
        long,
        global = true,
        env = "LEDGERDESK_HTTP_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS
    )]
    pub(crate) timeout: u64,
    #[arg(
        long,
        global = true,
        env = "LEDGERDESK_SESSION_FILE",
        help = "Where credentials are stored (defaults to <config dir>/ledgerdesk/session.json)"
    )]
    pub(crate) session_file: Option<PathBuf>,
    #[arg(
        long = "session-status",
        global = true,
        env = "LEDGERDESK_SESSION_STATUS",
        value_delimiter = ',',
        help = "HTTP statuses that mean the session is no longer valid (default 401)"
    )]
    pub(crate) session_statuses: Vec<u16>,
    #[arg(long, global = true, env = "LEDGERDESK_LOG_FORMAT")]
    pub(crate) log_format: Option<LogFormat>,
    #[arg(long, global = true, env = "LEDGERDESK_LOG", default_value = DEFAULT_LOG_LEVEL)]
    pub(crate) log_level: String,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    pub(crate) output: OutputFormat,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Sign in and store the session token.
    Login(LoginArgs),
    /// Forget the stored session.
    Logout,
    /// List the screens this console can open.
    Screens,
    /// Show one page of a screen.
    Ls(ListArgs),
    /// Run a bulk action on rows of the current page.
    Bulk(BulkArgs),
}

#[derive(Args)]
pub(crate) struct LoginArgs {
    #[arg(long, env = "LEDGERDESK_EMAIL")]
    pub(crate) email: String,
    #[arg(
        long,
        env = "LEDGERDESK_PASSWORD",
        hide_env_values = true,
        help = "Password (prompted when omitted)"
    )]
    pub(crate) password: Option<String>,
}

/// `key=value` pair from the command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct KeyValue {
    pub(crate) key: String,
    pub(crate) value: String,
}

#[derive(Args, Clone, Debug, Default)]
pub(crate) struct ListOptions {
    #[arg(long, default_value_t = 1, help = "Page number, starting at 1")]
    pub(crate) page: usize,
    #[arg(long)]
    pub(crate) page_size: Option<usize>,
    #[arg(long, help = "Case-insensitive text search")]
    pub(crate) search: Option<String>,
    #[arg(
        long = "where",
        value_parser = parse_key_value,
        help = "Only rows whose field equals the value (repeatable, field=value)"
    )]
    pub(crate) categories: Vec<KeyValue>,
    #[arg(long = "flag", help = "Enable a named screen filter (repeatable)")]
    pub(crate) flags: Vec<String>,
    #[arg(long, value_parser = parse_date, help = "First day to include (YYYY-MM-DD)")]
    pub(crate) from: Option<NaiveDate>,
    #[arg(long, value_parser = parse_date, help = "Last day to include (YYYY-MM-DD)")]
    pub(crate) to: Option<NaiveDate>,
    #[arg(
        long = "param",
        value_parser = parse_key_value,
        help = "Extra query parameter sent to the server (repeatable, key=value)"
    )]
    pub(crate) params: Vec<KeyValue>,
}

#[derive(Args)]
pub(crate) struct ListArgs {
    #[arg(help = "Screen name (see `ledgerdesk screens`)")]
    pub(crate) screen: String,
    #[command(flatten)]
    pub(crate) options: ListOptions,
}

#[derive(Args)]
pub(crate) struct BulkArgs {
    #[arg(help = "Screen name (see `ledgerdesk screens`)")]
    pub(crate) screen: String,
    #[arg(help = "Bulk action name")]
    pub(crate) action: String,
    #[arg(long, value_delimiter = ',', required = true, help = "Row ids on the selected page")]
    pub(crate) ids: Vec<String>,
    #[command(flatten)]
    pub(crate) options: ListOptions,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}

const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Login(_) => "login",
        Command::Logout => "logout",
        Command::Screens => "screens",
        Command::Ls(_) => "ls",
        Command::Bulk(_) => "bulk",
    }
}

pub(crate) fn parse_key_value(input: &str) -> Result<KeyValue, String> {
    let (key, value) = input
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{input}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in '{input}'"));
    }
    Ok(KeyValue {
        key: key.to_string(),
        value: value.trim().to_string(),
    })
}

pub(crate) fn parse_date(input: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|err| format!("invalid date '{input}' (expected YYYY-MM-DD): {err}"))
}
