use crate::domain::{JobNode, JobPath, annotate_paths, extra_data_rows, find_node};
use crate::infra::{ApiClient, ApiError, DEFAULT_SERVER, SnapshotPresence};
use std::io::{self, Write};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Connection options shared by the TUI and the one-shot commands.
#[derive(Clone, Debug, PartialEq)]
pub struct ServerOptions {
    pub server: Option<String>,
    pub interval: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            server: None,
            interval: DEFAULT_INTERVAL,
        }
    }
}

impl ServerOptions {
    /// Flag > `SNAPWATCH_SERVER` env override > built-in default.
    pub fn resolve_server(&self) -> String {
        if let Some(server) = &self.server {
            return server.clone();
        }
        if let Ok(server) = std::env::var("SNAPWATCH_SERVER") {
            if !server.trim().is_empty() {
                return server;
            }
        }
        DEFAULT_SERVER.to_string()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum CliInvocation {
    PrintHelp,
    PrintVersion,
    Tui { options: ServerOptions },
    Command { command: CliCommand, options: ServerOptions },
}

#[derive(Clone, Debug, PartialEq)]
pub enum CliCommand {
    Jobs,
    Details { path: JobPath },
    Start,
    Prep,
}

#[derive(Debug, Error)]
pub enum CliParseError {
    #[error("unknown subcommand: {0}")]
    UnknownSubcommand(String),

    #[error("unknown flag: {0}")]
    UnknownFlag(String),

    #[error("missing value for flag: {0}")]
    MissingFlagValue(String),

    #[error("invalid value for {flag}: {value}")]
    InvalidFlagValue { flag: String, value: String },

    #[error("missing argument: {0}")]
    MissingArgument(String),

    #[error("unexpected argument: {0}")]
    UnexpectedArgument(String),
}

pub fn parse_invocation(args: &[String]) -> Result<CliInvocation, CliParseError> {
    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        return Ok(CliInvocation::PrintHelp);
    }
    if args.iter().any(|arg| arg == "--version" || arg == "-V") {
        return Ok(CliInvocation::PrintVersion);
    }

    let mut options = ServerOptions::default();
    let mut subcommand: Option<String> = None;
    let mut positional: Option<String> = None;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--server" => {
                let value = iter
                    .next()
                    .ok_or_else(|| CliParseError::MissingFlagValue("--server".to_string()))?;
                options.server = Some(value.clone());
            }
            "--interval" => {
                let value = iter
                    .next()
                    .ok_or_else(|| CliParseError::MissingFlagValue("--interval".to_string()))?;
                let secs = value
                    .parse::<f64>()
                    .ok()
                    .filter(|secs| secs.is_finite() && *secs > 0.0)
                    .ok_or_else(|| CliParseError::InvalidFlagValue {
                        flag: "--interval".to_string(),
                        value: value.clone(),
                    })?;
                options.interval = Duration::from_secs_f64(secs);
            }
            _ if arg.starts_with('-') => {
                return Err(CliParseError::UnknownFlag(arg.clone()));
            }
            _ if subcommand.is_none() => {
                subcommand = Some(arg.clone());
            }
            _ if positional.is_none() => {
                positional = Some(arg.clone());
            }
            _ => {
                return Err(CliParseError::UnexpectedArgument(arg.clone()));
            }
        }
    }

    let Some(subcommand) = subcommand else {
        if let Some(extra) = positional {
            return Err(CliParseError::UnexpectedArgument(extra));
        }
        return Ok(CliInvocation::Tui { options });
    };

    let command = match subcommand.as_str() {
        "jobs" => {
            if let Some(extra) = positional {
                return Err(CliParseError::UnexpectedArgument(extra));
            }
            CliCommand::Jobs
        }
        "details" => {
            let raw = positional
                .ok_or_else(|| CliParseError::MissingArgument("job path".to_string()))?;
            CliCommand::Details {
                path: JobPath::parse(&raw),
            }
        }
        "start" => {
            if let Some(extra) = positional {
                return Err(CliParseError::UnexpectedArgument(extra));
            }
            CliCommand::Start
        }
        "prep" => {
            if let Some(extra) = positional {
                return Err(CliParseError::UnexpectedArgument(extra));
            }
            CliCommand::Prep
        }
        other => return Err(CliParseError::UnknownSubcommand(other.to_string())),
    };

    Ok(CliInvocation::Command { command, options })
}

#[derive(Debug, Error)]
pub enum CliRunError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("no job at path: {0}")]
    JobNotFound(JobPath),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub fn run(command: CliCommand, client: &ApiClient) -> Result<(), CliRunError> {
    match command {
        CliCommand::Jobs => run_jobs(client),
        CliCommand::Details { path } => run_details(client, &path),
        CliCommand::Start => {
            client.start_all()?;
            let mut out = io::stdout().lock();
            writeln!(out, "Triggered run of all jobs.")?;
            Ok(())
        }
        CliCommand::Prep => {
            client.prepare_all()?;
            let mut out = io::stdout().lock();
            writeln!(out, "Triggered prep of all jobs.")?;
            Ok(())
        }
    }
}

fn fetch_root_children(client: &ApiClient) -> Result<Vec<JobNode>, CliRunError> {
    let response = client.fetch_all_tasks()?;
    let root = JobPath::root();
    Ok(response
        .task
        .children
        .into_iter()
        .map(|child| annotate_paths(child, &root))
        .collect())
}

fn run_jobs(client: &ApiClient) -> Result<(), CliRunError> {
    let jobs = fetch_root_children(client)?;
    let mut out = io::stdout().lock();
    for job in &jobs {
        print_job_line(&mut out, job)?;
    }
    Ok(())
}

fn print_job_line(out: &mut impl Write, node: &JobNode) -> io::Result<()> {
    writeln!(
        out,
        "{}\t{}\t{}\t{}",
        node.path, node.label, node.status.label, node.status.message
    )?;
    for child in &node.children {
        print_job_line(out, child)?;
    }
    Ok(())
}

fn run_details(client: &ApiClient, path: &JobPath) -> Result<(), CliRunError> {
    let jobs = fetch_root_children(client)?;
    let job = find_node(&jobs, path).ok_or_else(|| CliRunError::JobNotFound(path.clone()))?;

    let mut out = io::stdout().lock();
    writeln!(out, "{}", job.header())?;
    writeln!(out, "{}: {}", job.status.label, job.status.message)?;
    for (name, value) in extra_data_rows(&job.extra) {
        writeln!(out, "{name}\t{value}")?;
    }

    let detail = client.fetch_task_details(path)?;
    if let Some(report) = detail.detail_data.snapshot_report {
        writeln!(out)?;
        writeln!(out, "Snapshot\tSource\tReceiver")?;
        for snapshot in report.snapshots {
            writeln!(
                out,
                "{}\t{}\t{}",
                snapshot.name,
                SnapshotPresence::of(snapshot.source.as_ref()).label(),
                SnapshotPresence::of(snapshot.receiver.as_ref()).label(),
            )?;
        }
    }
    Ok(())
}
