mod app;
mod cli;
mod domain;
mod infra;
mod ui;

use crate::app::{AppCommand, AppError, AppEvent, AppModel, DetailRequest};
use crate::cli::CliInvocation;
use crate::domain::{JobNode, JobPath, annotate_paths};
use crate::infra::{ApiClient, DetailData};
use crate::ui::JobRow;
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io::{self, Stdout, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{RecvTimeoutError, Sender, channel};
use std::thread;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
enum MainError {
    #[error(transparent)]
    App(#[from] AppError),

    #[error(transparent)]
    Cli(#[from] crate::cli::CliRunError),
}

/// One completed refresh cycle, good or bad.
#[derive(Debug)]
enum RefreshSignal {
    Snapshot { jobs: Vec<JobNode>, server_unix: f64 },
    Failed { error: String },
}

#[derive(Debug)]
enum DetailSignal {
    Loaded {
        path: JobPath,
        result: Result<DetailData, String>,
    },
}

fn main() {
    if let Err(error) = run_main() {
        let mut err = io::stderr().lock();
        let _ = writeln!(err, "{error}");
        std::process::exit(1);
    }
}

fn run_main() -> Result<(), MainError> {
    let args = std::env::args().collect::<Vec<_>>();
    let invocation = match cli::parse_invocation(&args) {
        Ok(invocation) => invocation,
        Err(error) => {
            let mut err = io::stderr().lock();
            let _ = writeln!(err, "{error}");
            let _ = writeln!(err);
            print_help();
            std::process::exit(2);
        }
    };

    match invocation {
        CliInvocation::PrintHelp => {
            print_help();
            Ok(())
        }
        CliInvocation::PrintVersion => {
            let mut out = io::stdout().lock();
            let _ = writeln!(out, "{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        CliInvocation::Command { command, options } => {
            let client = ApiClient::new(options.resolve_server());
            cli::run(command, &client)?;
            Ok(())
        }
        CliInvocation::Tui { options } => Ok(run_tui(options)?),
    }
}

fn print_help() {
    let text = format!(
        "{name} — terminal dashboard for snapshot replication jobs\n\nUSAGE:\n  {name} [--server URL] [--interval SECS]   Start the dashboard\n  {name} jobs                              Print the job tree\n  {name} details <path>                    Print one job's detail (path like pool/img1)\n  {name} start                             Trigger a run of all jobs\n  {name} prep                              Trigger prep of all jobs\n  {name} --help | --version\n\nFLAGS:\n  --server URL     Backend base URL (default: http://127.0.0.1:8080)\n  --interval SECS  Dashboard poll interval (default: 1)\n\nOUTPUT:\n  jobs:    path<TAB>label<TAB>status<TAB>message\n  details: field<TAB>value rows, then snapshot<TAB>source<TAB>receiver\n\nENV:\n  SNAPWATCH_SERVER     Override the backend base URL\n  SNAPWATCH_STATE_DIR  Override the state dir for the log file (default: ~/.snapwatch)\n",
        name = env!("CARGO_PKG_NAME")
    );
    let mut out = io::stdout().lock();
    let _ = write!(out, "{text}");
}

fn run_tui(options: cli::ServerOptions) -> Result<(), AppError> {
    // The TUI owns the terminal; logging goes to a file or nowhere.
    let log_notice = match infra::init_file_logging() {
        Ok(path) => {
            log::info!("snapwatch {} starting", env!("CARGO_PKG_VERSION"));
            log::info!("logging to {}", path.display());
            None
        }
        Err(error) => Some(format!("File logging disabled: {error}")),
    };

    let client = ApiClient::new(options.resolve_server());
    let mut model = AppModel::new(JobRow::default).with_notice(log_notice);

    let mut terminal = setup_terminal()?;
    let result = run(&mut terminal, &mut model, &client, options.interval);
    restore_terminal(&mut terminal)?;
    result
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>, AppError> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<(), AppError> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn run(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    model: &mut AppModel<JobRow>,
    client: &ApiClient,
    interval: Duration,
) -> Result<(), AppError> {
    let (refresh_tx, refresh_rx) = channel::<RefreshSignal>();
    let refresh = spawn_refresh_loop(client.clone(), interval, refresh_tx);

    let (detail_tx, detail_rx) = channel::<DetailSignal>();

    loop {
        while let Ok(signal) = refresh_rx.try_recv() {
            match signal {
                RefreshSignal::Snapshot { jobs, server_unix } => {
                    model.server_time = Some(server_unix);
                    model.connection_error = None;
                    let requests = model.dashboard.apply_snapshot(jobs);
                    dispatch_detail_fetches(client, requests, &detail_tx);
                }
                RefreshSignal::Failed { error } => {
                    log::warn!("refresh failed: {error}");
                    model.connection_error = Some(error);
                }
            }
        }

        while let Ok(DetailSignal::Loaded { path, result }) = detail_rx.try_recv() {
            match result {
                // Staleness is decided inside by path equality.
                Ok(data) => model.dashboard.apply_detail(&path, data),
                Err(error) => log::warn!("detail fetch for {path} failed: {error}"),
            }
        }

        refresh.set_paused(model.paused);
        terminal.draw(|frame| ui::render(frame, model))?;

        if event::poll(Duration::from_millis(200))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Release {
                    continue;
                }
                let (next, command) = app::update(model.clone(), AppEvent::Key(key));
                *model = next;
                match command {
                    AppCommand::None => {}
                    AppCommand::Quit => return Ok(()),
                    AppCommand::Refresh => refresh.request_now(),
                    AppCommand::StartAll => {
                        model.notice = Some("Triggered run of all jobs.".to_string());
                        spawn_trigger(client.clone(), Trigger::Start);
                    }
                    AppCommand::PrepareAll => {
                        model.notice = Some("Triggered prep of all jobs.".to_string());
                        spawn_trigger(client.clone(), Trigger::Prep);
                    }
                    AppCommand::FetchDetails(requests) => {
                        dispatch_detail_fetches(client, requests, &detail_tx);
                    }
                }
            }
        }
    }
}

struct RefreshLoopHandle {
    trigger_tx: Sender<()>,
    paused: Arc<AtomicBool>,
}

impl RefreshLoopHandle {
    fn request_now(&self) {
        let _ = self.trigger_tx.send(());
    }

    fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }
}

/// Poll the backend on a dedicated thread. The first cycle fires
/// immediately; after that the timer or a manual trigger starts the next
/// one, so cycles never overlap. Pausing skips the fetch but keeps the loop
/// ticking; a manual trigger overrides the pause.
fn spawn_refresh_loop(
    client: ApiClient,
    interval: Duration,
    tx: Sender<RefreshSignal>,
) -> RefreshLoopHandle {
    let (trigger_tx, trigger_rx) = channel::<()>();
    let paused = Arc::new(AtomicBool::new(false));
    let paused_flag = paused.clone();
    thread::spawn(move || {
        let mut forced = true;
        loop {
            if forced || !paused_flag.load(Ordering::Relaxed) {
                if tx.send(run_cycle(&client)).is_err() {
                    return;
                }
            }
            forced = match trigger_rx.recv_timeout(interval) {
                Ok(()) => true,
                Err(RecvTimeoutError::Timeout) => false,
                Err(RecvTimeoutError::Disconnected) => return,
            };
        }
    });
    RefreshLoopHandle { trigger_tx, paused }
}

fn run_cycle(client: &ApiClient) -> RefreshSignal {
    match client.fetch_all_tasks() {
        Ok(response) => {
            let root = JobPath::root();
            let jobs = response
                .task
                .children
                .into_iter()
                .map(|child| annotate_paths(child, &root))
                .collect();
            RefreshSignal::Snapshot {
                jobs,
                server_unix: response.server_info.unix_time,
            }
        }
        Err(error) => RefreshSignal::Failed {
            error: error.to_string(),
        },
    }
}

/// One thread per lookup; responses funnel back over the channel and stale
/// ones are dropped by the detail pane's path check. Nothing is cancelled.
fn dispatch_detail_fetches(
    client: &ApiClient,
    requests: Vec<DetailRequest>,
    tx: &Sender<DetailSignal>,
) {
    for request in requests {
        let client = client.clone();
        let tx = tx.clone();
        thread::spawn(move || {
            let result = client
                .fetch_task_details(&request.path)
                .map(|response| response.detail_data)
                .map_err(|error| error.to_string());
            let _ = tx.send(DetailSignal::Loaded {
                path: request.path,
                result,
            });
        });
    }
}

#[derive(Clone, Copy, Debug)]
enum Trigger {
    Start,
    Prep,
}

impl Trigger {
    fn label(self) -> &'static str {
        match self {
            Self::Start => "start-all",
            Self::Prep => "prep-all",
        }
    }
}

/// Fire-and-forget backend trigger; the response is not part of the
/// contract, so only failures are worth logging.
fn spawn_trigger(client: ApiClient, trigger: Trigger) {
    thread::spawn(move || {
        let result = match trigger {
            Trigger::Start => client.start_all(),
            Trigger::Prep => client.prepare_all(),
        };
        if let Err(error) = result {
            log::warn!("{} trigger failed: {error}", trigger.label());
        }
    });
}
