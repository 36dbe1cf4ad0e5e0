//! `taskboard` command-line front end.
//!
//! Each invocation derives the selection from the persisted address, runs
//! one command through the sync coordinator, then prints any notices it
//! raised.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Context, Result, eyre};
use mockable::DefaultClock;
use ortho_config::OrthoConfig;
use taskboard::ClientSettings;
use taskboard::domain::ports::AddressBar;
use taskboard::domain::{
    NoticeKind, NoticeQueue, PersistedSelection, RemoteClient, SelectedTasks, SelectionState,
    SyncCoordinator, Task, TaskId, UserId,
};
use taskboard::outbound::address_bar::{FileAddressBar, InMemoryAddressBar};
use taskboard::outbound::todo_api::TodoHttpSource;
use tokio::runtime::Builder;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};
use url::Url;

const DEFAULT_LOCATION: &str = "http://localhost/";

/// `taskboard` command arguments.
#[derive(Debug, Parser)]
#[command(
    name = "taskboard",
    about = "Browse users and toggle their tasks against a REST API",
    version
)]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List users sorted by name.
    Users,
    /// Select a user; clears the hide-completed filter when the user changes.
    Select {
        /// User id.
        user: u64,
    },
    /// Clear the selection and the filter.
    Clear,
    /// Hide completed tasks, or show them again with `--off`.
    HideCompleted {
        /// Show completed tasks.
        #[arg(long)]
        off: bool,
    },
    /// List the selected user's tasks.
    Tasks,
    /// Toggle completion of one of the selected user's tasks.
    Toggle {
        /// Task id.
        task: u64,
    },
    /// Print the persisted address.
    Location,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .with_writer(std::io::stderr)
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let args = CliArgs::parse();
    let settings = ClientSettings::load_from_iter([OsString::from("taskboard")])
        .map_err(|error| eyre!("failed to load configuration: {error}"))?;
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .wrap_err("failed to build Tokio runtime")?;
    runtime.block_on(run(args.command, &settings))
}

async fn run(command: Command, settings: &ClientSettings) -> Result<()> {
    let address_bar = open_address_bar(settings)?;
    let selection =
        PersistedSelection::load(address_bar.clone()).wrap_err("failed to read the address")?;
    let coordinator = build_coordinator(settings, &selection)?;

    let outcome = execute(command, &selection, &coordinator, address_bar.as_ref()).await;
    print_notices(coordinator.notices());
    outcome
}

fn open_address_bar(settings: &ClientSettings) -> Result<Arc<dyn AddressBar>> {
    let initial = Url::parse(DEFAULT_LOCATION).wrap_err("invalid default location")?;
    let address_bar: Arc<dyn AddressBar> = match &settings.state_file {
        Some(path) => Arc::new(
            FileAddressBar::open(path, initial)
                .wrap_err_with(|| format!("failed to open state file {}", path.display()))?,
        ),
        None => Arc::new(InMemoryAddressBar::new(initial)),
    };
    Ok(address_bar)
}

fn build_coordinator(
    settings: &ClientSettings,
    selection: &PersistedSelection,
) -> Result<SyncCoordinator> {
    let base_url = Url::parse(settings.api_base_url())
        .wrap_err_with(|| format!("invalid API base URL {}", settings.api_base_url()))?;
    let api = TodoHttpSource::new(base_url, settings.request_timeout())
        .wrap_err("failed to build HTTP client")?;
    let clock = Arc::new(DefaultClock);
    Ok(SyncCoordinator::new(
        RemoteClient::new(Arc::new(api), settings.retry_policy()),
        selection.subscribe(),
        NoticeQueue::new(clock.clone(), settings.notice_config()),
        clock,
        settings.sync_config(),
    ))
}

async fn execute(
    command: Command,
    selection: &PersistedSelection,
    coordinator: &SyncCoordinator,
    address_bar: &dyn AddressBar,
) -> Result<()> {
    match command {
        Command::Users => {
            let selected = selection.current().selected_user();
            for user in coordinator.users().await? {
                let marker = if Some(user.id) == selected { '*' } else { ' ' };
                println!("{marker} {:>3}  {}  <{}>", user.id, user.name, user.email);
            }
        }
        Command::Select { user } => {
            let user = UserId::new(user)?;
            print_state(selection.select(user)?);
        }
        Command::Clear => print_state(selection.clear()?),
        Command::HideCompleted { off } => print_state(selection.set_hide_completed(!off)?),
        Command::Tasks => match coordinator.selected_tasks().await? {
            SelectedTasks::NoSelection => println!("no user selected"),
            SelectedTasks::Loaded { tasks, .. } if tasks.is_empty() => println!("no tasks"),
            SelectedTasks::Loaded { tasks, .. } => tasks.iter().for_each(print_task),
            SelectedTasks::Superseded { requested } => {
                println!("selection changed while loading tasks for user {requested}");
            }
        },
        Command::Toggle { task } => {
            let task_id = TaskId::new(task)?;
            let user = selection
                .current()
                .selected_user()
                .ok_or_else(|| eyre!("select a user before toggling tasks"))?;
            let target = coordinator
                .tasks_for(user)
                .await?
                .into_iter()
                .find(|candidate| candidate.id == task_id)
                .ok_or_else(|| eyre!("user {user} has no task {task_id}"))?;
            let settled = coordinator.toggle_task(&target).await?;
            print_task(&settled);
        }
        Command::Location => println!("{}", address_bar.location()?),
    }
    Ok(())
}

fn print_state(state: SelectionState) {
    let user = state
        .selected_user()
        .map_or_else(|| "none".to_owned(), |user| user.to_string());
    println!(
        "selected user: {user}; hide completed: {}",
        state.hide_completed()
    );
}

fn print_task(task: &Task) {
    let mark = if task.completed { 'x' } else { ' ' };
    println!("[{mark}] {:>3}  {}", task.id, task.title);
}

fn print_notices(notices: &NoticeQueue) {
    for notice in notices.snapshot() {
        let label = match notice.kind {
            NoticeKind::Success => "ok",
            NoticeKind::Error => "error",
            NoticeKind::Info => "note",
        };
        eprintln!("{label}: {}", notice.message);
    }
}
