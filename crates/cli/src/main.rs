//! Tasky command-line client
//!
//! Drives the dual-mode task store: signed in against the remote collection
//! or as a guest with tasks kept in the local expiring store.

mod session;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tasky_core::config::ClientConfig;
use tasky_core::mode::Mode;
use tasky_core::session::Identity;
use tasky_core::task::{Task, TaskPatch, TaskPriority};
use tasky_core::view::{SortKey, TaskFilter};
use tasky_core::TaskClient;

use crate::session::FileSession;

#[derive(Debug, Parser)]
#[command(name = "tasky", version, about = "Personal task list, signed in or as a guest")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the current mode and status line
    Status,
    /// List tasks
    List {
        #[arg(long, default_value = "all")]
        filter: TaskFilter,
        #[arg(long, default_value = "created-desc")]
        sort: SortKey,
    },
    /// Add a task
    Add {
        text: String,
        #[arg(long, short, default_value = "medium")]
        priority: TaskPriority,
    },
    /// Mark a task as completed
    Done { id: String },
    /// Mark a task as not completed
    Undo { id: String },
    /// Replace a task's text
    Edit { id: String, text: String },
    /// Change a task's priority
    Priority { id: String, level: TaskPriority },
    /// Delete a task
    Rm { id: String },
    /// Continue as guest
    Guest,
    /// Sign in as the given owner
    Login {
        owner_id: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// Sign out
    Logout,
    /// Leave guest mode and drop guest data
    BackToLogin,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tasky=info,tasky_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::from_env()?;
    tracing::debug!("Using data directory: {:?}", config.data_dir);

    let session = Arc::new(FileSession::load(config.session_path())?);
    let client = TaskClient::from_config(&config, session.clone());
    tolerate(client.start().await.map(|_| ()))?;

    match cli.command {
        Command::Status => {}
        Command::List { filter, sort } => {
            require_active(&client)?;
            for task in client.view(filter, sort).await {
                println!("{}", render(&task));
            }
        }
        Command::Add { text, priority } => {
            let task = client.add(&text, priority).await?;
            println!("{}", render(&task));
        }
        Command::Done { id } => {
            client.set_completed(&id, true).await?;
        }
        Command::Undo { id } => {
            client.set_completed(&id, false).await?;
        }
        Command::Edit { id, text } => {
            client.update(&id, TaskPatch::new().text(text)).await?;
        }
        Command::Priority { id, level } => {
            client.update(&id, TaskPatch::new().priority(level)).await?;
        }
        Command::Rm { id } => {
            client.delete(&id).await?;
        }
        Command::Guest => {
            tolerate(client.continue_as_guest().await.map(|_| ()))?;
        }
        Command::Login { owner_id, email } => {
            let mut identity = Identity::new(owner_id);
            if let Some(email) = email {
                identity = identity.with_email(email);
            }
            session.sign_in(identity)?;
            client.sync_session().await?;
        }
        Command::Logout => {
            client.sign_out().await?;
        }
        Command::BackToLogin => {
            client.back_to_login().await?;
        }
    }

    println!("[{}] {}", client.mode(), client.status().await);
    Ok(())
}

/// Pass through errors the store already recovered from, after logging them.
fn tolerate(result: tasky_core::Result<()>) -> tasky_core::Result<()> {
    match result {
        Err(e) if e.is_recovered() => {
            tracing::warn!("{}", e);
            Ok(())
        }
        other => other,
    }
}

fn require_active(client: &TaskClient) -> Result<()> {
    if client.mode() == Mode::Anonymous {
        bail!("not signed in; run `tasky login <owner-id>` or `tasky guest`");
    }
    Ok(())
}

fn render(task: &Task) -> String {
    format!(
        "[{}] {:<6} {}  ({})",
        if task.completed { "x" } else { " " },
        task.priority,
        task.text,
        task.id
    )
}
