//! agentwork CLI - inspect and drive an agent work data directory.

mod commands;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "agentwork")]
#[command(author, version, about = "Story and task tracking for coding agents")]
#[command(propagate_version = true)]
struct Cli {
    /// Output format
    #[arg(long, global = true, default_value = "human")]
    format: output::OutputFormat,

    /// Data directory (defaults to current directory)
    #[arg(long = "data-dir", short = 'C', global = true, env = "AGENTWORK_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config.yml into the data directory
    Init,

    /// List work items
    #[command(alias = "ls")]
    List {
        /// Filter by status (open, in_progress, done, closed)
        #[arg(long, short = 's')]
        status: Option<String>,

        /// Filter by type (story, task)
        #[arg(long = "type", short = 't')]
        work_type: Option<String>,
    },

    /// Show a work item and its children
    Get {
        /// Work item id
        id: String,
    },

    /// Create a work item
    New {
        /// Title of the work item
        title: String,

        /// Item type
        #[arg(long = "type", short = 't', default_value = "task")]
        work_type: String,

        /// Owning story (required for tasks)
        #[arg(long, short = 'p')]
        parent: Option<String>,

        /// Agent role (tasks inherit their story's role when omitted)
        #[arg(long, short = 'r')]
        role: Option<String>,

        /// Body text
        #[arg(long, short = 'b')]
        body: Option<String>,
    },

    /// Move an open item to in_progress on a session
    Start {
        /// Work item id
        id: String,

        /// Session that will work on the item
        #[arg(long, short = 's')]
        session: String,
    },

    /// Move an in-progress item back to open and release its session
    Stop {
        /// Work item id
        id: String,
    },

    /// Mark an item done (closing it and its ancestors when eligible)
    Done {
        /// Work item id
        id: String,
    },

    /// Set fields on a work item
    Set {
        /// Work item id
        id: String,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New body
        #[arg(long)]
        body: Option<String>,

        /// New agent role
        #[arg(long)]
        role: Option<String>,

        /// Field assignments (key=value)
        assignments: Vec<String>,
    },

    /// Delete a work item without children
    #[command(alias = "delete")]
    Rm {
        /// Work item id
        id: String,
    },

    /// Print change events made by other processes until Ctrl-C
    Watch,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let format = cli.format;

    match cli.command {
        Commands::Init => commands::init(&data_dir, format),
        Commands::List { status, work_type } => {
            commands::list(&data_dir, status.as_deref(), work_type.as_deref(), format)
        }
        Commands::Get { id } => commands::get(&data_dir, &id, format),
        Commands::New {
            title,
            work_type,
            parent,
            role,
            body,
        } => commands::new_item(
            &data_dir,
            commands::NewArgs {
                title,
                work_type,
                parent,
                role,
                body,
            },
            format,
        ),
        Commands::Start { id, session } => commands::start(&data_dir, &id, &session, format),
        Commands::Stop { id } => commands::stop(&data_dir, &id, format),
        Commands::Done { id } => commands::done(&data_dir, &id, format),
        Commands::Set {
            id,
            title,
            body,
            role,
            assignments,
        } => commands::set(
            &data_dir,
            &id,
            commands::SetArgs {
                title,
                body,
                role,
                assignments,
            },
            format,
        ),
        Commands::Rm { id } => commands::remove(&data_dir, &id, format),
        Commands::Watch => commands::watch(&data_dir, format),
    }
}
