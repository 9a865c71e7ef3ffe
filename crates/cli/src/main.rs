//! Story point estimation CLI
//!
//! A command-line tool for predicting story points, suggesting schedule
//! buffers and training the estimation model from a project database.

mod commands;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::{estimate, model};
use estimation_lib::observability::render_metrics;
use estimation_lib::{
    EstimationService, EstimatorConfig, Priority, SqliteTaskStore, StructuredLogger, TaskType,
};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Story point estimation CLI
#[derive(Parser)]
#[command(name = "pm-estimate")]
#[command(author, version, about = "CLI for story point estimation", long_about = None)]
pub struct Cli {
    /// Task database (can also be set via PM_DB_PATH env var)
    #[arg(long, global = true, env = "PM_DB_PATH")]
    pub db: Option<PathBuf>,

    /// Model artifact path (can also be set via PM_MODEL_PATH env var)
    #[arg(long, global = true, env = "PM_MODEL_PATH")]
    pub model: Option<PathBuf>,

    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: output::OutputFormat,

    /// Print Prometheus metrics after the command
    #[arg(long, global = true)]
    pub dump_metrics: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Predict story points for a task
    Predict {
        /// Task ID
        task_id: String,

        /// Estimate as if the task had this type
        #[arg(long = "type")]
        task_type: Option<TaskType>,
    },

    /// Suggest a schedule buffer for a task
    Buffer {
        /// Task ID
        task_id: String,
    },

    /// Train the model on completed tasks
    Train {
        /// Restrict training to one project
        #[arg(long)]
        project: Option<String>,
    },

    /// Show learning insights from completed tasks
    Insights {
        /// Restrict insights to one project
        #[arg(long)]
        project: Option<String>,
    },

    /// Score an ad-hoc task without a database
    Score {
        /// Task type (epic, story, task, bug, subtask)
        #[arg(long = "type", default_value = "task")]
        task_type: TaskType,

        /// Priority (critical, high, medium, low)
        #[arg(long, default_value = "medium")]
        priority: Priority,

        /// Task title
        #[arg(long)]
        title: String,

        /// Task description
        #[arg(long)]
        description: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let mut config = EstimatorConfig::load().context("Failed to load configuration")?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(model) = cli.model {
        config.model_path = model;
    }

    match cli.command {
        Commands::Predict { task_id, task_type } => {
            let service = open_service(&config)?;
            estimate::predict(&service, &task_id, task_type, cli.format)?;
        }
        Commands::Buffer { task_id } => {
            let service = open_service(&config)?;
            estimate::buffer(&service, &task_id, cli.format)?;
        }
        Commands::Train { project } => {
            let mut service = open_service(&config)?;
            model::train(&mut service, project.as_deref(), cli.format)?;
        }
        Commands::Insights { project } => {
            let mut service = open_service(&config)?;
            model::insights(&mut service, project.as_deref(), cli.format)?;
        }
        Commands::Score {
            task_type,
            priority,
            title,
            description,
        } => {
            estimate::score(task_type, priority, title, description, cli.format)?;
        }
    }

    if cli.dump_metrics {
        print!("{}", render_metrics());
    }

    Ok(())
}

fn open_service(config: &EstimatorConfig) -> Result<EstimationService<SqliteTaskStore>> {
    let store = SqliteTaskStore::open(&config.db_path).with_context(|| {
        format!("Failed to open task database {}", config.db_path.display())
    })?;
    let service = EstimationService::from_config(store, config);
    StructuredLogger::new("pm-estimate")
        .log_startup(env!("CARGO_PKG_VERSION"), service.model().is_trained());
    Ok(service)
}
