//! Batchpilot CLI - run build jobs through a batch scheduler

mod logging;
mod run;
mod settings;

use anyhow::{Context, Result};
use batchpilot_core::application::ProjectService;
use batchpilot_core::domain::{split_file_list, BuildConfig, RunRecord};
use batchpilot_core::port::id_provider::UuidProvider;
use batchpilot_core::port::time_provider::{format_millis, SystemTimeProvider};
use batchpilot_infra_sqlite::{
    create_pool, run_migrations, SqliteBuildConfigStore, SqliteRunHistory,
};
use clap::{Parser, Subcommand};
use colored::Colorize;
use settings::Settings;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tabled::{Table, Tabled};
use tracing::info;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "batchpilot")]
#[command(about = "Run build jobs through a batch scheduler", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (default: batchpilot.toml in the platform config dir)
    #[arg(long = "settings", global = true, env = "BATCHPILOT_SETTINGS")]
    settings_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a project's job and follow it to completion
    Run {
        project: String,

        /// Download destination when the project names none
        #[arg(long)]
        result_dir: Option<PathBuf>,
    },

    /// Manage project build configurations
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Manage files uploaded into a project's controller directory
    #[command(subcommand)]
    Upload(UploadCommand),

    /// Show recent runs of a project
    History {
        project: String,

        /// Number of runs to show
        #[arg(short = 'n', long, default_value = "10")]
        limit: u32,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Create or replace a project configuration
    Set {
        project: String,

        /// Scheduler queue
        #[arg(short, long)]
        queue: String,

        /// Job body
        #[arg(long, required_unless_present = "script_file", conflicts_with = "script_file")]
        script: Option<String>,

        /// Read the job body from a file
        #[arg(long)]
        script_file: Option<PathBuf>,

        /// Comma-separated host files to download after the job
        #[arg(long, default_value = "")]
        download: String,

        /// Download destination (default: the run's result directory)
        #[arg(long)]
        destination: Option<PathBuf>,

        /// Comma-separated controller files to send before the job
        #[arg(long, default_value = "")]
        send: String,

        /// Minutes between status checks
        #[arg(long, default_value = "1")]
        interval: f64,

        /// Ask the scheduler to send email notifications
        #[arg(long)]
        email: bool,
    },

    /// Print a project configuration
    Show { project: String },

    /// List configured projects
    List,
}

#[derive(Subcommand)]
enum UploadCommand {
    /// Copy a file into the project directory and stage it for every run
    Add { project: String, file: PathBuf },

    /// Stop staging an uploaded file and delete it
    Remove { project: String, name: String },
}

#[derive(Tabled)]
struct RunRow {
    #[tabled(rename = "Run")]
    id: String,
    #[tabled(rename = "Job")]
    job_id: String,
    #[tabled(rename = "Status")]
    final_status: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Started")]
    started: String,
    #[tabled(rename = "Finished")]
    finished: String,
}

impl From<RunRecord> for RunRow {
    fn from(run: RunRecord) -> Self {
        Self {
            id: run.id,
            job_id: run.job_id,
            final_status: run.final_status,
            result: if run.succeeded { "ok" } else { "failed" }.to_string(),
            started: format_millis(run.started_at),
            finished: format_millis(run.finished_at),
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    logging::init()?;
    info!("Batchpilot v{} starting", VERSION);

    let settings = Settings::load(cli.settings_file.as_deref())?;
    info!(db_path = %settings.db_path.display(), "Opening database");
    let pool = create_pool(&settings.db_path)
        .await
        .context("DB pool creation failed")?;
    run_migrations(&pool).await.context("Migration failed")?;

    let time_provider = Arc::new(SystemTimeProvider);
    let service = ProjectService::new(
        Arc::new(SqliteBuildConfigStore::new(pool.clone(), time_provider.clone())),
        Arc::new(SqliteRunHistory::new(pool)),
        Arc::new(UuidProvider),
        time_provider,
    );

    match cli.command {
        Commands::Run {
            project,
            result_dir,
        } => {
            let outcome = run::run_project(&settings, &service, &project, result_dir).await?;
            println!();
            if outcome.succeeded {
                println!("{}", format!("✓ Job {} succeeded", outcome.job_id).green().bold());
                return Ok(ExitCode::SUCCESS);
            }
            println!(
                "{}",
                format!(
                    "✗ Job {} failed (final status {})",
                    outcome.job_id, outcome.final_status
                )
                .red()
                .bold()
            );
            return Ok(ExitCode::FAILURE);
        }

        Commands::Config(ConfigCommand::Set {
            project,
            queue,
            script,
            script_file,
            download,
            destination,
            send,
            interval,
            email,
        }) => {
            let script = match (script, script_file) {
                (Some(script), _) => script,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (None, None) => anyhow::bail!("--script or --script-file is required"),
            };

            let mut config = BuildConfig::new(project, script, queue);
            config.files_to_download = split_file_list(&download);
            config.files_to_send = split_file_list(&send).into_iter().map(PathBuf::from).collect();
            config.download_destination = destination;
            config.poll_interval_minutes = interval;
            config.send_email = email;

            let saved = service.configure(config).await?;
            println!(
                "{}",
                format!("✓ Project {} configured", saved.project).green().bold()
            );
        }

        Commands::Config(ConfigCommand::Show { project }) => {
            let config = service.get(&project).await?;
            println!("{}", format!("Project {}", config.project).cyan().bold());
            println!("  {} {}", "Queue:".bold(), config.queue);
            println!("  {} {} min", "Poll interval:".bold(), config.poll_interval_minutes);
            println!("  {} {}", "Email:".bold(), config.send_email);
            println!("  {} {}", "Download:".bold(), config.files_to_download.join(", "));
            println!(
                "  {} {}",
                "Destination:".bold(),
                config
                    .download_destination
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(run result directory)".to_string())
            );
            let sent: Vec<String> = config
                .files_to_send
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            println!("  {} {}", "Send:".bold(), sent.join(", "));
            println!("  {} {}", "Uploaded:".bold(), config.uploaded_files.join(", "));
            println!();
            println!("{}", "Job script:".bold());
            println!("{}", config.job_script);
        }

        Commands::Config(ConfigCommand::List) => {
            let projects = service.list_projects().await?;
            if projects.is_empty() {
                println!("{}", "No projects configured".yellow());
            }
            for project in projects {
                println!("{}", project);
            }
        }

        Commands::Upload(UploadCommand::Add { project, file }) => {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .with_context(|| format!("{} has no file name", file.display()))?;
            // Validate before touching the filesystem
            service.get(&project).await?;
            let dir = settings.controller_dir(&project);
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            std::fs::copy(&file, dir.join(&name))
                .with_context(|| format!("Failed to copy {}", file.display()))?;
            service.register_upload(&project, &name).await?;
            println!("{}", format!("✓ Uploaded {} to {}", name, project).green().bold());
        }

        Commands::Upload(UploadCommand::Remove { project, name }) => {
            if !service.remove_upload(&project, &name).await? {
                println!("{}", format!("{} is not uploaded to {}", name, project).yellow());
                return Ok(ExitCode::FAILURE);
            }
            let path = settings.controller_dir(&project).join(&name);
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    return Err(e).with_context(|| format!("Failed to delete {}", path.display()));
                }
            }
            println!("{}", format!("✓ Removed {} from {}", name, project).green().bold());
        }

        Commands::History { project, limit } => {
            let runs = service.recent_runs(&project, limit).await?;
            if runs.is_empty() {
                println!("{}", format!("No runs recorded for {}", project).yellow());
            } else {
                println!("{}", format!("Recent runs of {}", project).cyan().bold());
                println!();
                let rows: Vec<RunRow> = runs.into_iter().map(RunRow::from).collect();
                println!("{}", Table::new(rows));
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
