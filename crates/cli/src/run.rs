// Run command wiring (composition root for one orchestrated job)

use crate::settings::{SchedulerKind, Settings};
use anyhow::{Context, Result};
use batchpilot_core::application::{
    cancel_channel, BatchSystem, CommunicationChannel, GridEngine, JobLifecycleOrchestrator, Lsf,
    ProjectService, SchedulerAdapter,
};
use batchpilot_core::domain::RunOutcome;
use batchpilot_core::port::id_provider::UuidProvider;
use batchpilot_core::port::{
    FileSync, JobConsole, RemoteCommandRunner, Sleeper, StdoutConsole, TokioSleeper,
};
use batchpilot_infra_system::{LocalFileSync, ShellCommandRunner};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub async fn run_project(
    settings: &Settings,
    service: &ProjectService,
    project: &str,
    result_dir: Option<PathBuf>,
) -> Result<RunOutcome> {
    let config = service.get(project).await?;
    let result_dir = result_dir.unwrap_or_else(|| settings.result_root.join(project));
    tokio::fs::create_dir_all(&result_dir)
        .await
        .with_context(|| format!("Failed to create {}", result_dir.display()))?;

    // DI wiring
    let host_dir = settings.host_dir_for(project);
    let file_sync: Arc<dyn FileSync> =
        Arc::new(LocalFileSync::new(settings.host_mount_for(project)));
    let mut runner = ShellCommandRunner::new(settings.launcher.clone(), host_dir.as_str())?
        .with_export("JOB_NAME", project);
    if let Some(secs) = settings.command_timeout_secs {
        runner = runner.with_timeout(Duration::from_secs(secs));
    }
    let runner: Arc<dyn RemoteCommandRunner> = Arc::new(runner);
    let console: Arc<dyn JobConsole> = Arc::new(StdoutConsole);
    let sleeper: Arc<dyn Sleeper> = Arc::new(TokioSleeper);
    let channel = CommunicationChannel::new(file_sync, settings.controller_dir(project));

    let batch: Arc<dyn BatchSystem> = match settings.scheduler {
        SchedulerKind::GridEngine => Arc::new(SchedulerAdapter::new(
            GridEngine,
            runner.clone(),
            channel.clone(),
            console.clone(),
            sleeper.clone(),
        )),
        SchedulerKind::Lsf => Arc::new(SchedulerAdapter::new(
            Lsf,
            runner.clone(),
            channel.clone(),
            console.clone(),
            sleeper.clone(),
        )),
    };
    let orchestrator = JobLifecycleOrchestrator::new(
        batch,
        runner,
        channel,
        console,
        sleeper,
        Arc::new(UuidProvider),
    );

    // Ctrl+C cancels the poll loop; the job is killed on the scheduler
    let (cancel_handle, cancel_token) = cancel_channel();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            cancel_handle.cancel();
        }
    });

    info!(
        project = %project,
        scheduler = ?settings.scheduler,
        host_dir = %host_dir,
        "Starting run"
    );
    let started_at = service.now_millis();
    let result = orchestrator
        .execute(&config, &result_dir, cancel_token)
        .await;
    signal_task.abort();

    let outcome = result?;
    service.record_run(project, &outcome, started_at).await?;
    Ok(outcome)
}
