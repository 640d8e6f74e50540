//! Job lifecycle scenarios against a scripted execution host
//!
//! Every remote command is answered by `FakeHost`; no scheduler is needed.

use std::sync::Arc;
use std::time::Duration;

use batchpilot_core::application::{
    cancel_channel, CancelToken, CommunicationChannel, Dialect, GridEngine,
    JobLifecycleOrchestrator, Lsf, SchedulerAdapter,
};
use batchpilot_core::domain::BuildConfig;
use batchpilot_core::port::mocks::{
    FakeHost, RecordingConsole, RecordingSleeper, SequentialIdProvider,
};
use tempfile::TempDir;

const ACK: &str = "Your job 42 (\"build\") has been submitted";

struct Harness {
    dir: TempDir,
    host: Arc<FakeHost>,
    console: Arc<RecordingConsole>,
    sleeper: Arc<RecordingSleeper>,
    orchestrator: JobLifecycleOrchestrator,
}

fn harness<D: Dialect + 'static>(dialect: D, host: FakeHost, sleeper: RecordingSleeper) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let host = Arc::new(host.with_rule("pwd", ["/scratch/ci\n"]));
    let console = Arc::new(RecordingConsole::new());
    let sleeper = Arc::new(sleeper);
    let channel = CommunicationChannel::new(host.clone(), dir.path().join("ci"));
    let adapter = SchedulerAdapter::new(
        dialect,
        host.clone(),
        channel.clone(),
        console.clone(),
        sleeper.clone(),
    );
    let orchestrator = JobLifecycleOrchestrator::new(
        Arc::new(adapter),
        host.clone(),
        channel,
        console.clone(),
        sleeper.clone(),
        Arc::new(SequentialIdProvider::default()),
    );
    Harness {
        dir,
        host,
        console,
        sleeper,
        orchestrator,
    }
}

fn config() -> BuildConfig {
    let mut config = BuildConfig::new("ci", "make test", "all.q");
    config.poll_interval_minutes = 0.5;
    config
}

/// Running, then gone from the listing, then accounting reports success
#[tokio::test]
async fn test_scenario_running_then_accounted_success() {
    let h = harness(
        GridEngine,
        FakeHost::new()
            .with_rule("qsub", [ACK])
            .with_rule("qstat", ["42 0.555 build ci r 01/01/2024 10:00:00 all.q\n", ""])
            .with_rule("qacct", ["qname all.q\nexit_status 0\n"]),
        RecordingSleeper::new(),
    );

    let succeeded = h
        .orchestrator
        .run(&config(), h.dir.path(), CancelToken::never())
        .await
        .unwrap();

    assert!(succeeded);
    let lines = h.console.lines();
    assert!(lines.contains(&ACK.to_string()));
    assert!(lines.contains(&"JOB STATUS: r".to_string()));
    assert!(lines.contains(&"JOB STATUS: 0".to_string()));
    assert_eq!(h.sleeper.sleeps(), vec![Duration::from_secs(30); 2]);
    assert_eq!(h.console.count_containing("Job exited with following errors"), 0);
}

/// Malformed acknowledgment: sentinel id, immediate failed submission
#[tokio::test]
async fn test_scenario_malformed_ack_fails_without_polling_scheduler() {
    let h = harness(
        GridEngine,
        FakeHost::new().with_rule("qsub", ["qsub: Unknown option -Z\nUsage: qsub [options]\n"]),
        RecordingSleeper::new(),
    );

    let outcome = h
        .orchestrator
        .execute(&config(), h.dir.path(), CancelToken::never())
        .await
        .unwrap();

    assert!(!outcome.succeeded);
    assert_eq!(outcome.job_id, "0");
    assert_eq!(outcome.final_status, "J");
    assert_eq!(h.console.count_containing("    qsub: Unknown option -Z"), 1);
    assert_eq!(h.console.count_containing("Job exited with following errors"), 1);
    assert_eq!(h.console.count_containing("Exited with exit status J"), 1);
    let lines = h.console.lines();
    let header = lines
        .iter()
        .position(|l| l == "Job exited with following errors:")
        .unwrap();
    assert_eq!(
        &lines[header + 1..header + 3],
        &["qsub: Unknown option -Z", "Usage: qsub [options]"]
    );
    assert_eq!(h.host.count_scripts("tail -n +1 sge.log"), 0);
    assert_eq!(h.host.count_scripts("qstat"), 0);
    assert_eq!(h.host.count_scripts("qacct"), 0);
    // Cleanup still ran
    assert_eq!(h.host.count_scripts("rm -rf JOB-"), 1);
    assert_eq!(h.host.count_scripts("rm -f 'JOB-id-1'"), 1);
}

/// Partial output is streamed exactly once, unparsable counts are skipped
#[tokio::test]
async fn test_progress_is_streamed_exactly_once() {
    let running = "42 0.555 build ci r 01/01/2024 10:00:00 all.q\n";
    let h = harness(
        GridEngine,
        FakeHost::new()
            .with_rule("qsub", [ACK])
            .with_rule("qstat", [running, running, running, running, ""])
            .with_rule("qacct", ["exit_status 0\n"])
            .with_rule(
                "wc -l",
                [
                    "2 jobProgress\n",
                    "wc: jobProgress: No such file or directory\n",
                    "2 jobProgress\n",
                    "5 jobProgress\n",
                ],
            )
            .with_rule("tail -n +1 jobProgress | head -n 2", ["line 1\nline 2\n"])
            .with_rule("tail -n +3 jobProgress | head -n 3", ["line 3\nline 4\nline 5\n"])
            .with_rule("tail -n +6 sge.log", ["line 6\n"]),
        RecordingSleeper::new(),
    );

    let succeeded = h
        .orchestrator
        .run(&config(), h.dir.path(), CancelToken::never())
        .await
        .unwrap();

    assert!(succeeded);
    let chunks: Vec<String> = h
        .console
        .lines()
        .into_iter()
        .filter(|l| l.starts_with("line "))
        .collect();
    assert_eq!(chunks, vec!["line 1\nline 2", "line 3\nline 4\nline 5", "line 6"]);
    assert_eq!(h.console.count_containing("JOB OUTPUT START"), 3);
    assert_eq!(h.host.count_scripts("| head -n"), 2);
}

/// Cancellation while waiting between polls kills the job
#[tokio::test]
async fn test_cancellation_during_polling() {
    let h = harness(
        Lsf,
        FakeHost::new()
            .with_rule("bsub", [ACK])
            .with_rule("bjobs", ["42 ci w normal\n"])
            .with_rule("bkill", ["Job <42> is being terminated\n"]),
        RecordingSleeper::pending_after(2),
    );
    let (handle, token) = cancel_channel();

    let config = config();
    let run = h.orchestrator.execute(&config, h.dir.path(), token);
    let interrupt = async {
        while h.sleeper.sleeps().len() < 3 {
            tokio::task::yield_now().await;
        }
        handle.cancel();
    };
    let (outcome, _) = tokio::join!(run, interrupt);
    let outcome = outcome.unwrap();

    assert!(!outcome.succeeded);
    assert_eq!(outcome.final_status, "ABORTED");
    assert_eq!(h.host.count_scripts("bjobs"), 2);
    assert_eq!(h.host.count_scripts("bkill\" 42"), 1);
    assert_eq!(h.console.count_containing("Job <42> is being terminated"), 1);
    assert_eq!(h.console.count_containing("Job exited with following errors"), 0);
    assert_eq!(h.host.count_scripts("rm -rf JOB-"), 1);
}
