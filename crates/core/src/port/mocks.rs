// ============================================================================
// Mock Implementations for Testing
// ============================================================================
//
// `FakeHost` plays both the remote command runner and the file sync: scripts
// are answered from rules keyed by a substring of the script, and any script
// redirecting into the communication file leaves its answer there for the
// next fetch.

use super::config_store::{BuildConfigStore, RunHistory};
use super::console::JobConsole;
use super::file_sync::{FileSync, SyncError};
use super::id_provider::IdProvider;
use super::remote_exec::{CommandOutput, RemoteCommandRunner, RemoteError};
use super::sleeper::Sleeper;
use super::time_provider::TimeProvider;
use crate::application::constants::COMMUNICATION_FILE;
use crate::domain::{BuildConfig, RunRecord};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

struct Rule {
    needle: String,
    responses: VecDeque<String>,
}

/// Scripted execution host
#[derive(Default)]
pub struct FakeHost {
    rules: Mutex<Vec<Rule>>,
    scripts: Mutex<Vec<String>>,
    communication: Mutex<String>,
    sent: Mutex<Vec<PathBuf>>,
    fetched: Mutex<Vec<(Vec<String>, PathBuf)>>,
    fail_fetch_of: Mutex<Option<String>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer scripts containing `needle` with `responses` in order
    ///
    /// The last response repeats once the others are used up. Rules are
    /// checked in registration order.
    pub fn with_rule<I, S>(self, needle: &str, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules.lock().unwrap().push(Rule {
            needle: needle.to_string(),
            responses: responses.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Make every fetch of `file` fail
    pub fn failing_fetch_of(self, file: &str) -> Self {
        *self.fail_fetch_of.lock().unwrap() = Some(file.to_string());
        self
    }

    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }

    pub fn count_scripts(&self, needle: &str) -> usize {
        self.scripts
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.contains(needle))
            .count()
    }

    pub fn sent_files(&self) -> Vec<PathBuf> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fetches(&self) -> Vec<(Vec<String>, PathBuf)> {
        self.fetched.lock().unwrap().clone()
    }

    fn next_response(&self, script: &str) -> String {
        let mut rules = self.rules.lock().unwrap();
        let Some(rule) = rules.iter_mut().find(|r| script.contains(&r.needle)) else {
            return String::new();
        };
        if rule.responses.len() > 1 {
            rule.responses.pop_front().unwrap_or_default()
        } else {
            rule.responses.front().cloned().unwrap_or_default()
        }
    }
}

#[async_trait]
impl RemoteCommandRunner for FakeHost {
    async fn run(&self, script: &str) -> std::result::Result<CommandOutput, RemoteError> {
        self.scripts.lock().unwrap().push(script.to_string());
        let response = self.next_response(script);

        if script.contains(&format!("> {}", COMMUNICATION_FILE)) {
            *self.communication.lock().unwrap() = response;
            Ok(CommandOutput {
                exit_code: Some(0),
                ..Default::default()
            })
        } else {
            Ok(CommandOutput {
                exit_code: Some(0),
                stdout: response,
                stderr: String::new(),
            })
        }
    }
}

#[async_trait]
impl FileSync for FakeHost {
    async fn send_to_host(&self, files: &[PathBuf]) -> std::result::Result<(), SyncError> {
        self.sent.lock().unwrap().extend(files.iter().cloned());
        Ok(())
    }

    async fn fetch_from_host(
        &self,
        files: &[String],
        destination: &Path,
    ) -> std::result::Result<(), SyncError> {
        self.fetched
            .lock()
            .unwrap()
            .push((files.to_vec(), destination.to_path_buf()));

        if let Some(bad) = self.fail_fetch_of.lock().unwrap().as_deref() {
            if files.iter().any(|f| f == bad) {
                return Err(SyncError::Transfer(format!("{} unavailable", bad)));
            }
        }

        if files.iter().any(|f| f == COMMUNICATION_FILE) {
            let content = self.communication.lock().unwrap().clone();
            std::fs::create_dir_all(destination)
                .and_then(|_| std::fs::write(destination.join(COMMUNICATION_FILE), content))
                .map_err(|e| SyncError::Transfer(e.to_string()))?;
        }
        Ok(())
    }
}

/// Console that keeps every printed line
#[derive(Default)]
pub struct RecordingConsole {
    lines: Mutex<Vec<String>>,
}

impl RecordingConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn text(&self) -> String {
        self.lines().join("\n")
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.contains(needle))
            .count()
    }
}

impl JobConsole for RecordingConsole {
    fn line(&self, text: &str) {
        self.lines.lock().unwrap().push(text.to_string());
    }
}

/// Sleeper that returns immediately and records each requested duration
///
/// With `pending_after(n)` the (n+1)-th sleep never completes, which lets
/// tests deliver a cancellation while the poll loop is waiting.
#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
    pending_after: Option<usize>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_after(completed: usize) -> Self {
        Self {
            sleeps: Mutex::new(Vec::new()),
            pending_after: Some(completed),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        let count = {
            let mut sleeps = self.sleeps.lock().unwrap();
            sleeps.push(duration);
            sleeps.len()
        };
        match self.pending_after {
            Some(limit) if count > limit => std::future::pending::<()>().await,
            _ => tokio::task::yield_now().await,
        }
    }
}

/// Deterministic ids: `id-1`, `id-2`, ...
#[derive(Default)]
pub struct SequentialIdProvider {
    counter: AtomicUsize,
}

impl IdProvider for SequentialIdProvider {
    fn generate_id(&self) -> String {
        format!("id-{}", self.counter.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// Clock that advances by one second per read
pub struct SteppingTimeProvider {
    now: AtomicU64,
}

impl SteppingTimeProvider {
    pub fn starting_at(millis: u64) -> Self {
        Self {
            now: AtomicU64::new(millis),
        }
    }
}

impl TimeProvider for SteppingTimeProvider {
    fn now_millis(&self) -> i64 {
        self.now.fetch_add(1000, Ordering::SeqCst) as i64
    }
}

/// In-memory configuration store and run history
#[derive(Default)]
pub struct InMemoryStore {
    configs: Mutex<HashMap<String, BuildConfig>>,
    runs: Mutex<Vec<RunRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BuildConfigStore for InMemoryStore {
    async fn load(&self, project: &str) -> Result<Option<BuildConfig>> {
        Ok(self.configs.lock().unwrap().get(project).cloned())
    }

    async fn save(&self, config: &BuildConfig) -> Result<()> {
        self.configs
            .lock()
            .unwrap()
            .insert(config.project.clone(), config.clone());
        Ok(())
    }

    async fn list_projects(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.configs.lock().unwrap().keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl RunHistory for InMemoryStore {
    async fn record(&self, run: &RunRecord) -> Result<()> {
        self.runs.lock().unwrap().push(run.clone());
        Ok(())
    }

    async fn recent(&self, project: &str, limit: u32) -> Result<Vec<RunRecord>> {
        let runs = self.runs.lock().unwrap();
        Ok(runs
            .iter()
            .rev()
            .filter(|r| r.project == project)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
