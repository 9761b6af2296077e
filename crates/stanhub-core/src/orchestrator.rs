use std::path::{Path, PathBuf};
use std::sync::Arc;

use stanhub_bus::BroadcastBus;
use stanhub_schema::{EffectiveConfig, StatusPayload};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;

use crate::process::{self, ProcessEvent};
use crate::runner::PhpStanRunner;

pub const DEFAULT_LEVEL: u32 = 5;
pub const DEFAULT_PATH: &str = "src";

/// Parameters of one analysis pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    /// Space-joined list of paths, passed to the analyser verbatim.
    pub paths: String,
    pub level: u32,
    pub generate_baseline: bool,
}

impl AnalysisRequest {
    pub fn new(paths: impl Into<String>, level: u32) -> Self {
        Self {
            paths: paths.into(),
            level,
            generate_baseline: false,
        }
    }

    pub fn from_config(config: &EffectiveConfig) -> Self {
        Self::new(config.paths_arg(), config.level)
    }
}

impl Default for AnalysisRequest {
    fn default() -> Self {
        Self::new(DEFAULT_PATH, DEFAULT_LEVEL)
    }
}

/// Output accumulated for a single analyser invocation.
#[derive(Debug, Clone)]
pub struct AnalysisRun {
    pub command: String,
    pub working_directory: PathBuf,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: Option<i32>,
}

impl AnalysisRun {
    pub fn new(command: impl Into<String>, working_directory: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            working_directory: working_directory.into(),
            stdout: Vec::new(),
            stderr: Vec::new(),
            exit_code: None,
        }
    }

    pub fn absorb(&mut self, event: ProcessEvent) {
        match event {
            ProcessEvent::Stdout(chunk) => self.stdout.extend_from_slice(&chunk),
            ProcessEvent::Stderr(chunk) => self.stderr.extend_from_slice(&chunk),
            ProcessEvent::Exited(code) => self.exit_code = Some(code),
        }
    }

    /// Records a shell that could not be started as a failed run.
    pub fn spawn_failed(&mut self, error: &anyhow::Error) {
        self.stderr = format!("{error:#}").into_bytes();
        self.exit_code = Some(-1);
    }

    /// Non-zero exit with stderr output is a failed run; anything else
    /// forwards stdout unchanged.
    pub fn payload(&self) -> StatusPayload {
        let code = self.exit_code.unwrap_or(-1);
        if code != 0 && !self.stderr.is_empty() {
            return StatusPayload::failure(code, &String::from_utf8_lossy(&self.stderr));
        }
        StatusPayload::Report(String::from_utf8_lossy(&self.stdout).into_owned())
    }
}

/// Runs the analyser and publishes `running` followed by exactly one final
/// payload per run.
///
/// Runs are serialized: a run triggered while another is in flight waits for
/// it to finish before announcing itself, so payload pairs never interleave.
pub struct AnalysisOrchestrator {
    runner: PhpStanRunner,
    bus: Arc<BroadcastBus>,
    slot: Mutex<()>,
}

impl AnalysisOrchestrator {
    pub fn new(runner: PhpStanRunner, bus: Arc<BroadcastBus>) -> Self {
        Self {
            runner,
            bus,
            slot: Mutex::new(()),
        }
    }

    pub fn project_root(&self) -> &Path {
        self.runner.cwd()
    }

    /// Starts a run in the background and returns immediately.
    pub fn trigger(self: &Arc<Self>, request: AnalysisRequest) -> JoinHandle<StatusPayload> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move { orchestrator.analyse(request).await })
    }

    pub async fn analyse(&self, request: AnalysisRequest) -> StatusPayload {
        let _slot = self.slot.lock().await;

        self.bus.broadcast(StatusPayload::Running.to_message()).await;

        let command =
            self.runner
                .command(&request.paths, request.level, request.generate_baseline);
        tracing::info!(command = %command, "running analysis");

        let mut run = AnalysisRun::new(command, self.runner.cwd());
        match process::spawn(&run.command, &run.working_directory) {
            Ok(mut events) => {
                while let Some(event) = events.next().await {
                    run.absorb(event);
                }
            }
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "failed to start analyser");
                run.spawn_failed(&e);
            }
        }

        let payload = run.payload();
        if payload.is_failure() {
            tracing::error!(
                exit_code = run.exit_code.unwrap_or(-1),
                stderr = %String::from_utf8_lossy(&run.stderr),
                "PHPStan failed"
            );
        } else {
            tracing::info!(exit_code = run.exit_code.unwrap_or(-1), "analysis finished");
            tracing::debug!(output = %String::from_utf8_lossy(&run.stdout), "PHPStan output");
        }

        let delivered = self.bus.broadcast(payload.to_message()).await;
        tracing::debug!(subscribers = delivered, "published analysis result");
        payload
    }
}
