use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use stanhub_schema::EffectiveConfig;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::config::{ConfigResolver, FALLBACK_CONFIG, PRIMARY_CONFIG};
use crate::orchestrator::{AnalysisOrchestrator, AnalysisRequest};
use crate::snapshot::ChangeSnapshotter;

pub const DEFAULT_PERIOD: Duration = Duration::from_secs(1);

const SOURCE_PATTERNS: [&str; 1] = ["*.php"];

/// Re-runs the analysis when watched sources or the config file change.
pub struct WatchLoop {
    project_root: PathBuf,
    resolver: ConfigResolver,
    orchestrator: Arc<AnalysisOrchestrator>,
    period: Duration,
    config: EffectiveConfig,
    sources: ChangeSnapshotter,
    config_files: ChangeSnapshotter,
}

impl WatchLoop {
    pub fn new(
        resolver: ConfigResolver,
        orchestrator: Arc<AnalysisOrchestrator>,
        period: Duration,
    ) -> Result<Self> {
        let project_root = orchestrator.project_root().to_path_buf();
        let config = resolver.resolve(&project_root);
        let sources = ChangeSnapshotter::new(source_roots(&project_root, &config), &SOURCE_PATTERNS)?;
        let config_files = ChangeSnapshotter::new::<&str>(
            vec![
                project_root.join(PRIMARY_CONFIG),
                project_root.join(FALLBACK_CONFIG),
            ],
            &[],
        )?;

        Ok(Self {
            project_root,
            resolver,
            orchestrator,
            period,
            config,
            sources,
            config_files,
        })
    }

    pub fn config(&self) -> &EffectiveConfig {
        &self.config
    }

    pub fn watched_roots(&self) -> &[PathBuf] {
        self.sources.roots()
    }

    /// One watch cycle. Both snapshots are refreshed every time; a request is
    /// returned when either changed, built from the latest resolved config.
    ///
    /// The tree walk runs on the calling task. On the single-threaded runtime
    /// HTTP handling waits for it, so very large source trees delay requests
    /// by up to one walk per tick.
    pub fn check(&mut self) -> Option<AnalysisRequest> {
        let sources_changed = self.sources.has_changed();
        let config_changed = self.config_files.has_changed();

        if config_changed {
            let config = self.resolver.resolve(&self.project_root);
            if config.paths != self.config.paths {
                tracing::info!(paths = ?config.paths, "watched paths changed");
                self.sources.set_roots(source_roots(&self.project_root, &config));
            }
            self.config = config;
        }

        (sources_changed || config_changed).then(|| AnalysisRequest::from_config(&self.config))
    }

    pub async fn run(mut self) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; the baseline is already taken.
        ticker.tick().await;

        tracing::info!(
            roots = ?self.sources.roots(),
            period_ms = self.period.as_millis() as u64,
            "watching for changes"
        );

        loop {
            ticker.tick().await;
            if let Some(request) = self.check() {
                tracing::info!(paths = %request.paths, level = request.level, "change detected");
                self.orchestrator.trigger(request);
            }
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

fn source_roots(project_root: &Path, config: &EffectiveConfig) -> Vec<PathBuf> {
    config
        .paths
        .iter()
        .map(|path| project_root.join(path))
        .collect()
}
