use std::path::PathBuf;
use std::sync::Arc;

use stanhub_bus::BroadcastBus;
use stanhub_core::{AnalysisOrchestrator, ConfigResolver};

pub const DEFAULT_DEV_SERVER: &str = "http://localhost:5173";

/// Shared application state accessible from all route handlers.
#[derive(Clone)]
pub struct AppState {
    /// Canonical root of the analysed project
    pub project_root: PathBuf,
    /// Directory holding the built UI assets and `.vite/manifest.json`
    pub build_dir: PathBuf,
    /// Origin of the frontend dev server used by `/?dev`
    pub dev_server: String,
    pub resolver: ConfigResolver,
    pub orchestrator: Arc<AnalysisOrchestrator>,
    /// Bus feeding the WebSocket subscribers
    pub bus: Arc<BroadcastBus>,
}
