pub mod codec;
pub mod composer;
pub mod config;
pub mod orchestrator;
pub mod process;
pub mod runner;
pub mod snapshot;
pub mod watch;

pub use codec::{ConfigCodec, NeonCodec};
pub use config::ConfigResolver;
pub use orchestrator::{AnalysisOrchestrator, AnalysisRequest, AnalysisRun};
pub use process::{ProcessEvent, ProcessStream};
pub use runner::PhpStanRunner;
pub use snapshot::{ChangeSnapshotter, Snapshot};
pub use watch::WatchLoop;
