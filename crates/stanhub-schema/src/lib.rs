use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Message pushed to every connected browser tab.
///
/// `Report` carries the analyser's stdout untouched: on success the tool
/// already emits the JSON document the UI expects, so it is forwarded
/// without being parsed or re-encoded.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusPayload {
    Running,
    Report(String),
    Failed(AnalysisReport),
}

impl StatusPayload {
    /// Synthetic report for a run that exited non-zero with stderr output.
    pub fn failure(exit_code: i32, stderr: &str) -> Self {
        StatusPayload::Failed(AnalysisReport {
            totals: Totals {
                errors: 1,
                file_errors: 1,
            },
            files: Map::new(),
            errors: vec![format!(
                "PHPStan failed with exit code {exit_code}: {stderr}"
            )],
        })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, StatusPayload::Failed(_))
    }

    /// Wire form of the payload as sent over the push channel.
    pub fn to_message(&self) -> String {
        match self {
            StatusPayload::Running => running_message(),
            StatusPayload::Report(raw) => raw.clone(),
            StatusPayload::Failed(report) => serde_json::to_string(report)
                .unwrap_or_else(|_| String::from(r#"{"totals":{"errors":1,"file_errors":1},"files":{},"errors":[]}"#)),
        }
    }
}

fn running_message() -> String {
    serde_json::json!({ "status": "running" }).to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub totals: Totals,
    #[serde(default)]
    pub files: Map<String, Value>,
    #[serde(default)]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub errors: u64,
    pub file_errors: u64,
}

/// Analysis settings merged from defaults, `composer.json` and the project's
/// `phpstan.neon`. Field names on the wire are what the UI reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveConfig {
    pub level: u32,
    pub paths: Vec<String>,
    pub available_paths: Vec<String>,
    #[serde(rename = "editorUrl")]
    pub editor_url_template: String,
    pub project_root: PathBuf,
    pub host_project_root: Option<String>,
}

impl EffectiveConfig {
    /// Watched paths joined the way the analyser command line expects them.
    pub fn paths_arg(&self) -> String {
        self.paths.join(" ")
    }
}

/// `paths` may arrive either as a single string or as a list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PathsParam {
    One(String),
    Many(Vec<String>),
}

impl PathsParam {
    pub fn joined(&self) -> String {
        match self {
            PathsParam::One(path) => path.clone(),
            PathsParam::Many(paths) => paths.join(" "),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    #[serde(default)]
    pub paths: Option<PathsParam>,
    #[serde(default)]
    pub level: Option<u32>,
    #[serde(default)]
    pub generate_baseline: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IgnoreErrorRequest {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileContentRequest {
    #[serde(default)]
    pub file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileContentResponse {
    pub content: String,
}
