use std::path::Path;

use serde_json::{Map, Value};

/// Entry point the UI bundle is built from.
pub const APP_ENTRY: &str = "assets/js/app.js";

pub const MANIFEST_PATH: &str = ".vite/manifest.json";

/// Vite build manifest: logical entry name to hashed output files.
#[derive(Debug, Clone, Default)]
pub struct AssetManifest {
    entries: Map<String, Value>,
}

impl AssetManifest {
    /// Missing or malformed manifests load as empty.
    pub fn load(path: &Path) -> Self {
        let entries = std::fs::read_to_string(path)
            .ok()
            .and_then(|content| serde_json::from_str::<Value>(&content).ok())
            .and_then(|value| match value {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .unwrap_or_default();
        Self { entries }
    }

    pub fn script_tag(&self) -> String {
        self.entries
            .get(APP_ENTRY)
            .and_then(|entry| entry["file"].as_str())
            .map(|file| format!(r#"<script type="module" src="/build/{file}"></script>"#))
            .unwrap_or_default()
    }

    pub fn style_tags(&self) -> String {
        let Some(css) = self
            .entries
            .get(APP_ENTRY)
            .and_then(|entry| entry["css"].as_array())
        else {
            return String::new();
        };
        css.iter()
            .filter_map(Value::as_str)
            .map(|file| format!(r#"<link rel="stylesheet" href="/build/{file}">"#))
            .collect()
    }
}
