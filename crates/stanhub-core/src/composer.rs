//! Default analysis paths from the project's `composer.json` autoload map.

use std::path::Path;

use serde_json::Value;

use crate::orchestrator::DEFAULT_PATH;

pub const MANIFEST_FILE: &str = "composer.json";

const AUTOLOAD_SECTIONS: [&str; 2] = ["autoload", "autoload-dev"];

/// PSR-4 source roots declared in `composer.json`, trailing slashes
/// trimmed and duplicates dropped. Falls back to `["src"]`.
pub fn default_paths(project_root: &Path) -> Vec<String> {
    let paths = std::fs::read_to_string(project_root.join(MANIFEST_FILE))
        .ok()
        .and_then(|content| serde_json::from_str::<Value>(&content).ok())
        .map(|manifest| psr4_paths(&manifest))
        .unwrap_or_default();

    if paths.is_empty() {
        vec![DEFAULT_PATH.to_string()]
    } else {
        paths
    }
}

fn psr4_paths(manifest: &Value) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();

    for section in AUTOLOAD_SECTIONS {
        let Some(map) = manifest[section]["psr-4"].as_object() else {
            continue;
        };
        for value in map.values() {
            let entries: Vec<&str> = match value {
                Value::String(path) => vec![path.as_str()],
                Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
                _ => continue,
            };
            for entry in entries {
                let trimmed = entry.trim_end_matches('/');
                if !trimmed.is_empty() && !paths.iter().any(|p| p == trimmed) {
                    paths.push(trimmed.to_string());
                }
            }
        }
    }

    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_manifest_falls_back_to_src() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(default_paths(tmp.path()), vec!["src"]);
    }

    #[test]
    fn malformed_manifest_falls_back_to_src() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(MANIFEST_FILE), "{ not json").unwrap();
        assert_eq!(default_paths(tmp.path()), vec!["src"]);
    }

    #[test]
    fn collects_autoload_and_autoload_dev_roots() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(MANIFEST_FILE),
            r#"{
                "autoload": {"psr-4": {"App\\": "app/", "Lib\\": ["lib/", "src/"]}},
                "autoload-dev": {"psr-4": {"Tests\\": "tests/", "App\\Dup\\": "app"}}
            }"#,
        )
        .unwrap();
        assert_eq!(default_paths(tmp.path()), vec!["app", "lib", "src", "tests"]);
    }

    #[test]
    fn manifest_without_psr4_falls_back() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(MANIFEST_FILE), r#"{"name": "acme/app"}"#).unwrap();
        assert_eq!(default_paths(tmp.path()), vec!["src"]);
    }
}
