//! Effective analysis settings for a project, and the one write path back
//! into its config file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde_yaml::{Mapping, Value};
use stanhub_schema::EffectiveConfig;

use crate::codec::{ConfigCodec, NeonCodec};
use crate::composer;
use crate::orchestrator::DEFAULT_LEVEL;

pub const PRIMARY_CONFIG: &str = "phpstan.neon";
pub const FALLBACK_CONFIG: &str = "phpstan.neon.dist";
pub const DEFAULT_EDITOR_URL: &str = "idea://open?file=%%file%%&line=%%line%%";

/// Delimiter wrapped around generated ignore patterns.
const PATTERN_DELIMITER: char = '#';

#[derive(Clone)]
pub struct ConfigResolver {
    codec: Arc<dyn ConfigCodec>,
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::with_codec(Arc::new(NeonCodec))
    }
}

impl ConfigResolver {
    pub fn with_codec(codec: Arc<dyn ConfigCodec>) -> Self {
        Self { codec }
    }

    /// Existing config file, primary name first.
    pub fn locate(project_root: &Path) -> Option<PathBuf> {
        [PRIMARY_CONFIG, FALLBACK_CONFIG]
            .into_iter()
            .map(|name| project_root.join(name))
            .find(|path| path.is_file())
    }

    /// Hardcoded defaults with paths taken from `composer.json`.
    pub fn defaults(project_root: &Path) -> EffectiveConfig {
        let available = composer::default_paths(project_root);
        EffectiveConfig {
            level: DEFAULT_LEVEL,
            paths: available.clone(),
            available_paths: available,
            editor_url_template: DEFAULT_EDITOR_URL.to_string(),
            project_root: project_root.to_path_buf(),
            host_project_root: None,
        }
    }

    /// Merges defaults, manifest paths and the persisted config. Never
    /// fails: an unreadable or undecodable config yields the defaults.
    pub fn resolve(&self, project_root: &Path) -> EffectiveConfig {
        let mut config = Self::defaults(project_root);

        let Some(path) = Self::locate(project_root) else {
            return config;
        };

        let decoded = std::fs::read_to_string(&path)
            .map_err(anyhow::Error::from)
            .and_then(|content| self.codec.decode(&content));
        let data = match decoded {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config");
                return config;
            }
        };

        let params = &data["parameters"];
        if let Some(level) = params["level"].as_u64().and_then(|l| u32::try_from(l).ok()) {
            config.level = level;
        }
        match &params["paths"] {
            Value::String(path) => config.paths = vec![path.clone()],
            Value::Sequence(items) => {
                config.paths = items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect();
            }
            _ => {}
        }
        if let Some(url) = params["editorUrl"].as_str() {
            config.editor_url_template = url.to_string();
        }
        if let Some(host_root) = params["phpstanHub"]["hostProjectRoot"].as_str() {
            config.host_project_root = Some(host_root.to_string());
        }

        config
    }

    /// Appends an ignore rule for `error` in `file` to
    /// `parameters.ignoreErrors`, creating the config file when none exists.
    ///
    /// Read-modify-write without locking; concurrent callers may lose
    /// updates.
    pub fn append_ignore_rule(
        &self,
        project_root: &Path,
        error: &str,
        file: &str,
    ) -> Result<PathBuf> {
        let path =
            Self::locate(project_root).unwrap_or_else(|| project_root.join(PRIMARY_CONFIG));

        let mut data = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            self.codec.decode(&content)?
        } else {
            Value::Mapping(Mapping::new())
        };

        if data.is_null() {
            data = Value::Mapping(Mapping::new());
        }
        let Some(root) = data.as_mapping_mut() else {
            bail!("{} does not contain a mapping", path.display());
        };

        let parameters = child_mapping(root, "parameters")?;
        let ignore_errors = child_sequence(parameters, "ignoreErrors")?;

        let mut rule = Mapping::new();
        rule.insert(
            Value::String("message".into()),
            Value::String(format!(
                "{PATTERN_DELIMITER}{}{PATTERN_DELIMITER}",
                pcre_quote(error, PATTERN_DELIMITER)
            )),
        );
        rule.insert(Value::String("path".into()), Value::String(file.to_string()));
        ignore_errors.push(Value::Mapping(rule));

        let encoded = self.codec.encode(&data)?;
        std::fs::write(&path, encoded)
            .with_context(|| format!("failed to write {}", path.display()))?;

        tracing::info!(path = %path.display(), file, "added ignore rule");
        Ok(path)
    }
}

fn child_mapping<'a>(parent: &'a mut Mapping, key: &str) -> Result<&'a mut Mapping> {
    let slot = parent
        .entry(Value::String(key.to_string()))
        .or_insert(Value::Null);
    if slot.is_null() {
        *slot = Value::Mapping(Mapping::new());
    }
    slot.as_mapping_mut()
        .with_context(|| format!("`{key}` is not a mapping"))
}

fn child_sequence<'a>(parent: &'a mut Mapping, key: &str) -> Result<&'a mut Vec<Value>> {
    let slot = parent
        .entry(Value::String(key.to_string()))
        .or_insert(Value::Null);
    if slot.is_null() {
        *slot = Value::Sequence(Vec::new());
    }
    slot.as_sequence_mut()
        .with_context(|| format!("`{key}` is not a list"))
}

/// Escapes PCRE metacharacters and `delimiter` so `text` matches literally.
pub fn pcre_quote(text: &str, delimiter: char) -> String {
    const SPECIAL: &str = ".\\+*?[^]$(){}=!<>|:-#";

    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        if ch == '\0' {
            out.push_str("\\000");
            continue;
        }
        if SPECIAL.contains(ch) || ch == delimiter {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
