use std::path::{Path, PathBuf};

pub const DEFAULT_BINARY: &str = "vendor/bin/phpstan";

/// Config files passed to the analyser with `-c`, in priority order.
pub const CONFIG_CANDIDATES: [&str; 2] = ["phpstan.neon", "phpstan.neon.dist"];

/// Builds the analyser command line for a project directory.
#[derive(Debug, Clone)]
pub struct PhpStanRunner {
    cwd: PathBuf,
    binary: String,
}

impl PhpStanRunner {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self::with_binary(cwd, DEFAULT_BINARY)
    }

    pub fn with_binary(cwd: impl Into<PathBuf>, binary: impl Into<String>) -> Self {
        Self {
            cwd: cwd.into(),
            binary: binary.into(),
        }
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// `paths` is inserted verbatim; callers join multiple paths with spaces.
    pub fn command(&self, paths: &str, level: u32, generate_baseline: bool) -> String {
        let config = find_config_file(&self.cwd);
        build_command(&self.binary, paths, level, generate_baseline, config)
    }
}

/// First existing entry of [`CONFIG_CANDIDATES`] under `cwd`.
pub fn find_config_file(cwd: &Path) -> Option<&'static str> {
    CONFIG_CANDIDATES
        .into_iter()
        .find(|name| cwd.join(name).exists())
}

pub fn build_command(
    binary: &str,
    paths: &str,
    level: u32,
    generate_baseline: bool,
    config_file: Option<&str>,
) -> String {
    let config_option = config_file
        .map(|file| format!("-c {}", shell_quote(file)))
        .unwrap_or_default();

    let mut command = format!(
        "{binary} analyse {paths} --level={level} --error-format=json --no-progress {config_option}"
    );
    if generate_baseline {
        command.push_str(" --generate-baseline");
    }
    command.trim().to_string()
}

/// Single-quotes `arg` for `sh`, escaping embedded quotes.
pub fn shell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn command_without_config_or_baseline() {
        let command = build_command(DEFAULT_BINARY, "src", 5, false, None);
        assert!(command.starts_with("vendor/bin/phpstan analyse src"));
        assert!(command.contains("--level=5"));
        assert!(command.contains("--error-format=json"));
        assert!(command.contains("--no-progress"));
        assert!(!command.contains("-c "));
        assert!(!command.contains("--generate-baseline"));
        assert_eq!(command, command.trim());
    }

    #[test]
    fn command_with_baseline() {
        let command = build_command(DEFAULT_BINARY, "src", 5, true, None);
        assert!(command.ends_with("--generate-baseline"));
    }

    #[test]
    fn command_keeps_paths_verbatim() {
        let command = build_command(DEFAULT_BINARY, "src tests", 0, false, None);
        assert!(command.contains(" src tests "));
        assert!(command.contains("--level=0"));
    }

    #[test]
    fn command_quotes_config_file() {
        let command = build_command(DEFAULT_BINARY, "src", 9, false, Some("phpstan.neon"));
        assert!(command.ends_with("-c 'phpstan.neon'"));
    }

    #[test]
    fn shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn runner_prefers_primary_config() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("phpstan.neon.dist"), "parameters:").unwrap();
        let runner = PhpStanRunner::new(tmp.path());
        assert!(runner.command("src", 5, false).contains("-c 'phpstan.neon.dist'"));

        std::fs::write(tmp.path().join("phpstan.neon"), "parameters:").unwrap();
        let command = runner.command("src", 5, false);
        assert!(command.contains("-c 'phpstan.neon'"));
        assert!(!command.contains("phpstan.neon.dist"));
    }

    #[test]
    fn runner_without_config_file() {
        let tmp = TempDir::new().unwrap();
        let runner = PhpStanRunner::with_binary(tmp.path(), "phpstan");
        let command = runner.command("src", 5, false);
        assert_eq!(
            command,
            "phpstan analyse src --level=5 --error-format=json --no-progress"
        );
    }
}
