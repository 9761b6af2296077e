use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use stanhub_bus::BroadcastBus;
use stanhub_core::{AnalysisOrchestrator, AnalysisRequest, ConfigResolver, PhpStanRunner, WatchLoop};
use tempfile::TempDir;

fn write(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn set_mtime(path: &Path, secs: u64) {
    let file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
    file.set_modified(UNIX_EPOCH + Duration::from_secs(1_700_000_000 + secs))
        .unwrap();
}

fn watch_loop(root: &Path) -> WatchLoop {
    let bus = Arc::new(BroadcastBus::new(8));
    let orchestrator = Arc::new(AnalysisOrchestrator::new(
        PhpStanRunner::with_binary(root, "true"),
        bus,
    ));
    WatchLoop::new(ConfigResolver::default(), orchestrator, Duration::from_millis(50)).unwrap()
}

fn project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    write(&tmp.path().join("src/A.php"), "<?php class A {}");
    write(&tmp.path().join("lib/B.php"), "<?php class B {}");
    set_mtime(&tmp.path().join("src/A.php"), 0);
    set_mtime(&tmp.path().join("lib/B.php"), 0);
    tmp
}

#[test]
fn quiet_tree_triggers_nothing() {
    let tmp = project();
    let mut watcher = watch_loop(tmp.path());
    assert_eq!(watcher.check(), None);
    assert_eq!(watcher.check(), None);
}

#[test]
fn touching_unwatched_file_does_not_trigger() {
    let tmp = project();
    let mut watcher = watch_loop(tmp.path());

    set_mtime(&tmp.path().join("lib/B.php"), 60);
    assert_eq!(watcher.check(), None);
}

#[test]
fn touching_watched_file_triggers_once() {
    let tmp = project();
    let mut watcher = watch_loop(tmp.path());

    set_mtime(&tmp.path().join("src/A.php"), 60);
    assert_eq!(watcher.check(), Some(AnalysisRequest::new("src", 5)));
    assert_eq!(watcher.check(), None);
}

#[test]
fn new_source_file_triggers() {
    let tmp = project();
    let mut watcher = watch_loop(tmp.path());

    write(&tmp.path().join("src/Sub/C.php"), "<?php");
    assert!(watcher.check().is_some());
}

#[test]
fn config_change_reresolves_paths_and_level() {
    let tmp = project();
    let mut watcher = watch_loop(tmp.path());
    assert_eq!(watcher.config().paths, vec!["src"]);

    write(
        &tmp.path().join("phpstan.neon"),
        "parameters:\n\tlevel: 7\n\tpaths:\n\t\t- lib\n",
    );
    assert_eq!(watcher.check(), Some(AnalysisRequest::new("lib", 7)));
    assert_eq!(watcher.watched_roots(), &[tmp.path().join("lib")]);

    set_mtime(&tmp.path().join("src/A.php"), 120);
    assert_eq!(watcher.check(), None);

    set_mtime(&tmp.path().join("lib/B.php"), 120);
    assert_eq!(watcher.check(), Some(AnalysisRequest::new("lib", 7)));
}

#[test]
fn dist_config_change_triggers() {
    let tmp = project();
    write(&tmp.path().join("phpstan.neon.dist"), "parameters:\n  level: 4\n");
    set_mtime(&tmp.path().join("phpstan.neon.dist"), 0);
    let mut watcher = watch_loop(tmp.path());
    assert_eq!(watcher.config().level, 4);

    write(&tmp.path().join("phpstan.neon.dist"), "parameters:\n  level: 6\n");
    set_mtime(&tmp.path().join("phpstan.neon.dist"), 30);
    assert_eq!(watcher.check(), Some(AnalysisRequest::new("src", 6)));
}

#[tokio::test]
async fn running_loop_publishes_after_change() {
    let tmp = project();
    let bus = Arc::new(BroadcastBus::new(8));
    let mut sub = bus.subscribe().await;
    let orchestrator = Arc::new(AnalysisOrchestrator::new(
        PhpStanRunner::with_binary(tmp.path(), "printf '{}' #"),
        bus.clone(),
    ));
    let handle = WatchLoop::new(
        ConfigResolver::default(),
        orchestrator,
        Duration::from_millis(20),
    )
    .unwrap()
    .spawn();

    tokio::time::sleep(Duration::from_millis(60)).await;
    set_mtime(&tmp.path().join("src/A.php"), 3600);

    let running = tokio::time::timeout(Duration::from_secs(5), sub.receiver.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(running, r#"{"status":"running"}"#);
    let report = tokio::time::timeout(Duration::from_secs(5), sub.receiver.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report, "{}");

    handle.abort();
}
