//! Asynchronous child process with incrementally delivered output.

use std::path::Path;
use std::pin::Pin;
use std::process::Stdio;

use anyhow::{Context, Result};
use bytes::Bytes;
use futures_core::Stream;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

const CHUNK_SIZE: usize = 8 * 1024;

/// Output arrives as arbitrary byte slices in arrival order per stream;
/// `Exited` is always the last event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Stdout(Bytes),
    Stderr(Bytes),
    Exited(i32),
}

pub type ProcessStream = Pin<Box<dyn Stream<Item = ProcessEvent> + Send>>;

/// Starts `command` through `sh -c` in `cwd`. Errors only when the shell
/// itself cannot be spawned; a missing analyser shows up as a non-zero exit
/// with stderr output.
pub fn spawn(command: &str, cwd: &Path) -> Result<ProcessStream> {
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to spawn `{command}` in {}", cwd.display()))?;

    let mut stdout = child.stdout.take().context("child stdout not captured")?;
    let mut stderr = child.stderr.take().context("child stderr not captured")?;

    let stream = async_stream::stream! {
        let mut out_buf = vec![0u8; CHUNK_SIZE];
        let mut err_buf = vec![0u8; CHUNK_SIZE];
        let mut out_open = true;
        let mut err_open = true;

        while out_open || err_open {
            let event = tokio::select! {
                read = stdout.read(&mut out_buf), if out_open => match read {
                    Ok(n) if n > 0 => Some(ProcessEvent::Stdout(Bytes::copy_from_slice(&out_buf[..n]))),
                    Ok(_) => { out_open = false; None }
                    Err(e) => {
                        tracing::warn!(error = %e, "reading child stdout failed");
                        out_open = false;
                        None
                    }
                },
                read = stderr.read(&mut err_buf), if err_open => match read {
                    Ok(n) if n > 0 => Some(ProcessEvent::Stderr(Bytes::copy_from_slice(&err_buf[..n]))),
                    Ok(_) => { err_open = false; None }
                    Err(e) => {
                        tracing::warn!(error = %e, "reading child stderr failed");
                        err_open = false;
                        None
                    }
                },
            };
            if let Some(event) = event {
                yield event;
            }
        }

        let code = match child.wait().await {
            Ok(status) => status.code().unwrap_or(-1),
            Err(e) => {
                tracing::error!(error = %e, "waiting for child process failed");
                -1
            }
        };
        yield ProcessEvent::Exited(code);
    };

    Ok(Box::pin(stream))
}
