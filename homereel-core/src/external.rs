//! Invocation of external command-line tools (lsdvd, ffmpeg, unzip).
//!
//! Arguments are always passed as arrays — nothing here ever goes through a
//! shell. Every invocation carries a timeout and the child is killed if the
//! caller gives up on it.

use std::process::Output;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{tool} is not installed")]
    Unavailable { tool: &'static str },

    #[error("{tool} timed out after {}s", timeout.as_secs())]
    TimedOut {
        tool: &'static str,
        timeout: Duration,
    },

    #[error("{tool} exited with status {status}: {stderr}")]
    Failed {
        tool: &'static str,
        status: i32,
        stderr: String,
    },

    #[error("failed to run {tool}: {source}")]
    Io {
        tool: &'static str,
        source: std::io::Error,
    },
}

/// Run a prepared command to completion, capturing output.
pub(crate) async fn run(
    tool: &'static str,
    command: &mut Command,
    timeout: Duration,
) -> Result<Output, ToolError> {
    debug!(tool, ?timeout, "running external tool");
    command.kill_on_drop(true);

    let output = match tokio::time::timeout(timeout, command.output()).await {
        Err(_) => return Err(ToolError::TimedOut { tool, timeout }),
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ToolError::Unavailable { tool });
        }
        Ok(Err(e)) => return Err(ToolError::Io { tool, source: e }),
        Ok(Ok(output)) => output,
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        // ffmpeg can emit pages of warnings; keep the tail where the actual
        // failure lands.
        let tail: Vec<&str> = stderr.lines().rev().take(10).collect();
        let stderr = tail.into_iter().rev().collect::<Vec<_>>().join("\n");
        return Err(ToolError::Failed {
            tool,
            status: output.status.code().unwrap_or(-1),
            stderr,
        });
    }

    Ok(output)
}
