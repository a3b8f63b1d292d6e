use crate::error::AppError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_stream::{wrappers::LinesStream, StreamExt};

/// Matches the tool's `ERROR: [extractor] ` diagnostic prefix.
static ERROR_TAG_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"ERROR:\s+(\[.+\]\s+)?").unwrap()
});

/// Captured output of a finished tool invocation.
#[derive(Debug)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs the external tool once with an explicit argument vector.
///
/// Every stdout line is logged unless `quiet_stdout` (the metadata probe
/// suppresses its JSON dump); every stderr line is logged as an error. A
/// non-zero exit turns into `AppError::Tool` carrying the cleaned last
/// stderr line. No retry and no timeout: a hanging tool hangs the caller.
pub async fn invoke(tool: &str, args: &[String], quiet_stdout: bool) -> Result<ToolOutput, AppError> {
    tracing::info!("[yt-dlp][spawn] {} {}", tool, args.join(" "));

    let mut child = Command::new(tool)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            tracing::error!("failed to spawn {}: {}", tool, e);
            AppError::Tool(format!("Failed to start {} process: {}", tool, e))
        })?;

    let stderr = child.stderr.take();
    let stderr_reader = tokio::spawn(async move {
        let mut captured = String::new();
        if let Some(stderr) = stderr {
            let reader = BufReader::new(stderr).lines();
            let mut lines = LinesStream::new(reader);
            while let Some(Ok(line)) = lines.next().await {
                if !line.trim().is_empty() {
                    tracing::error!("[yt-dlp][stderr] {}", line);
                }
                captured.push_str(&line);
                captured.push('\n');
            }
        }
        captured
    });

    let mut captured_stdout = String::new();
    if let Some(stdout) = child.stdout.take() {
        let reader = BufReader::new(stdout).lines();
        let mut lines = LinesStream::new(reader);
        while let Some(Ok(line)) = lines.next().await {
            if !quiet_stdout && !line.trim().is_empty() {
                tracing::info!("[yt-dlp][stdout] {}", line);
            }
            captured_stdout.push_str(&line);
            captured_stdout.push('\n');
        }
    }

    let status = child.wait().await?;
    let captured_stderr = stderr_reader.await.unwrap_or_default();

    if let Some(code) = status.code() {
        tracing::debug!("yt-dlp exited with code {:#x}", code);
    }

    if status.success() {
        tracing::info!("yt-dlp request processing [done]");
        Ok(ToolOutput {
            stdout: captured_stdout,
            stderr: captured_stderr,
        })
    } else {
        tracing::error!("yt-dlp request processing [failed]");
        Err(AppError::Tool(clean_error_line(&captured_stderr)))
    }
}

/// Reduces a stderr capture to one client-facing diagnostic: the last
/// non-empty line with every `ERROR: [...]` tag stripped. Deliberately the
/// historical heuristic; multi-line failures may be misreported.
pub fn clean_error_line(stderr: &str) -> String {
    let last = stderr
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("");
    ERROR_TAG_REGEX.replace_all(last.trim(), "").to_string()
}
