//! Firestorm generator invocation.
//!
//! Runs the external test generator (`python run-firestorm.py --test-gen
//! --agents=N` by default) and streams its output line by line while it
//! executes. The invocation succeeds only when the process exits with code 0
//! *and* prints the success marker on stdout; anything else is a failure
//! whose message prefers captured stderr over the bare exit code.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use ember_core::config::GeneratorConfig;
use ember_core::error::{EmberError, Result};

/// Marker the generator prints on stdout when a run completed successfully.
///
/// Exit code 0 alone is not trusted; the marker must appear too.
pub const SUCCESS_MARKER: &str = "SUCCESS";

/// Flag selecting the generator's test-generation mode.
const TEST_GEN_FLAG: &str = "--test-gen";

/// Which pipe a generator output line arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// One line of live generator output.
#[derive(Debug, Clone)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub line: String,
}

/// Run the generator to completion, streaming output as it arrives.
///
/// Lines from both pipes are sent on `output_tx` while the process runs; a
/// dropped receiver does not abort the invocation. The process is killed if
/// it outlives `config.timeout_secs`.
pub async fn run_generator(
    config: &GeneratorConfig,
    agent_count: u32,
    output_tx: mpsc::Sender<OutputLine>,
) -> Result<()> {
    let agents_flag = format!("--agents={}", agent_count);

    info!(
        program = %config.program,
        script = %config.script,
        agents = agent_count,
        "starting test generator"
    );

    let mut child = Command::new(&config.program)
        .arg(&config.script)
        .arg(TEST_GEN_FLAG)
        .arg(&agents_flag)
        .current_dir(&config.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            EmberError::generator_spawn(
                &config.program,
                format!("Failed to start test generation: {}", e),
            )
        })?;

    let stdout = child.stdout.take().ok_or_else(|| {
        EmberError::generator_spawn(&config.program, "Failed to open generator stdout")
    })?;
    let stderr = child.stderr.take().ok_or_else(|| {
        EmberError::generator_spawn(&config.program, "Failed to open generator stderr")
    })?;

    let stdout_task = tokio::spawn(drain_stream(stdout, OutputStream::Stdout, output_tx.clone()));
    let stderr_task = tokio::spawn(drain_stream(stderr, OutputStream::Stderr, output_tx));

    let status = match timeout(Duration::from_secs(config.timeout_secs), child.wait()).await {
        Ok(waited) => waited.map_err(|e| {
            EmberError::generator_failed(format!("Failed waiting for generator: {}", e))
        })?,
        Err(_) => {
            warn!(timeout_secs = config.timeout_secs, "generator timed out, killing it");
            let _ = child.kill().await;
            return Err(EmberError::GeneratorTimeout {
                timeout_secs: config.timeout_secs,
            });
        }
    };

    // The pipes hit EOF once the child exits, so these finish promptly
    let stdout_buf = stdout_task.await.unwrap_or_default();
    let stderr_buf = stderr_task.await.unwrap_or_default();

    let code = status.code();
    debug!(?code, "generator exited");

    if code == Some(0) && stdout_buf.contains(SUCCESS_MARKER) {
        info!("generator reported success");
        return Ok(());
    }

    let stderr_trimmed = stderr_buf.trim();
    let message = if stderr_trimmed.is_empty() {
        let code_text = code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        format!("Process failed with exit code {}", code_text)
    } else {
        stderr_trimmed.to_string()
    };

    Err(EmberError::generator_failed(message))
}

/// Forward a pipe line by line, returning the accumulated text at EOF.
async fn drain_stream<R>(
    reader: R,
    stream: OutputStream,
    tx: mpsc::Sender<OutputLine>,
) -> String
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut buffer = String::new();

    while let Ok(Some(line)) = lines.next_line().await {
        buffer.push_str(&line);
        buffer.push('\n');

        // A closed feed only stops the live stream, not the verdict
        let _ = tx
            .send(OutputLine {
                stream,
                line,
            })
            .await;
    }

    buffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn script_config(dir: &Path, body: &str, timeout_secs: u64) -> GeneratorConfig {
        fs::write(dir.join("gen.sh"), format!("#!/bin/sh\n{}\n", body)).unwrap();
        GeneratorConfig {
            program: "sh".to_string(),
            script: "gen.sh".to_string(),
            working_dir: dir.to_path_buf(),
            timeout_secs,
        }
    }

    async fn drain_all(mut rx: mpsc::Receiver<OutputLine>) -> Vec<OutputLine> {
        let mut lines = Vec::new();
        while let Some(line) = rx.recv().await {
            lines.push(line);
        }
        lines
    }

    #[tokio::test]
    async fn test_success_requires_marker_on_stdout() {
        let tmp = TempDir::new().unwrap();
        let config = script_config(tmp.path(), "echo warming up\necho SUCCESS", 5);
        let (tx, rx) = mpsc::channel(16);

        run_generator(&config, 3, tx).await.unwrap();

        let lines = drain_all(rx).await;
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.stream == OutputStream::Stdout));
        assert_eq!(lines[1].line, "SUCCESS");
    }

    #[tokio::test]
    async fn test_clean_exit_without_marker_fails() {
        let tmp = TempDir::new().unwrap();
        let config = script_config(tmp.path(), "echo all done\nexit 0", 5);
        let (tx, _rx) = mpsc::channel(16);

        let err = run_generator(&config, 3, tx).await.unwrap_err();
        assert!(matches!(err, EmberError::GeneratorFailed { .. }));
        assert!(err.to_string().contains("exit code 0"));
    }

    #[tokio::test]
    async fn test_failure_message_prefers_stderr() {
        let tmp = TempDir::new().unwrap();
        let config = script_config(tmp.path(), "echo manifest exploded 1>&2\nexit 3", 5);
        let (tx, rx) = mpsc::channel(16);

        let err = run_generator(&config, 3, tx).await.unwrap_err();
        assert!(err.to_string().contains("manifest exploded"));

        let lines = drain_all(rx).await;
        assert!(lines.iter().any(|l| l.stream == OutputStream::Stderr));
    }

    #[tokio::test]
    async fn test_failure_message_falls_back_to_exit_code() {
        let tmp = TempDir::new().unwrap();
        let config = script_config(tmp.path(), "exit 7", 5);
        let (tx, _rx) = mpsc::channel(16);

        let err = run_generator(&config, 3, tx).await.unwrap_err();
        assert!(err.to_string().contains("exit code 7"));
    }

    #[tokio::test]
    async fn test_passes_mode_and_agent_flags() {
        let tmp = TempDir::new().unwrap();
        let config = script_config(tmp.path(), "echo \"$@\"\necho SUCCESS", 5);
        let (tx, rx) = mpsc::channel(16);

        run_generator(&config, 7, tx).await.unwrap();

        let lines = drain_all(rx).await;
        assert!(lines.iter().any(|l| l.line.contains("--test-gen")));
        assert!(lines.iter().any(|l| l.line.contains("--agents=7")));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let tmp = TempDir::new().unwrap();
        let mut config = script_config(tmp.path(), "echo SUCCESS", 5);
        config.program = "ember-no-such-generator".to_string();
        let (tx, _rx) = mpsc::channel(16);

        let err = run_generator(&config, 3, tx).await.unwrap_err();
        assert!(matches!(err, EmberError::GeneratorSpawn { .. }));
        assert!(err.to_string().contains("Failed to start test generation"));
    }

    #[tokio::test]
    async fn test_overlong_run_times_out() {
        let tmp = TempDir::new().unwrap();
        let config = script_config(tmp.path(), "sleep 30\necho SUCCESS", 1);
        let (tx, _rx) = mpsc::channel(16);

        let err = run_generator(&config, 3, tx).await.unwrap_err();
        assert!(matches!(
            err,
            EmberError::GeneratorTimeout { timeout_secs: 1 }
        ));
    }
}
