//! Shared subprocess management.
//!
//! [`run_command`] spawns a prepared [`tokio::process::Command`], captures
//! stdout/stderr, and enforces the configured timeout. The child never reads
//! stdin; all query data travels as command-line arguments.
//!
//! The deadline covers the whole capture, not just the child's exit: a
//! background grandchild that inherited stdout keeps the pipe open after the
//! child exits. On unix the child leads its own process group and the whole
//! group is killed when the deadline passes.

use std::process::Stdio;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use super::executor::{ScriptError, ScriptInput, ScriptOutput};

/// Maximum stdout or stderr size captured per stream (10 MiB).
///
/// Output exceeding this limit is truncated.
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Spawn `cmd` with the arguments from `input`, capture stdout/stderr, and
/// enforce the timeout.
///
/// The caller sets the program (and script path, for interpreted scripts)
/// before calling this function.
pub async fn run_command(
    cmd: &mut Command,
    input: ScriptInput,
) -> Result<ScriptOutput, ScriptError> {
    cmd.args(&input.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    cmd.process_group(0);

    for (key, value) in &input.env_vars {
        cmd.env(key, value);
    }

    if let Some(dir) = &input.working_directory {
        cmd.current_dir(dir);
    }

    let start = Instant::now();

    let mut child = cmd.spawn().map_err(ScriptError::IoError)?;
    // Read before `wait()` reaps the child; the group outlives the leader.
    let group_id = child.id();

    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();

    // Drain both pipes while waiting so a chatty child cannot fill one and stall.
    let capture = async {
        let (status, stdout_bytes, stderr_bytes) = tokio::join!(
            child.wait(),
            read_stream(stdout_handle),
            read_stream(stderr_handle),
        );
        status.map(|status| (status, stdout_bytes, stderr_bytes))
    };

    match tokio::time::timeout(input.timeout, capture).await {
        Ok(Ok((status, stdout_bytes, stderr_bytes))) => {
            let duration_ms = start.elapsed().as_millis() as u64;
            let exit_code = status.code().unwrap_or(-1);

            tracing::debug!(
                exit_code,
                duration_ms,
                stdout_bytes = stdout_bytes.len(),
                stderr_bytes = stderr_bytes.len(),
                "Subprocess finished",
            );

            Ok(ScriptOutput {
                stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
                stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
                exit_code,
                duration_ms,
            })
        }
        Ok(Err(e)) => Err(ScriptError::IoError(e)),
        Err(_elapsed) => {
            kill_process_group(group_id);
            // `child` is dropped on return, which kills the leader if the
            // group kill did not.
            let elapsed_ms = start.elapsed().as_millis() as u64;
            tracing::warn!(elapsed_ms, "Subprocess timed out, killed its process group");
            Err(ScriptError::Timeout { elapsed_ms })
        }
    }
}

#[cfg(unix)]
fn kill_process_group(group_id: Option<u32>) {
    let Some(pgid) = group_id.and_then(|id| libc::pid_t::try_from(id).ok()) else {
        return;
    };
    // Safety: killpg only sends a signal; it touches no memory of ours.
    let ret = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if ret != 0 {
        tracing::debug!(
            pgid,
            error = %std::io::Error::last_os_error(),
            "Process group already gone",
        );
    }
}

#[cfg(not(unix))]
fn kill_process_group(_group_id: Option<u32>) {}

/// Read an entire output stream into a byte buffer, capped at [`MAX_OUTPUT_BYTES`].
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_OUTPUT_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
    }
    buf
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
