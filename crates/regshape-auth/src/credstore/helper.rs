//! Helper process runner: spawn, single stdin write, drain, wait, classify.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::{AuthError, AuthResult};

use super::{HelperVerb, StoreBackend};

/// Captured result of a helper run that exited on its own.
#[derive(Debug)]
pub(crate) struct HelperOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl HelperOutput {
    /// stdout followed by stderr, lossily decoded and trimmed.
    pub(crate) fn combined_text(&self) -> String {
        let mut text = String::from_utf8_lossy(&self.stdout).trim().to_string();
        let err = String::from_utf8_lossy(&self.stderr);
        let err = err.trim();
        if !err.is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(err);
        }
        text
    }
}

/// Run `<program> <verb>`, writing `input` once to stdin.
///
/// The child never outlives this call: on timeout or any I/O failure it is
/// killed and waited before the error is returned.
pub(crate) async fn run_helper(
    backend: &StoreBackend,
    verb: HelperVerb,
    input: Option<&[u8]>,
    timeout: Duration,
) -> AuthResult<HelperOutput> {
    let program = backend.program();
    debug!(program = %program, verb = %verb, "running credential helper");

    let mut child = Command::new(&program)
        .arg(verb.as_str())
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => AuthError::HelperNotFound {
                store: backend.id().to_string(),
                verb,
                program: program.clone(),
            },
            _ => AuthError::HelperExecution {
                store: backend.id().to_string(),
                verb,
                message: format!("failed to start {}: {}", program, e),
            },
        })?;

    let outcome = tokio::time::timeout(timeout, communicate(&mut child, input)).await;

    match outcome {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => {
            reap(&mut child).await;
            Err(AuthError::HelperExecution {
                store: backend.id().to_string(),
                verb,
                message: format!("I/O error talking to {}: {}", program, e),
            })
        }
        Err(_) => {
            warn!(program = %program, verb = %verb, timeout_ms = timeout.as_millis() as u64, "credential helper timed out");
            reap(&mut child).await;
            Err(AuthError::HelperExecution {
                store: backend.id().to_string(),
                verb,
                message: format!("{} did not finish within {:?}", program, timeout),
            })
        }
    }
}

/// One write, close stdin, drain both pipes to EOF, then wait.
async fn communicate(child: &mut Child, input: Option<&[u8]>) -> io::Result<HelperOutput> {
    let stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let write = async move {
        if let (Some(mut pipe), Some(payload)) = (stdin, input) {
            match pipe.write_all(payload).await {
                Ok(()) => pipe.shutdown().await?,
                // Helper exited without reading; its exit status tells the story.
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    };

    let (written, stdout, stderr) = tokio::join!(write, drain(stdout), drain(stderr));
    written?;
    let stdout = stdout?;
    let stderr = stderr?;

    let status = child.wait().await?;

    Ok(HelperOutput {
        status,
        stdout,
        stderr,
    })
}

async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

async fn reap(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        debug!(error = %e, "credential helper already exited");
    }
    if let Err(e) = child.wait().await {
        warn!(error = %e, "failed to reap credential helper");
    }
}
