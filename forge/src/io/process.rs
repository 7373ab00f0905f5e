//! Child processes with a wall-clock timeout and bounded captured output.
//!
//! Every pipe (stdin included) is serviced on its own thread, so the timeout
//! below is the only place the orchestrator blocks on a child. A child that
//! never reads stdin or never stops writing cannot stall the loop.

use std::io::{self, Read, Write};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Bytes discarded beyond the output limit.
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    /// The process hit the timeout and was killed.
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Last `max_lines` of stderr, for failure descriptors.
    pub fn stderr_tail(&self, max_lines: usize) -> String {
        let text = String::from_utf8_lossy(&self.stderr);
        let mut tail: Vec<&str> = text.lines().rev().take(max_lines).collect();
        tail.reverse();
        tail.join("\n")
    }
}

/// Run a command with a timeout, capturing stdout/stderr without risking pipe
/// deadlocks.
///
/// `output_limit_bytes` bounds the stdout/stderr kept in memory; bytes beyond
/// it are discarded while the pipe keeps getting drained. On timeout the
/// child is killed and reaped, and `timed_out` is set instead of returning an
/// error. A child that exits (or is killed) without consuming its stdin is
/// not an error either.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub fn run_with_timeout(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped());

    let mut child = cmd.spawn().context("spawn command")?;

    // Stdin goes through its own thread: the payload can exceed the pipe
    // buffer, and a child that never drains it must not hold up the
    // wait below.
    let writer = match stdin {
        Some(payload) => {
            let pipe = child
                .stdin
                .take()
                .ok_or_else(|| anyhow!("child stdin not piped"))?;
            Some(feed_stdin(pipe, payload.to_vec()))
        }
        None => None,
    };
    let stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("child stdout not piped"))?;
    let stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("child stderr not piped"))?;
    let stdout_capture = drain_capped(stdout_pipe, output_limit_bytes);
    let stderr_capture = drain_capped(stderr_pipe, output_limit_bytes);

    let (status, timed_out) = wait_or_kill(&mut child, timeout)?;

    // Child exit (or kill) closes both pipe write ends and the stdin read
    // end, so all three threads are guaranteed to finish now.
    let (stdout, stdout_truncated) = finish_capture(stdout_capture).context("capture stdout")?;
    let (stderr, stderr_truncated) = finish_capture(stderr_capture).context("capture stderr")?;
    if let Some(writer) = writer {
        match writer.join() {
            Ok(Ok(())) => {}
            Ok(Err(err)) if err.kind() == io::ErrorKind::BrokenPipe => {
                debug!("child went away before consuming stdin");
            }
            Ok(Err(err)) => return Err(err).context("write stdin"),
            Err(_) => return Err(anyhow!("stdin writer thread panicked")),
        }
    }

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }
    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

fn wait_or_kill(child: &mut Child, timeout: Duration) -> Result<(ExitStatus, bool)> {
    if let Some(status) = child.wait_timeout(timeout).context("wait for child")? {
        return Ok((status, false));
    }
    warn!(timeout_secs = timeout.as_secs(), "child exceeded timeout, killing");
    child.kill().context("kill child")?;
    let status = child.wait().context("reap child after kill")?;
    Ok((status, true))
}

fn feed_stdin(mut pipe: ChildStdin, payload: Vec<u8>) -> JoinHandle<io::Result<()>> {
    // The pipe is dropped when the thread returns, giving the child EOF.
    thread::spawn(move || pipe.write_all(&payload))
}

fn drain_capped<R: Read + Send + 'static>(
    mut pipe: R,
    cap: usize,
) -> JoinHandle<io::Result<CappedSink>> {
    thread::spawn(move || {
        let mut sink = CappedSink::new(cap);
        io::copy(&mut pipe, &mut sink)?;
        Ok(sink)
    })
}

fn finish_capture(handle: JoinHandle<io::Result<CappedSink>>) -> Result<(Vec<u8>, usize)> {
    let sink = handle
        .join()
        .map_err(|_| anyhow!("capture thread panicked"))??;
    Ok((sink.kept, sink.dropped))
}

/// A write sink that keeps at most `cap` bytes and counts the rest, while
/// accepting (and thus draining) everything offered to it.
struct CappedSink {
    kept: Vec<u8>,
    cap: usize,
    dropped: usize,
}

impl CappedSink {
    fn new(cap: usize) -> Self {
        Self {
            kept: Vec::new(),
            cap,
            dropped: 0,
        }
    }
}

impl Write for CappedSink {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let room = self.cap.saturating_sub(self.kept.len());
        let keep = data.len().min(room);
        self.kept.extend_from_slice(&data[..keep]);
        self.dropped += data.len() - keep;
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
