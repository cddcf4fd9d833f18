//! Interactive session over plain stdin/stdout/stderr pipes.
//!
//! Two reader tasks turn the child's stdout and stderr into timestamped
//! [`OutputEvent`]s on a single queue. Any stderr produced in response to
//! a command makes that response an error.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::errors::SessionError;
use crate::session::response::{
    collect_response, Deadlines, OutputEvent, OutputEventReceiver, OutputEventSender,
    OutputStream,
};
use crate::session::shell::{build_script_command, session_line, Environment};
use crate::session::traits::{InteractiveShell, SessionKind, SessionSpec, STARTUP_DELAY};

/// Pipe-attached interactive session.
pub struct PipeSession {
    spec: SessionSpec,
    state: Option<RunningState>,
}

struct RunningState {
    child: Child,
    stdin: ChildStdin,
    events: OutputEventReceiver,
    readers: Vec<JoinHandle<()>>,
    last_command: String,
    written_at: Instant,
}

impl PipeSession {
    pub fn new(spec: SessionSpec) -> Self {
        Self { spec, state: None }
    }

    fn running(&mut self) -> Result<&mut RunningState, SessionError> {
        self.state
            .as_mut()
            .ok_or_else(|| SessionError::NotRunning("session not initialized".to_string()))
    }
}

/// Forward every line of `source` to `tx` until EOF or the queue closes.
async fn forward_lines<R>(source: R, stream: OutputStream, tx: OutputEventSender)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(source);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']);
                if tx.send(OutputEvent::now(stream, line)).is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!(?stream, "Session reader stopped: {e}");
                break;
            }
        }
    }
}

async fn write_line(stdin: &mut ChildStdin, command: &str) -> Result<(), SessionError> {
    stdin.write_all(session_line(command).as_bytes()).await?;
    stdin.flush().await?;
    Ok(())
}

/// Fail with the exit status and stderr if the process already ended.
async fn check_started(state: &mut RunningState) -> Result<(), SessionError> {
    let Some(status) = state.child.try_wait()? else {
        return Ok(());
    };

    // Let the readers drain what the process wrote before exiting.
    for reader in state.readers.drain(..) {
        let _ = tokio::time::timeout(STARTUP_DELAY, reader).await;
    }
    let mut stderr = Vec::new();
    while let Ok(event) = state.events.try_recv() {
        if event.stream == OutputStream::Stderr && !event.line.trim().is_empty() {
            stderr.push(event.line);
        }
    }

    let mut message = format!("session exited during startup ({status})");
    if !stderr.is_empty() {
        message.push_str(": ");
        message.push_str(&stderr.join("\n"));
    }
    Err(SessionError::SpawnFailed(message))
}

#[async_trait::async_trait]
impl InteractiveShell for PipeSession {
    fn kind(&self) -> SessionKind {
        SessionKind::Pipe
    }

    async fn init(&mut self, env: &Environment) -> Result<(), SessionError> {
        if self.state.is_some() {
            return Err(SessionError::SpawnFailed(
                "session already initialized".to_string(),
            ));
        }
        let (program, steps) = self
            .spec
            .init_scripts
            .split_first()
            .ok_or_else(|| SessionError::SpawnFailed("no init script".to_string()))?;

        info!(init = %program, "Starting pipe session");

        let mut command = build_script_command(program, env).to_tokio_command();
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|e| SessionError::SpawnFailed(e.to_string()))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SessionError::SpawnFailed("stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SessionError::SpawnFailed("stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SessionError::SpawnFailed("stderr not captured".to_string()))?;

        let (tx, events) = mpsc::unbounded_channel();
        let readers = vec![
            tokio::spawn(forward_lines(stdout, OutputStream::Stdout, tx.clone())),
            tokio::spawn(forward_lines(stderr, OutputStream::Stderr, tx)),
        ];

        let mut state = RunningState {
            child,
            stdin,
            events,
            readers,
            last_command: String::new(),
            written_at: Instant::now(),
        };

        tokio::time::sleep(STARTUP_DELAY).await;
        check_started(&mut state).await?;

        for step in steps {
            debug!(step = %step, "Running init step");
            write_line(&mut state.stdin, step).await?;
            tokio::time::sleep(STARTUP_DELAY).await;
            check_started(&mut state).await?;
        }

        // Startup chatter is not part of any response.
        state.written_at = Instant::now();
        self.state = Some(state);
        Ok(())
    }

    async fn write(&mut self, command: &str) -> Result<(), SessionError> {
        let state = self.running()?;
        if let Some(status) = state.child.try_wait()? {
            return Err(SessionError::NotRunning(format!("session exited ({status})")));
        }

        state.written_at = Instant::now();
        state.last_command = command.to_string();
        write_line(&mut state.stdin, command).await
    }

    async fn await_response(&mut self) -> Result<String, SessionError> {
        let deadlines = Deadlines::for_timeout(self.spec.await_timeout);
        let state = self.running()?;

        let response = collect_response(
            &mut state.events,
            &state.last_command,
            state.written_at,
            deadlines,
        )
        .await;

        if !response.stderr.is_empty() {
            return Err(SessionError::Stderr(response.stderr_text()));
        }
        Ok(response.stdout_text())
    }

    async fn close(&mut self) {
        let Some(mut state) = self.state.take() else {
            return;
        };
        if let Ok(None) = state.child.try_wait() {
            if let Err(e) = state.child.kill().await {
                warn!("Failed to kill pipe session: {e}");
            }
        }
        for reader in state.readers {
            reader.abort();
        }
        debug!("Pipe session closed");
    }
}
