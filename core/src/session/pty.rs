//! Interactive session attached to a pseudo-terminal.
//!
//! Uses `portable-pty`. The PTY master is read on a dedicated OS thread
//! (blocking reads) that splits output into lines and bridges them into a
//! tokio channel. Without the `pty` feature, [`PtySession::init`] reports
//! the mode as unsupported.

use crate::errors::SessionError;
use crate::session::shell::Environment;
use crate::session::traits::{InteractiveShell, SessionKind, SessionSpec};

#[cfg(feature = "pty")]
pub use backend::PtySession;

#[cfg(not(feature = "pty"))]
pub use unsupported::PtySession;

#[cfg(feature = "pty")]
mod backend {
    use std::io::{Read, Write};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use portable_pty::{native_pty_system, CommandBuilder, MasterPty, PtySize};
    use tokio::sync::mpsc;
    use tokio::time::{timeout, Instant};
    use tracing::{debug, info};

    use super::*;
    use crate::session::response::{
        collect_response, Deadlines, OutputEvent, OutputEventReceiver, OutputEventSender,
        OutputStream,
    };
    use crate::session::shell::{build_script_command, session_line};
    use crate::session::traits::STARTUP_DELAY;

    /// PTY-attached interactive session.
    pub struct PtySession {
        spec: SessionSpec,
        state: Option<PtyState>,
    }

    struct PtyState {
        // Kept alive so the reader sees EOF only when the session ends.
        _master: Box<dyn MasterPty + Send>,
        writer: Box<dyn Write + Send>,
        child: Box<dyn portable_pty::Child + Send + Sync>,
        alive: Arc<AtomicBool>,
        events: OutputEventReceiver,
        last_command: String,
        written_at: Instant,
    }

    impl Drop for PtyState {
        fn drop(&mut self) {
            if self.alive.swap(false, Ordering::SeqCst) {
                let _ = self.child.kill();
            }
        }
    }

    impl PtySession {
        pub fn new(spec: SessionSpec) -> Self {
            Self { spec, state: None }
        }

        fn running(&mut self) -> Result<&mut PtyState, SessionError> {
            self.state
                .as_mut()
                .ok_or_else(|| SessionError::NotRunning("session not initialized".to_string()))
        }

        fn spawn(&self, program: &str, env: &Environment) -> Result<PtyState, SessionError> {
            let shell_cmd = build_script_command(program, env);

            let pty_pair = native_pty_system()
                .openpty(PtySize {
                    rows: shell_cmd.rows,
                    cols: shell_cmd.cols,
                    pixel_width: 0,
                    pixel_height: 0,
                })
                .map_err(|e| SessionError::SpawnFailed(e.to_string()))?;

            let mut command = CommandBuilder::new(&shell_cmd.program);
            for arg in &shell_cmd.args {
                command.arg(arg);
            }
            for (key, value) in &shell_cmd.env {
                command.env(key, value);
            }
            if let Ok(cwd) = std::env::current_dir() {
                command.cwd(cwd);
            }

            let child = pty_pair
                .slave
                .spawn_command(command)
                .map_err(|e| SessionError::SpawnFailed(e.to_string()))?;
            drop(pty_pair.slave);

            let writer = pty_pair
                .master
                .take_writer()
                .map_err(|e| SessionError::SpawnFailed(e.to_string()))?;
            let reader = pty_pair
                .master
                .try_clone_reader()
                .map_err(|e| SessionError::SpawnFailed(e.to_string()))?;

            let alive = Arc::new(AtomicBool::new(true));
            let (tx, events) = mpsc::unbounded_channel();
            let alive_clone = alive.clone();
            std::thread::spawn(move || read_lines(reader, tx, alive_clone));

            Ok(PtyState {
                _master: pty_pair.master,
                writer,
                child,
                alive,
                events,
                last_command: String::new(),
                written_at: Instant::now(),
            })
        }
    }

    /// Blocking reader loop: split PTY output on `\n` and publish each line.
    fn read_lines(mut reader: Box<dyn Read + Send>, tx: OutputEventSender, alive: Arc<AtomicBool>) {
        let mut buf = [0u8; 4096];
        let mut pending: Vec<u8> = Vec::new();
        loop {
            match reader.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    pending.extend_from_slice(&buf[..n]);
                    while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
                        let line: Vec<u8> = pending.drain(..=pos).collect();
                        let line = String::from_utf8_lossy(&line[..line.len() - 1]);
                        if tx.send(OutputEvent::now(OutputStream::Stdout, line)).is_err() {
                            return;
                        }
                    }
                }
            }
        }
        if !pending.is_empty() {
            let line = String::from_utf8_lossy(&pending);
            let _ = tx.send(OutputEvent::now(OutputStream::Stdout, line));
        }
        alive.store(false, Ordering::SeqCst);
    }

    fn write_line(state: &mut PtyState, command: &str) -> Result<(), SessionError> {
        state.writer.write_all(session_line(command).as_bytes())?;
        state.writer.flush()?;
        Ok(())
    }

    #[async_trait::async_trait]
    impl InteractiveShell for PtySession {
        fn kind(&self) -> SessionKind {
            SessionKind::Pty
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

            info!(init = %program, "Starting PTY session");
            let state = self.spawn(program, env)?;
            let state = self.state.insert(state);

            // Discard the banner/prompt the process prints on startup.
            if let Ok(None) = timeout(STARTUP_DELAY, state.events.recv()).await {
                return Err(SessionError::SpawnFailed(
                    "session exited during startup".to_string(),
                ));
            }
            tokio::time::sleep(STARTUP_DELAY).await;
            while state.events.try_recv().is_ok() {}

            for step in steps {
                debug!(step = %step, "Running init step");
                write_line(state, step)?;
                tokio::time::sleep(STARTUP_DELAY).await;
            }

            state.written_at = Instant::now();
            Ok(())
        }

        async fn write(&mut self, command: &str) -> Result<(), SessionError> {
            let state = self.running()?;
            if !state.alive.load(Ordering::SeqCst) {
                return Err(SessionError::NotRunning("session exited".to_string()));
            }

            state.written_at = Instant::now();
            state.last_command = command.to_string();
            write_line(state, command)
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
            Ok(response.stdout_text())
        }

        async fn close(&mut self) {
            if let Some(mut state) = self.state.take() {
                state.alive.store(false, Ordering::SeqCst);
                let _ = state.child.kill();
                debug!("PTY session closed");
            }
        }
    }

}

#[cfg(not(feature = "pty"))]
mod unsupported {
    use super::*;

    /// Placeholder used when PTY support is compiled out.
    pub struct PtySession {
        _spec: SessionSpec,
    }

    impl PtySession {
        pub fn new(spec: SessionSpec) -> Self {
            Self { _spec: spec }
        }
    }

    #[async_trait::async_trait]
    impl InteractiveShell for PtySession {
        fn kind(&self) -> SessionKind {
            SessionKind::Pty
        }

        async fn init(&mut self, _env: &Environment) -> Result<(), SessionError> {
            Err(SessionError::Unsupported("PTY mode".to_string()))
        }

        async fn write(&mut self, _command: &str) -> Result<(), SessionError> {
            Err(SessionError::NotRunning("PTY mode unavailable".to_string()))
        }

        async fn await_response(&mut self) -> Result<String, SessionError> {
            Err(SessionError::NotRunning("PTY mode unavailable".to_string()))
        }

        async fn close(&mut self) {}
    }

    #[cfg(test)]
    mod tests {
        use std::time::Duration;

        use super::*;

        #[tokio::test]
        async fn init_reports_unsupported() {
            let mut session = PtySession::new(SessionSpec {
                kind: SessionKind::Pty,
                init_scripts: vec!["sh".to_string()],
                await_timeout: Duration::from_millis(500),
            });
            assert_eq!(session.kind(), SessionKind::Pty);
            assert!(matches!(
                session.init(&Environment::new()).await,
                Err(SessionError::Unsupported(_))
            ));
            assert!(matches!(
                session.write("echo 1").await,
                Err(SessionError::NotRunning(_))
            ));
        }
    }
}
