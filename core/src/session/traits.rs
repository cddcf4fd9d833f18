//! Interactive shell session abstraction.
//!
//! An Item that needs a stateful data source owns one boxed
//! [`InteractiveShell`]. Which implementation it gets is decided by a
//! [`SessionSpawner`], so tests can inject scripted sessions while the
//! engine uses [`DefaultSpawner`] (PTY or pipe, per the item's `pty` flag).

use std::time::Duration;

use crate::errors::SessionError;
use crate::session::pipe::PipeSession;
use crate::session::pty::PtySession;
use crate::session::shell::Environment;

/// Lower bound for a session's await timeout.
pub const MIN_AWAIT_TIMEOUT: Duration = Duration::from_millis(100);

/// Upper bound for a session's await timeout.
pub const MAX_AWAIT_TIMEOUT: Duration = Duration::from_secs(1);

/// Settling delay after starting a session and after each init command.
pub const STARTUP_DELAY: Duration = Duration::from_millis(200);

/// Which subprocess attachment a session uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// Subprocess attached to a pseudo-terminal.
    Pty,
    /// Subprocess attached to separate stdin/stdout/stderr pipes.
    Pipe,
}

impl SessionKind {
    pub fn from_pty_flag(uses_pty: bool) -> Self {
        if uses_pty {
            Self::Pty
        } else {
            Self::Pipe
        }
    }
}

/// Everything needed to start a session for one item.
#[derive(Debug, Clone)]
pub struct SessionSpec {
    pub kind: SessionKind,
    /// `init_scripts[0]` is the session process; the rest are written to it
    /// one by one during initialization.
    pub init_scripts: Vec<String>,
    /// Response collection budget, see [`await_timeout_for`].
    pub await_timeout: Duration,
}

/// Derive a session await timeout from an item's polling rate.
pub fn await_timeout_for(rate: Duration) -> Duration {
    rate.clamp(MIN_AWAIT_TIMEOUT, MAX_AWAIT_TIMEOUT)
}

/// A supervised long-running subprocess used for repeated queries.
///
/// Lifecycle: construct (uninitialized) → [`init`](Self::init) → any
/// number of [`write`](Self::write) / [`await_response`](Self::await_response)
/// pairs → [`close`](Self::close). A session whose `init` failed must be
/// closed and discarded, never reused.
#[async_trait::async_trait]
pub trait InteractiveShell: Send {
    /// Variant of this session.
    fn kind(&self) -> SessionKind;

    /// Spawn the subprocess and run the init sequence.
    async fn init(&mut self, env: &Environment) -> Result<(), SessionError>;

    /// Write one command line to the session.
    async fn write(&mut self, command: &str) -> Result<(), SessionError>;

    /// Collect the response to the last written command.
    async fn await_response(&mut self) -> Result<String, SessionError>;

    /// Terminate the subprocess (if still alive) and release its handles.
    async fn close(&mut self);
}

/// Factory for sessions, injected into items.
pub trait SessionSpawner: Send + Sync {
    fn spawn(&self, spec: &SessionSpec) -> Box<dyn InteractiveShell>;
}

/// Spawner selecting [`PtySession`] or [`PipeSession`] by kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSpawner;

impl SessionSpawner for DefaultSpawner {
    fn spawn(&self, spec: &SessionSpec) -> Box<dyn InteractiveShell> {
        match spec.kind {
            SessionKind::Pty => Box::new(PtySession::new(spec.clone())),
            SessionKind::Pipe => Box::new(PipeSession::new(spec.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn _assert_object_safe(_: &dyn InteractiveShell) {}
    fn _assert_send<T: Send>() {}
    fn _assert_sync<T: Sync>() {}

    #[test]
    fn boxed_session_is_send() {
        _assert_send::<Box<dyn InteractiveShell>>();
        _assert_sync::<DefaultSpawner>();
    }

    #[test]
    fn await_timeout_is_clamped() {
        assert_eq!(await_timeout_for(Duration::from_millis(10)), MIN_AWAIT_TIMEOUT);
        assert_eq!(
            await_timeout_for(Duration::from_millis(500)),
            Duration::from_millis(500)
        );
        assert_eq!(await_timeout_for(Duration::from_secs(60)), MAX_AWAIT_TIMEOUT);
    }

    #[test]
    fn kind_from_pty_flag() {
        assert_eq!(SessionKind::from_pty_flag(true), SessionKind::Pty);
        assert_eq!(SessionKind::from_pty_flag(false), SessionKind::Pipe);
    }

    #[test]
    fn default_spawner_selects_variant() {
        let spec = SessionSpec {
            kind: SessionKind::Pipe,
            init_scripts: vec!["sh".into()],
            await_timeout: MIN_AWAIT_TIMEOUT,
        };
        assert_eq!(DefaultSpawner.spawn(&spec).kind(), SessionKind::Pipe);

        let spec = SessionSpec {
            kind: SessionKind::Pty,
            ..spec
        };
        assert_eq!(DefaultSpawner.spawn(&spec).kind(), SessionKind::Pty);
    }
}
