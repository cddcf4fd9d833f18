//! Script execution: one-shot scripts and long-lived interactive sessions.

pub mod pipe;
pub mod pty;
pub mod response;
pub mod script;
pub mod shell;
pub mod traits;

pub use pipe::PipeSession;
pub use pty::PtySession;
pub use script::run_script;
pub use shell::Environment;
pub use traits::{
    await_timeout_for, DefaultSpawner, InteractiveShell, SessionKind, SessionSpawner, SessionSpec,
    STARTUP_DELAY,
};
