//! Shell command building and the merged script environment.
//!
//! Pure-logic helpers with no I/O: every script the engine runs (one-shot,
//! pipe session, PTY session) is described by a [`ShellCommand`] built
//! here, and every one of them receives an explicit [`Environment`] value
//! rather than reading or mutating process-wide state.

use std::collections::BTreeMap;

use crate::errors::ConfigError;

/// Shell used for every script invocation.
pub const SHELL_PROGRAM: &str = "sh";

/// Default PTY column count for interactive sessions.
pub const DEFAULT_COLS: u16 = 80;

/// Default PTY row count for interactive sessions.
pub const DEFAULT_ROWS: u16 = 24;

/// Ordered `name=value` variables passed to scripts on top of the ambient
/// process environment.
///
/// Entries are applied in order, so a later entry wins over an earlier one
/// with the same name. [`Environment::merge`] puts file variables first and
/// CLI variables last, which is what gives the CLI precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: Vec<(String, String)>,
}

impl Environment {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge file-defined variables with CLI `name=value` assignments.
    ///
    /// CLI assignments take precedence over file variables of the same name.
    pub fn merge(
        file_vars: &BTreeMap<String, String>,
        cli_vars: &[String],
    ) -> Result<Self, ConfigError> {
        let mut env = Self::new();
        for (name, value) in file_vars {
            env.push(name, value);
        }
        for assignment in cli_vars {
            let (name, value) = parse_assignment(assignment)?;
            env.push(name, value);
        }
        Ok(env)
    }

    /// Append a variable. It overrides any earlier entry with the same name.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.push((name.into(), value.into()));
    }

    /// Return a copy of this environment with `overlay` applied on top.
    pub fn with(&self, overlay: &[(&str, &str)]) -> Self {
        let mut env = self.clone();
        for (name, value) in overlay {
            env.push(*name, *value);
        }
        env
    }

    /// Effective value of `name` (the last entry wins).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate over entries in application order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Split a `name=value` assignment at the first `=`.
pub fn parse_assignment(assignment: &str) -> Result<(String, String), ConfigError> {
    match assignment.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(ConfigError::InvalidVariable(assignment.to_string())),
    }
}

/// Resolved `sh -c <script>` invocation ready for spawning.
///
/// Consumers turn this into a `tokio::process::Command` (one-shot scripts
/// and pipe sessions) or a `portable_pty::CommandBuilder` (PTY sessions).
#[derive(Debug, Clone)]
pub struct ShellCommand {
    /// Executable, always [`SHELL_PROGRAM`].
    pub program: String,
    /// Arguments: `-c` followed by the script.
    pub args: Vec<String>,
    /// Variables applied in order on top of the inherited environment.
    pub env: Vec<(String, String)>,
    /// PTY column count (ignored by non-PTY consumers).
    pub cols: u16,
    /// PTY row count (ignored by non-PTY consumers).
    pub rows: u16,
}

/// Build the command that runs `script` with `env` overlaid on the ambient
/// process environment.
pub fn build_script_command(script: &str, env: &Environment) -> ShellCommand {
    ShellCommand {
        program: SHELL_PROGRAM.to_string(),
        args: vec!["-c".to_string(), script.to_string()],
        env: env
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect(),
        cols: DEFAULT_COLS,
        rows: DEFAULT_ROWS,
    }
}

impl ShellCommand {
    /// Convert into a tokio command. Stdio configuration is left to the caller.
    pub fn to_tokio_command(&self) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(&self.program);
        command.args(&self.args);
        for (name, value) in &self.env {
            command.env(name, value);
        }
        command
    }
}

/// Format a command line for writing into an interactive session.
///
/// The leading space keeps sampling commands out of interactive shell
/// history (`HISTCONTROL=ignorespace`).
pub fn session_line(command: &str) -> String {
    format!(" {command}\n")
}
