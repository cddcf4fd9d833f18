//! Output events and the soft/hard deadline response collector shared by
//! both session variants.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

use crate::output::clean_line;

/// Multiple of the await timeout used as the hard deadline.
pub const HARD_DEADLINE_FACTOR: u32 = 100;

/// Which subprocess stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// One line of session output, stamped when the reader received it.
#[derive(Debug, Clone)]
pub struct OutputEvent {
    pub stream: OutputStream,
    pub line: String,
    pub at: Instant,
}

impl OutputEvent {
    pub fn now(stream: OutputStream, line: impl Into<String>) -> Self {
        Self {
            stream,
            line: line.into(),
            at: Instant::now(),
        }
    }
}

pub type OutputEventSender = mpsc::UnboundedSender<OutputEvent>;
pub type OutputEventReceiver = mpsc::UnboundedReceiver<OutputEvent>;

/// The two waiting phases of [`collect_response`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadlines {
    /// Return as soon as this elapses if anything was collected.
    pub soft: Duration,
    /// Give up waiting for output entirely.
    pub hard: Duration,
}

impl Deadlines {
    pub fn for_timeout(await_timeout: Duration) -> Self {
        Self {
            soft: await_timeout / 2,
            hard: await_timeout * HARD_DEADLINE_FACTOR,
        }
    }
}

/// Cleaned lines collected for one command, split by stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl Response {
    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty() && self.stderr.is_empty()
    }

    pub fn stdout_text(&self) -> String {
        self.stdout.join("\n")
    }

    pub fn stderr_text(&self) -> String {
        self.stderr.join("\n")
    }

    fn push(&mut self, stream: OutputStream, line: String) {
        match stream {
            OutputStream::Stdout => self.stdout.push(line),
            OutputStream::Stderr => self.stderr.push(line),
        }
    }
}

/// Whether `line` is the terminal's echo of `command`.
///
/// Matches the bare echo and a prompt followed by the echo (`$  uptime`).
pub fn is_echo(line: &str, command: &str) -> bool {
    let command = command.trim();
    !command.is_empty() && (line == command || line.ends_with(command))
}

/// Collect the response to `command`, written at `written_at`.
///
/// Two timers race against the output queue:
/// - at the soft deadline, return immediately if anything was collected;
///   otherwise keep waiting and return as soon as the first line arrives;
/// - at the hard deadline, return whatever there is (possibly nothing).
///
/// Lines received before `written_at` belong to an earlier command and are
/// dropped, as are empty lines and echoes of `command`. The collector also
/// returns early when the queue closes (the process exited).
pub async fn collect_response(
    events: &mut OutputEventReceiver,
    command: &str,
    written_at: Instant,
    deadlines: Deadlines,
) -> Response {
    let start = Instant::now();
    let soft = sleep_until(start + deadlines.soft);
    let hard = sleep_until(start + deadlines.hard);
    tokio::pin!(soft);
    tokio::pin!(hard);

    let mut response = Response::default();
    let mut soft_elapsed = false;

    loop {
        tokio::select! {
            biased;

            event = events.recv() => {
                let Some(event) = event else { break };
                if event.at < written_at {
                    continue;
                }
                let line = clean_line(&event.line);
                if line.is_empty() || is_echo(&line, command) {
                    continue;
                }
                response.push(event.stream, line);
                if soft_elapsed {
                    break;
                }
            }

            _ = &mut soft, if !soft_elapsed => {
                if !response.is_empty() {
                    break;
                }
                soft_elapsed = true;
            }

            _ = &mut hard => break,
        }
    }

    response
}
