//! One-shot script execution.

use std::process::Stdio;

use tracing::trace;

use crate::errors::ScriptError;
use crate::session::shell::{build_script_command, Environment};

/// Run `script` once through `sh -c` and return its raw stdout.
///
/// `env` is applied on top of the ambient process environment. A non-zero
/// exit is an error carrying the script's stderr. There is no timeout: a
/// hung script blocks only the calling task.
pub async fn run_script(script: &str, env: &Environment) -> Result<String, ScriptError> {
    let mut command = build_script_command(script, env).to_tokio_command();
    command.stdin(Stdio::null());

    let output = command.output().await?;
    trace!(script, status = %output.status, "Script finished");

    if !output.status.success() {
        return Err(ScriptError::Failed {
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_stdout() {
        let out = run_script("echo 42", &Environment::new()).await.unwrap();
        assert_eq!(out, "42\n");
    }

    #[tokio::test]
    async fn passes_environment() {
        let mut env = Environment::new();
        env.push("GREETING", "hello");
        let out = run_script("printf '%s' \"$GREETING\"", &env).await.unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn later_entries_override_earlier_ones() {
        let mut env = Environment::new();
        env.push("FOO", "1");
        env.push("FOO", "2");
        let out = run_script("printf '%s' \"$FOO\"", &env).await.unwrap();
        assert_eq!(out, "2");
    }

    #[tokio::test]
    async fn inherits_ambient_environment() {
        let out = run_script("printf '%s' \"$PATH\"", &Environment::new())
            .await
            .unwrap();
        assert!(!out.is_empty());
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_error_with_stderr() {
        let err = run_script("echo broken >&2; exit 3", &Environment::new())
            .await
            .unwrap_err();
        match err {
            ScriptError::Failed { code, ref stderr } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr.trim(), "broken");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.to_string(), "broken");
    }

    #[tokio::test]
    async fn does_not_read_stdin() {
        let out = run_script("cat; echo done", &Environment::new())
            .await
            .unwrap();
        assert_eq!(out, "done\n");
    }
}
