//! A single configured data source.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::ItemConfig;
use crate::errors::SamplingError;
use crate::output::strip_ansi;
use crate::session::script::run_script;
use crate::session::shell::Environment;
use crate::session::traits::{
    await_timeout_for, DefaultSpawner, InteractiveShell, SessionKind, SessionSpawner, SessionSpec,
};

/// Consecutive write failures tolerated before a session is replaced.
pub const ERROR_THRESHOLD: u32 = 10;

/// A data source polled by a [`Sampler`](crate::sampling::Sampler).
///
/// Stateless items spawn `sh -c <sample>` on every call. Items with init
/// scripts keep one interactive session alive and write the sample
/// command into it instead.
pub struct Item {
    label: String,
    sample_script: String,
    init_scripts: Vec<String>,
    transform_script: Option<String>,
    uses_pty: bool,
    rate: Duration,
    color: Option<String>,
    spawner: Arc<dyn SessionSpawner>,
    session: Option<Box<dyn InteractiveShell>>,
    consecutive_errors: u32,
}

impl Item {
    pub fn new(label: impl Into<String>, sample_script: impl Into<String>, rate: Duration) -> Self {
        Self {
            label: label.into(),
            sample_script: sample_script.into(),
            init_scripts: Vec::new(),
            transform_script: None,
            uses_pty: false,
            rate,
            color: None,
            spawner: Arc::new(DefaultSpawner),
            session: None,
            consecutive_errors: 0,
        }
    }

    pub fn from_config(config: &ItemConfig, label: impl Into<String>, rate: Duration) -> Self {
        let mut item = Self::new(label, config.sample.clone(), rate)
            .with_init_scripts(config.init_scripts())
            .with_pty(config.pty);
        item.transform_script = config.transform.clone();
        item.color = config.color.clone();
        item
    }

    pub fn with_init_scripts(mut self, init_scripts: Vec<String>) -> Self {
        self.init_scripts = init_scripts;
        self
    }

    pub fn with_transform(mut self, transform_script: impl Into<String>) -> Self {
        self.transform_script = Some(transform_script.into());
        self
    }

    pub fn with_pty(mut self, uses_pty: bool) -> Self {
        self.uses_pty = uses_pty;
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Replace the session factory (tests inject scripted sessions).
    pub fn with_spawner(mut self, spawner: Arc<dyn SessionSpawner>) -> Self {
        self.spawner = spawner;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    pub fn rate(&self) -> Duration {
        self.rate
    }

    pub fn uses_pty(&self) -> bool {
        self.uses_pty
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Produce the item's next value.
    pub async fn next_value(&mut self, env: &Environment) -> Result<String, SamplingError> {
        let value = if self.init_scripts.is_empty() {
            let output = run_script(&self.sample_script, env)
                .await
                .map_err(SamplingError::Script)?;
            strip_ansi(&output).trim().to_string()
        } else {
            self.sample_session(env).await?.trim().to_string()
        };

        match &self.transform_script {
            Some(transform) if !value.is_empty() => {
                let env = env.with(&[("sample", value.as_str())]);
                let output = run_script(transform, &env)
                    .await
                    .map_err(SamplingError::Transform)?;
                Ok(strip_ansi(&output).trim().to_string())
            }
            _ => Ok(value),
        }
    }

    /// Close the session, if any.
    pub async fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close().await;
        }
        self.consecutive_errors = 0;
    }

    async fn sample_session(&mut self, env: &Environment) -> Result<String, SamplingError> {
        let mut session = match self.session.take() {
            Some(session) => session,
            None => self.start_session(env).await?,
        };

        if let Err(e) = session.write(&self.sample_script).await {
            self.consecutive_errors += 1;
            if self.consecutive_errors > ERROR_THRESHOLD {
                warn!(
                    label = %self.label,
                    errors = self.consecutive_errors,
                    "Too many session errors, restarting session"
                );
                session.close().await;
                self.consecutive_errors = 0;
            } else {
                self.session = Some(session);
            }
            return Err(SamplingError::Write(e));
        }
        self.consecutive_errors = 0;

        let response = session.await_response().await;
        self.session = Some(session);
        response.map_err(SamplingError::Read)
    }

    async fn start_session(
        &mut self,
        env: &Environment,
    ) -> Result<Box<dyn InteractiveShell>, SamplingError> {
        let spec = SessionSpec {
            kind: SessionKind::from_pty_flag(self.uses_pty),
            init_scripts: self.init_scripts.clone(),
            await_timeout: await_timeout_for(self.rate),
        };
        debug!(label = %self.label, kind = ?spec.kind, "Starting session");

        let mut session = self.spawner.spawn(&spec);
        if let Err(e) = session.init(env).await {
            session.close().await;
            return Err(SamplingError::Init(e));
        }
        Ok(session)
    }
}

impl std::fmt::Debug for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Item")
            .field("label", &self.label)
            .field("sample_script", &self.sample_script)
            .field("init_scripts", &self.init_scripts)
            .field("uses_pty", &self.uses_pty)
            .field("rate", &self.rate)
            .field("has_session", &self.session.is_some())
            .field("consecutive_errors", &self.consecutive_errors)
            .finish()
    }
}
