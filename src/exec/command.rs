// src/exec/command.rs

//! Units backed by a shell command.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::UnitConfig;
use crate::engine::{Results, UnitId, UnitSpec, UnitValue};
use crate::types::OutputFormat;

/// Environment variable holding the id of the running unit.
pub const UNIT_ENV: &str = "WAVEDAG_UNIT";

/// Environment variable holding a JSON object of dependency id -> value.
pub const INPUT_ENV: &str = "WAVEDAG_INPUT";

/// A unit whose producer runs `cmd` through the platform shell.
///
/// - Dependency results are passed in `WAVEDAG_INPUT` as a JSON object.
/// - Stdout becomes the unit's value (see [`OutputFormat`]).
/// - A non-zero exit status, unparsable output or an elapsed timeout fails
///   the unit.
#[derive(Debug, Clone)]
pub struct CommandUnit {
    pub id: UnitId,
    pub cmd: String,
    pub deps: Vec<UnitId>,
    pub output: OutputFormat,
    pub timeout: Option<Duration>,
}

impl CommandUnit {
    pub fn new(id: impl Into<UnitId>, cmd: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cmd: cmd.into(),
            deps: Vec::new(),
            output: OutputFormat::default(),
            timeout: None,
        }
    }

    pub fn from_config(id: impl Into<UnitId>, cfg: &UnitConfig, timeout: Option<Duration>) -> Self {
        Self {
            id: id.into(),
            cmd: cfg.cmd.clone(),
            deps: cfg.after.clone(),
            output: cfg.output,
            timeout,
        }
    }

    /// Wrap this command as a [`UnitSpec`] with the same dependencies.
    pub fn into_unit(self) -> UnitSpec {
        let deps = self.deps.clone();
        let id = self.id.clone();
        let unit = Arc::new(self);

        UnitSpec::new(id, move |results: Results| {
            let unit = Arc::clone(&unit);
            async move { unit.run(results).await }
        })
        .depends_on(deps)
    }

    /// Run the command once against the given results.
    pub async fn run(&self, results: Results) -> Result<UnitValue> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.run_inner(&results))
                .await
                .map_err(|_| {
                    warn!(unit = %self.id, timeout_secs = limit.as_secs(), "unit timed out; killing process");
                    anyhow!("unit '{}' timed out after {}s", self.id, limit.as_secs())
                })?,
            None => self.run_inner(&results).await,
        }
    }

    async fn run_inner(&self, results: &Results) -> Result<UnitValue> {
        let input = serde_json::Value::Object(results.subset(&self.deps));

        info!(unit = %self.id, cmd = %self.cmd, "starting unit process");

        // Build a shell command appropriate for the platform.
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cmd);
            c
        };

        cmd.env(UNIT_ENV, &self.id)
            .env(INPUT_ENV, input.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .with_context(|| format!("spawning process for unit '{}'", self.id))?;

        // Dropping this future (timeout) drops the child, which kills it.
        let output = child
            .wait_with_output()
            .await
            .with_context(|| format!("waiting for process of unit '{}'", self.id))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines() {
            debug!(unit = %self.id, "stderr: {}", line);
        }

        let code = output.status.code().unwrap_or(-1);
        info!(
            unit = %self.id,
            exit_code = code,
            success = output.status.success(),
            "unit process exited"
        );

        if !output.status.success() {
            let last = stderr.lines().rev().find(|l| !l.trim().is_empty());
            return Err(match last {
                Some(line) => anyhow!("command exited with code {code}: {}", line.trim()),
                None => anyhow!("command exited with code {code}"),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        self.parse_output(stdout.trim())
    }

    fn parse_output(&self, stdout: &str) -> Result<UnitValue> {
        match self.output {
            OutputFormat::Text => Ok(UnitValue::String(stdout.to_string())),
            OutputFormat::Json if stdout.is_empty() => Ok(UnitValue::Null),
            OutputFormat::Json => serde_json::from_str(stdout)
                .with_context(|| format!("unit '{}' did not print valid JSON", self.id)),
        }
    }
}
