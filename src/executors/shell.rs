// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Shell action
//!
//! Runs a shell command as a pipeline step.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::process::Command;

use super::StepAction;
use crate::errors::{PipeflowError, PipeflowResult};
use crate::pipeline::RunContext;

/// Shell command step
#[derive(Debug, Clone)]
pub struct ShellAction {
    command: String,
    shell: String,
    working_dir: PathBuf,
    env: HashMap<String, String>,
}

impl ShellAction {
    /// Create a shell action, checking the command and the shell up front
    pub fn new(
        command: impl Into<String>,
        shell: impl Into<String>,
        working_dir: impl Into<PathBuf>,
    ) -> PipeflowResult<Self> {
        let command = command.into();
        let shell = shell.into();

        if command.trim().is_empty() {
            return Err(PipeflowError::invalid_config(
                "shell step",
                "shell command is empty",
            ));
        }

        if which::which(&shell).is_err() {
            return Err(PipeflowError::invalid_config_with_help(
                "shell step",
                format!("shell '{}' not found", shell),
                format!("Install {} and ensure it's in your PATH", shell),
            ));
        }

        Ok(Self {
            command,
            shell,
            working_dir: working_dir.into(),
            env: HashMap::new(),
        })
    }

    /// Extra environment variables for the command
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    fn run_env(&self, context: &RunContext) -> anyhow::Result<HashMap<String, String>> {
        let mut env = self.env.clone();
        env.insert("PIPEFLOW_RUN_ID".into(), context.run_id.clone());
        env.insert("PIPEFLOW_PIPELINE".into(), context.pipeline_name.clone());
        env.insert(
            "PIPEFLOW_PARAMS".into(),
            serde_json::to_string(context.parameters())?,
        );

        for (key, value) in context.parameters() {
            let scalar = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            env.insert(format!("PIPEFLOW_PARAM_{}", env_key(key)), scalar);
        }

        Ok(env)
    }
}

/// Uppercase a parameter name and replace anything that is not `[A-Z0-9_]`
fn env_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl StepAction for ShellAction {
    async fn run(&self, context: &RunContext) -> anyhow::Result<Value> {
        let start = Instant::now();

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c").arg(&self.command);
        cmd.current_dir(&self.working_dir);
        cmd.envs(self.run_env(context)?);

        let output = cmd
            .output()
            .await
            .map_err(|e| anyhow::anyhow!("failed to spawn '{}': {}", self.shell, e))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let exit_code = output.status.code().unwrap_or(-1);

        tracing::debug!(
            command = %self.command,
            exit_code,
            duration_ms = start.elapsed().as_millis() as u64,
            "shell command finished"
        );

        if !output.status.success() {
            anyhow::bail!(
                "command exited with status {}: {}",
                exit_code,
                stderr.trim()
            );
        }

        Ok(json!({
            "stdout": stdout,
            "stderr": stderr,
            "exit_code": exit_code,
        }))
    }

    fn describe(&self) -> String {
        format!("{} -c '{}'", self.shell, self.command)
    }
}
