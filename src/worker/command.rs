// src/worker/command.rs

//! Worker backed by an external process.
//!
//! The task (or `null`) is written to the child's stdin as JSON. Whatever the
//! child prints on stdout becomes the work result: parsed as JSON when
//! possible, kept as a string otherwise. A non-zero exit is a worker failure.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, info};

use crate::tasks::Task;
use crate::worker::{WorkFuture, Worker, WorkerContext};

/// Keep at most this many bytes of stderr in an error message.
const STDERR_TAIL: usize = 2048;

#[derive(Debug, Clone)]
pub struct CommandWorker {
    cmd: String,
    worker_type: String,
    worker_id: String,
    honeycomb: PathBuf,
}

impl CommandWorker {
    pub fn new(cmd: impl Into<String>, ctx: &WorkerContext) -> Self {
        Self {
            cmd: cmd.into(),
            worker_type: ctx.worker_type.clone(),
            worker_id: ctx.worker_id.clone(),
            honeycomb: ctx.honeycomb_dir(),
        }
    }

    fn shell_command(&self) -> Command {
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cmd);
            c
        };

        cmd.env("QUEENBEE_WORKER_ID", &self.worker_id)
            .env("QUEENBEE_WORKER_TYPE", &self.worker_type)
            .env("QUEENBEE_HONEYCOMB", &self.honeycomb)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn run(&self, task: Option<Task>) -> Result<Value> {
        info!(
            worker_type = %self.worker_type,
            worker_id = %self.worker_id,
            cmd = %self.cmd,
            "starting worker process"
        );

        let input = serde_json::to_vec(&task).context("serializing task for worker stdin")?;

        let mut child = self
            .shell_command()
            .spawn()
            .with_context(|| format!("spawning process for worker '{}'", self.worker_type))?;

        let mut stdin = child.stdin.take().context("worker stdin not captured")?;
        let mut stdout = child.stdout.take().context("worker stdout not captured")?;
        let mut stderr = child.stderr.take().context("worker stderr not captured")?;

        // Feed stdin and drain both pipes concurrently so a chatty child can
        // never block on a full pipe.
        let write_input = async move {
            // A child that exits without reading stdin is not an error.
            let _ = stdin.write_all(&input).await;
            drop(stdin);
        };
        let mut out = Vec::new();
        let mut err = Vec::new();
        let (_, out_res, err_res, status) = tokio::join!(
            write_input,
            stdout.read_to_end(&mut out),
            stderr.read_to_end(&mut err),
            child.wait(),
        );
        out_res.context("reading worker stdout")?;
        err_res.context("reading worker stderr")?;
        let status = status
            .with_context(|| format!("waiting for process of worker '{}'", self.worker_type))?;

        let stderr_text = String::from_utf8_lossy(&err);
        for line in stderr_text.lines() {
            debug!(worker_type = %self.worker_type, "stderr: {}", line);
        }

        let code = status.code().unwrap_or(-1);
        info!(
            worker_type = %self.worker_type,
            worker_id = %self.worker_id,
            exit_code = code,
            success = status.success(),
            "worker process exited"
        );

        if !status.success() {
            bail!(
                "worker process exited with code {code}: {}",
                tail(stderr_text.trim(), STDERR_TAIL)
            );
        }

        Ok(parse_output(&String::from_utf8_lossy(&out)))
    }
}

impl Worker for CommandWorker {
    fn work(&mut self, task: Option<Task>) -> WorkFuture<'_> {
        Box::pin(self.run(task))
    }
}

/// JSON if it parses, the trimmed text otherwise, `null` if empty.
fn parse_output(stdout: &str) -> Value {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}

fn tail(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}
