//! Rendering surface hosted in a child process.
//!
//! The child receives the viewer URL as its last argument, reads outbound
//! commands as JSON lines on stdin and reports inbound messages as JSON lines
//! on stdout.

use std::process::Stdio;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use flipbridge_core::message::encode_command;
use flipbridge_core::{Envelope, InstanceId, OutboundCommand, SurfaceTransport};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, info};

struct RunningSurface {
    instance: InstanceId,
    child: Child,
    stdin: ChildStdin,
    reader: JoinHandle<()>,
}

pub struct ProcessSurface {
    program: String,
    args: Vec<String>,
    outbox: UnboundedSender<Envelope>,
    running: Option<RunningSurface>,
}

impl ProcessSurface {
    pub fn new(program: String, args: Vec<String>, outbox: UnboundedSender<Envelope>) -> Self {
        Self {
            program,
            args,
            outbox,
            running: None,
        }
    }
}

async fn forward_lines(
    instance: InstanceId,
    stdout: ChildStdout,
    outbox: UnboundedSender<Envelope>,
) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                if outbox.send(Envelope::new(instance, line)).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(err) => {
                debug!(?err, %instance, "failed to read surface output");
                break;
            }
        }
    }
    debug!(%instance, "surface output closed");
}

#[async_trait]
impl SurfaceTransport for ProcessSurface {
    async fn mount(&mut self, instance: InstanceId, viewer_url: &str) -> Result<()> {
        self.unmount().await?;
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(viewer_url)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn surface {:?}", self.program))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("surface stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("surface stdout unavailable"))?;
        let reader = tokio::spawn(forward_lines(instance, stdout, self.outbox.clone()));
        info!(%instance, program = %self.program, "surface process started");
        self.running = Some(RunningSurface {
            instance,
            child,
            stdin,
            reader,
        });
        Ok(())
    }

    async fn post(&mut self, command: &OutboundCommand) -> Result<()> {
        let running = self
            .running
            .as_mut()
            .ok_or_else(|| anyhow!("no surface process running"))?;
        let mut line = encode_command(command)?;
        line.push('\n');
        running
            .stdin
            .write_all(line.as_bytes())
            .await
            .with_context(|| format!("failed to write to surface {}", running.instance))?;
        running.stdin.flush().await?;
        Ok(())
    }

    async fn unmount(&mut self) -> Result<()> {
        if let Some(mut running) = self.running.take() {
            running.reader.abort();
            drop(running.stdin);
            if let Err(err) = running.child.kill().await {
                debug!(?err, instance = %running.instance, "surface process already exited");
            }
            info!(instance = %running.instance, "surface process stopped");
        }
        Ok(())
    }
}
