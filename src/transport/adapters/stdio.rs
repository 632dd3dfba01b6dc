//! Newline-delimited JSON-RPC over a child process's stdin/stdout.

use crate::{
    tool_registry::domain::StdioTransportConfig,
    transport::{
        domain::{
            JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, TransportError,
            TransportResult,
        },
        ports::RpcChannel,
    },
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex as AsyncMutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Grace period between SIGTERM and a forced kill.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_millis(500);

type PendingMap = HashMap<u64, oneshot::Sender<JsonRpcResponse>>;

#[derive(Debug, Default)]
struct PendingRequests {
    slots: Mutex<PendingMap>,
}

impl PendingRequests {
    fn lock(&self) -> TransportResult<MutexGuard<'_, PendingMap>> {
        self.slots
            .lock()
            .map_err(|err| TransportError::Connection(format!("pending map poisoned: {err}")))
    }

    fn resolve(&self, response: JsonRpcResponse) {
        let Some(id) = response.numeric_id() else {
            debug!(id = %response.id, "dropping response without numeric id");
            return;
        };
        let Some(slot) = self.lock().ok().and_then(|mut slots| slots.remove(&id)) else {
            debug!(id, "dropping response for unknown request");
            return;
        };
        if slot.send(response).is_err() {
            debug!(id, "caller abandoned request before response arrived");
        }
    }

    fn fail_all(&self) {
        if let Ok(mut slots) = self.lock() {
            slots.clear();
        }
    }
}

/// Removes an abandoned request's slot when its future is dropped.
struct PendingSlot<'a> {
    pending: &'a PendingRequests,
    id: u64,
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        if let Ok(mut slots) = self.pending.lock() {
            slots.remove(&self.id);
        }
    }
}

/// JSON-RPC channel to a spawned MCP server process.
pub struct StdioChannel {
    label: String,
    stdin: AsyncMutex<Option<ChildStdin>>,
    child: AsyncMutex<Option<Child>>,
    pending: Arc<PendingRequests>,
    alive: Arc<AtomicBool>,
    closed: AtomicBool,
    next_id: AtomicU64,
    reader: Mutex<Option<JoinHandle<()>>>,
    stop_grace: Duration,
}

impl StdioChannel {
    /// Spawns the configured command with piped stdio and starts the reader
    /// task.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Connection`] when the process cannot be
    /// spawned or its pipes are unavailable.
    pub fn spawn(config: &StdioTransportConfig, stop_grace: Duration) -> TransportResult<Self> {
        let mut command = Command::new(config.command());
        command
            .args(config.args())
            .envs(config.environment())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(directory) = config.cwd() {
            command.current_dir(directory);
        }

        let mut child = command.spawn().map_err(|err| {
            TransportError::Connection(format!("failed to spawn '{}': {err}", config.command()))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Connection("child stdin unavailable".to_owned()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Connection("child stdout unavailable".to_owned()))?;

        let label = config.command().to_owned();
        let pending = Arc::new(PendingRequests::default());
        let alive = Arc::new(AtomicBool::new(true));
        let reader = tokio::spawn(read_responses(
            label.clone(),
            stdout,
            Arc::clone(&pending),
            Arc::clone(&alive),
        ));
        debug!(command = %label, pid = ?child.id(), "spawned stdio MCP server");

        Ok(Self {
            label,
            stdin: AsyncMutex::new(Some(stdin)),
            child: AsyncMutex::new(Some(child)),
            pending,
            alive,
            closed: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            reader: Mutex::new(Some(reader)),
            stop_grace,
        })
    }

    async fn write_line(&self, line: String) -> TransportResult<()> {
        let mut guard = self.stdin.lock().await;
        let stdin = guard.as_mut().ok_or(TransportError::Closed)?;
        let framed = line + "\n";
        let written = async {
            stdin.write_all(framed.as_bytes()).await?;
            stdin.flush().await
        }
        .await;
        written.map_err(|err| {
            self.alive.store(false, Ordering::Release);
            TransportError::Connection(format!("write to '{}' failed: {err}", self.label))
        })
    }

    async fn stop_child(&self) -> TransportResult<()> {
        let Some(mut child) = self.child.lock().await.take() else {
            return Ok(());
        };

        send_terminate(&child);
        match tokio::time::timeout(self.stop_grace, child.wait()).await {
            Ok(Ok(status)) => {
                debug!(command = %self.label, %status, "stdio MCP server exited");
                Ok(())
            }
            Ok(Err(err)) => Err(TransportError::connection(err)),
            Err(_) => {
                warn!(
                    command = %self.label,
                    grace_ms = self.stop_grace.as_millis(),
                    "stdio MCP server ignored SIGTERM; killing"
                );
                child.kill().await.map_err(TransportError::connection)
            }
        }
    }
}

#[async_trait]
impl RpcChannel for StdioChannel {
    async fn request(&self, method: &str, params: Option<Value>) -> TransportResult<Value> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let line = serde_json::to_string(&JsonRpcRequest::new(id, method, params))
            .map_err(TransportError::protocol)?;
        let (sender, receiver) = oneshot::channel();
        self.pending.lock()?.insert(id, sender);
        let _slot = PendingSlot {
            pending: &self.pending,
            id,
        };
        if !self.alive.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }

        debug!(command = %self.label, id, method, "stdio request");
        self.write_line(line).await?;
        let response = receiver.await.map_err(|_| TransportError::Closed)?;
        response.into_result()
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> TransportResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        let line = serde_json::to_string(&JsonRpcNotification::new(method, params))
            .map_err(TransportError::protocol)?;
        self.write_line(line).await
    }

    async fn close(&self) -> TransportResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        drop(self.stdin.lock().await.take());
        let stopped = self.stop_child().await;
        self.alive.store(false, Ordering::Release);
        if let Some(reader) = self.reader.lock().ok().and_then(|mut handle| handle.take()) {
            reader.abort();
        }
        self.pending.fail_all();
        stopped
    }

    fn is_alive(&self) -> bool {
        !self.closed.load(Ordering::Acquire) && self.alive.load(Ordering::Acquire)
    }
}

async fn read_responses(
    label: String,
    stdout: ChildStdout,
    pending: Arc<PendingRequests>,
    alive: Arc<AtomicBool>,
) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match serde_json::from_str::<JsonRpcResponse>(trimmed) {
                    Ok(response) => pending.resolve(response),
                    Err(err) => debug!(command = %label, %err, "ignoring non JSON-RPC line"),
                }
            }
            Ok(None) => break,
            Err(err) => {
                warn!(command = %label, %err, "stdio read failed");
                break;
            }
        }
    }

    alive.store(false, Ordering::Release);
    pending.fail_all();
    debug!(command = %label, "stdio MCP server closed its stdout");
}

#[cfg(unix)]
fn send_terminate(child: &Child) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Some(raw_pid) = child.id().and_then(|pid| i32::try_from(pid).ok()) else {
        return;
    };
    if let Err(err) = kill(Pid::from_raw(raw_pid), Signal::SIGTERM) {
        debug!(pid = raw_pid, %err, "SIGTERM delivery failed");
    }
}

#[cfg(not(unix))]
const fn send_terminate(_child: &Child) {}
