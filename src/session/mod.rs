//! Render sessions: the bridge between the transform and the sandboxed
//! mermaid engine.
//!
//! [`BrowserSession`] owns one sandbox host process for the duration of a
//! transform call. The host is a Node.js program (embedded as
//! `driver.js`) that launches a headless browser once and then opens one
//! ephemeral page per render request, so no engine state ever leaks
//! between diagrams. Host and session speak a JSON-lines protocol over
//! stdin/stdout; anything the page logs to its console, and anything the
//! host writes to stderr, is forwarded to `tracing` and never affects
//! control flow.

use std::collections::HashMap;
use std::io::Write as _;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::TransformError;
use crate::id;
use crate::options::RenderMode;

/// Sandbox host program run by the spawned Node.js process.
const DRIVER_SCRIPT: &str = include_str!("driver.js");

/// Request id reserved for the host's readiness reply.
const READY_ID: u64 = 0;

/// How long the host gets to shut its browser down before being killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// One open sandbox capable of rendering diagrams.
///
/// Implementations must keep renders isolated from each other: a failed
/// render leaves the session usable for further renders. `close` consumes
/// the session, so a double close cannot compile.
#[async_trait(?Send)]
pub trait RenderSession {
    /// Render one diagram with the given renderer configuration, returning
    /// the serialized container markup.
    async fn render(
        &self,
        source: &str,
        config: &Value,
        mode: RenderMode,
    ) -> Result<String, TransformError>;

    /// Tear the sandbox down. Called exactly once, on every exit path.
    async fn close(self) -> Result<(), TransformError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RenderRequest<'a> {
    id: u64,
    source: &'a str,
    config: &'a Value,
    mode: &'a str,
    container_id: &'a str,
}

/// One stdout line from the host. Result lines carry `id` + `ok`;
/// forwarded console output arrives as bare `log` lines.
#[derive(Deserialize)]
struct DriverReply {
    id: Option<u64>,
    ok: Option<bool>,
    html: Option<String>,
    error: Option<String>,
    kind: Option<String>,
    log: Option<String>,
}

/// Failure reported by the host for one request.
enum DriverFailure {
    /// The engine rejected the diagram.
    Render(String),
    /// The sandbox itself broke (injection failure, crashed page, dead host).
    Sandbox(String),
}

type ReplySender = oneshot::Sender<Result<String, DriverFailure>>;
type PendingMap = Arc<Mutex<HashMap<u64, ReplySender>>>;

/// A sandbox session backed by a headless browser.
///
/// Spawned by [`launch`](Self::launch), torn down by
/// [`close`](RenderSession::close). Dropping the session without closing it
/// kills the host process.
pub struct BrowserSession {
    child: Child,
    stdin: tokio::sync::Mutex<ChildStdin>,
    pending: PendingMap,
    next_id: AtomicU64,
    reader: JoinHandle<()>,
    stderr_forwarder: JoinHandle<()>,
    // Holds the materialized driver script on disk while the host runs.
    _driver_script: tempfile::NamedTempFile,
}

impl BrowserSession {
    /// Launch a sandbox host using `node` from `PATH`.
    ///
    /// The host needs Node.js with the `puppeteer` and `mermaid` packages
    /// resolvable; `MARKMAID_MERMAID_JS` overrides the mermaid bundle path.
    pub async fn launch() -> Result<Self, TransformError> {
        let node = which::which("node").map_err(|_| {
            TransformError::Sandbox(
                "Node.js executable not found on PATH; the mermaid sandbox needs `node` \
                 with the puppeteer and mermaid packages installed"
                    .into(),
            )
        })?;
        Self::launch_with_node(node).await
    }

    /// Launch a sandbox host using a specific Node.js executable.
    pub async fn launch_with_node(node: PathBuf) -> Result<Self, TransformError> {
        let mut driver_script = tempfile::Builder::new()
            .prefix("markmaid-driver-")
            .suffix(".cjs")
            .tempfile()?;
        driver_script.write_all(DRIVER_SCRIPT.as_bytes())?;
        driver_script.flush()?;

        let mut child = Command::new(&node)
            .arg(driver_script.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                TransformError::Sandbox(format!(
                    "failed to spawn sandbox host {}: {err}",
                    node.display()
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransformError::Sandbox("sandbox host stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransformError::Sandbox("sandbox host stdout unavailable".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| TransformError::Sandbox("sandbox host stderr unavailable".into()))?;

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        // Wire the readiness reply up before the reader starts draining.
        let (ready_tx, ready_rx) = oneshot::channel();
        if let Ok(mut map) = pending.lock() {
            map.insert(READY_ID, ready_tx);
        }

        let reader = tokio::spawn(read_replies(stdout, Arc::clone(&pending)));
        let stderr_forwarder = tokio::spawn(forward_stderr(stderr));

        let session = Self {
            child,
            stdin: tokio::sync::Mutex::new(stdin),
            pending,
            next_id: AtomicU64::new(READY_ID + 1),
            reader,
            stderr_forwarder,
            _driver_script: driver_script,
        };

        match ready_rx.await {
            Ok(Ok(_)) => {
                tracing::debug!("sandbox host ready");
                Ok(session)
            }
            Ok(Err(failure)) => Err(failure.into_error(String::new())),
            Err(_) => Err(TransformError::Sandbox(
                "sandbox host exited before becoming ready; run with RUST_LOG=debug \
                 to see its stderr"
                    .into(),
            )),
        }
    }

    fn register(&self, request_id: u64, sender: ReplySender) -> Result<(), TransformError> {
        match self.pending.lock() {
            Ok(mut map) => {
                map.insert(request_id, sender);
                Ok(())
            }
            Err(_) => Err(TransformError::Sandbox(
                "sandbox reply registry poisoned".into(),
            )),
        }
    }

    fn forget(&self, request_id: u64) {
        if let Ok(mut map) = self.pending.lock() {
            map.remove(&request_id);
        }
    }
}

#[async_trait(?Send)]
impl RenderSession for BrowserSession {
    async fn render(
        &self,
        source: &str,
        config: &Value,
        mode: RenderMode,
    ) -> Result<String, TransformError> {
        let request_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let container_id = id::container_id();
        let request = RenderRequest {
            id: request_id,
            source,
            config,
            mode: mode.as_str(),
            container_id: &container_id,
        };
        let mut line = serde_json::to_string(&request)
            .map_err(|err| TransformError::Sandbox(format!("failed to encode render request: {err}")))?;
        line.push('\n');

        let (sender, receiver) = oneshot::channel();
        self.register(request_id, sender)?;

        {
            let mut stdin = self.stdin.lock().await;
            if let Err(err) = stdin.write_all(line.as_bytes()).await {
                self.forget(request_id);
                return Err(TransformError::Sandbox(format!(
                    "failed to send render request: {err}"
                )));
            }
            if let Err(err) = stdin.flush().await {
                self.forget(request_id);
                return Err(TransformError::Sandbox(format!(
                    "failed to flush render request: {err}"
                )));
            }
        }

        tracing::debug!(request_id, %container_id, mode = mode.as_str(), "render dispatched");

        match receiver.await {
            Ok(Ok(html)) => Ok(html),
            Ok(Err(failure)) => Err(failure.into_error(source.to_owned())),
            Err(_) => Err(TransformError::Sandbox(
                "sandbox host dropped an in-flight render request".into(),
            )),
        }
    }

    async fn close(self) -> Result<(), TransformError> {
        let Self {
            mut child,
            stdin,
            pending: _,
            next_id: _,
            reader,
            stderr_forwarder,
            _driver_script,
        } = self;

        // Closing stdin tells the host to shut its browser down and exit.
        drop(stdin);

        match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(%status, "sandbox host exited");
            }
            Ok(Err(err)) => {
                return Err(TransformError::Sandbox(format!(
                    "failed to wait for sandbox host: {err}"
                )));
            }
            Err(_) => {
                tracing::warn!("sandbox host did not exit in time, killing it");
                let _ = child.start_kill();
                let _ = child.wait().await;
            }
        }

        let _ = reader.await;
        let _ = stderr_forwarder.await;
        Ok(())
    }
}

impl DriverFailure {
    fn into_error(self, diagram: String) -> TransformError {
        match self {
            Self::Render(message) => TransformError::Render { diagram, message },
            Self::Sandbox(message) => TransformError::Sandbox(message),
        }
    }
}

/// Drain host stdout: route result lines to their waiting render calls and
/// forwarded console output to the log.
async fn read_replies(stdout: ChildStdout, pending: PendingMap) {
    let mut lines = BufReader::new(stdout).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let reply: DriverReply = match serde_json::from_str(&line) {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!("discarding unparseable sandbox reply ({err}): {line}");
                continue;
            }
        };

        if let Some(message) = reply.log {
            tracing::debug!(target: "markmaid::sandbox", "{message}");
            continue;
        }

        let (Some(request_id), Some(ok)) = (reply.id, reply.ok) else {
            continue;
        };
        let Some(sender) = pending
            .lock()
            .ok()
            .and_then(|mut map| map.remove(&request_id))
        else {
            continue;
        };

        let outcome = if ok {
            Ok(reply.html.unwrap_or_default())
        } else {
            let message = reply
                .error
                .unwrap_or_else(|| "sandbox reported an unspecified failure".into());
            match reply.kind.as_deref() {
                Some("sandbox") => Err(DriverFailure::Sandbox(message)),
                _ => Err(DriverFailure::Render(message)),
            }
        };
        let _ = sender.send(outcome);
    }

    // Host stdout closed: fail whatever is still waiting.
    if let Ok(mut map) = pending.lock() {
        for (_, sender) in map.drain() {
            let _ = sender.send(Err(DriverFailure::Sandbox(
                "sandbox host exited before replying".into(),
            )));
        }
    }
}

async fn forward_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!(target: "markmaid::sandbox", "{line}");
    }
}
