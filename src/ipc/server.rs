//! Unix socket listener for the IPC bridge.
//!
//! Each accepted connection is registered as a window. Requests are read one
//! line at a time and handled in order; responses and pushes share a single
//! writer task so lines never interleave.

use super::handlers::IpcBridge;
use super::protocol::{IncomingMessage, Outgoing, parse_error};
use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Pause after a failed accept so a full fd table doesn't spin the loop
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Removes the socket file when the server stops
struct SocketCleanup(PathBuf);

impl Drop for SocketCleanup {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.0)
            && e.kind() != ErrorKind::NotFound
        {
            log::warn!("Failed to remove socket {}: {}", self.0.display(), e);
        }
    }
}

/// Bind `path`, replacing a stale socket, and serve until `shutdown` fires
pub async fn serve(
    bridge: Arc<IpcBridge>,
    path: &Path,
    shutdown: CancellationToken,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create socket dir {}", parent.display()))?;
    }
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("remove existing socket {}", path.display()))?;
    }
    let listener = UnixListener::bind(path)
        .with_context(|| format!("bind IPC socket at {}", path.display()))?;
    let _cleanup = SocketCleanup(path.to_path_buf());
    log::info!("IPC bridge listening on {}", path.display());

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => {
                let stream = match accepted {
                    Ok((stream, _addr)) => stream,
                    Err(e) => {
                        log::warn!("Failed to accept IPC connection: {}", e);
                        tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                        continue;
                    }
                };
                let bridge = Arc::clone(&bridge);
                tokio::spawn(async move {
                    let (reader, writer) = stream.into_split();
                    handle_connection(bridge, reader, writer).await;
                });
            }
        }
    }
    log::info!("IPC bridge stopped");
    Ok(())
}

/// Serve one window over any byte stream
pub async fn handle_connection<R, W>(bridge: Arc<IpcBridge>, reader: R, writer: W)
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<Outgoing>();
    let writer_task = tokio::spawn(async move {
        write_loop(writer, &mut rx).await;
    });

    let window = bridge.register_window(tx.clone()).await;
    let mut lines = BufReader::new(reader).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                log::warn!("Window {} read error: {}", window, e);
                break;
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<IncomingMessage>(trimmed) {
            Ok(msg) => bridge.dispatch(window, msg).await,
            Err(e) => {
                log::debug!("Window {} sent malformed JSON: {}", window, e);
                Some(parse_error())
            }
        };
        if let Some(response) = response
            && tx.send(response.into()).is_err()
        {
            break;
        }
    }

    bridge.unregister_window(window);
    drop(tx);
    // Pending pushes still queued for this window are written before exit
    if let Err(e) = writer_task.await {
        log::warn!("Window {} writer panicked: {}", window, e);
    }
}

async fn write_loop<W>(mut writer: W, rx: &mut mpsc::UnboundedReceiver<Outgoing>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        match serde_json::to_string(&message) {
            Ok(mut text) => {
                text.push('\n');
                if writer.write_all(text.as_bytes()).await.is_err() {
                    break;
                }
                if writer.flush().await.is_err() {
                    break;
                }
            }
            Err(e) => log::error!("Failed to serialize message: {}", e),
        }
    }
}
