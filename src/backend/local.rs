//! tmux sessions attached through a local PTY
//!
//! Each pane maps to one tmux session named `<prefix>-<pane id>`. Attaching
//! runs `tmux new-session -A` inside a PTY, which reattaches an existing
//! session or creates a missing one. Sessions outlive this process: releasing
//! an attachment only ends the tmux client, so a restart finds them again.

use super::{
    AttachRequest, Attached, BackendCapabilities, BackendError, BackendOutput, BackendProcess,
    BackendSessionInfo, SessionBackend,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use portable_pty::{Child, CommandBuilder, MasterPty, PtySize, native_pty_system};
use std::io::{Read, Write};
use std::process::{Output, Stdio};
use std::sync::Arc;
use termdeck_config::Config;
use termdeck_tmux::{SessionNaming, TmuxCommand, parse_list_sessions, parse_pane_pid};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Registry name of this backend
pub const LOCAL_BACKEND: &str = "local";

const READ_BUFFER_SIZE: usize = 8192;

/// Run one tmux command and collect its output
async fn run_tmux(tmux_path: &str, command: &TmuxCommand) -> Result<Output, BackendError> {
    log::trace!("tmux {}", command.display());
    tokio::process::Command::new(tmux_path)
        .args(command.args())
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                BackendError::Unavailable(format!("tmux not found at {}", tmux_path))
            }
            _ => BackendError::Io(e),
        })
}

fn join_error(e: tokio::task::JoinError) -> BackendError {
    BackendError::Io(std::io::Error::other(e.to_string()))
}

/// Map a signal name (`SIGINT`, `INT`, `int`) to its number
fn signal_number(name: &str) -> Option<libc::c_int> {
    let upper = name.trim().to_ascii_uppercase();
    let bare = upper.strip_prefix("SIG").unwrap_or(&upper);
    let number = match bare {
        "HUP" => libc::SIGHUP,
        "INT" => libc::SIGINT,
        "QUIT" => libc::SIGQUIT,
        "KILL" => libc::SIGKILL,
        "TERM" => libc::SIGTERM,
        "USR1" => libc::SIGUSR1,
        "USR2" => libc::SIGUSR2,
        "TSTP" => libc::SIGTSTP,
        "CONT" => libc::SIGCONT,
        "WINCH" => libc::SIGWINCH,
        _ => return None,
    };
    Some(number)
}

pub struct TmuxBackend {
    tmux_path: String,
    naming: SessionNaming,
    shell: Option<String>,
}

impl TmuxBackend {
    pub fn new(config: &Config) -> Self {
        Self {
            tmux_path: config.resolve_tmux_path(),
            naming: SessionNaming::new(config.tmux.tmux_session_prefix.clone()),
            shell: config.shell.clone(),
        }
    }

    pub fn naming(&self) -> &SessionNaming {
        &self.naming
    }

    async fn has_session(&self, name: &str) -> Result<bool, BackendError> {
        let output = run_tmux(&self.tmux_path, &TmuxCommand::has_session(name)).await?;
        Ok(output.status.success())
    }

    /// Shell command tmux runs in a new session
    fn session_command(&self, requested: Option<&str>) -> Result<Option<String>, BackendError> {
        match requested {
            Some(command) => {
                shell_words::split(command).map_err(|e| {
                    BackendError::Spawn(format!("invalid command {:?}: {}", command, e))
                })?;
                Ok(Some(command.to_string()))
            }
            None => Ok(self
                .shell
                .as_deref()
                .map(|shell| shell_words::quote(shell).into_owned())),
        }
    }
}

#[async_trait]
impl SessionBackend for TmuxBackend {
    fn name(&self) -> &str {
        LOCAL_BACKEND
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            write: true,
            remote_resize: true,
            signal: true,
            recoverable: true,
        }
    }

    async fn attach_or_create(&self, request: AttachRequest) -> Result<Attached, BackendError> {
        let name = self.naming.session_name(&request.pane_id);
        let existed = self.has_session(&name).await?;
        let command = self.session_command(request.command.as_deref())?;
        let tmux_command = TmuxCommand::new_session_or_attach(
            &name,
            request.cols,
            request.rows,
            request.cwd.as_deref(),
            command.as_deref(),
        )
        .then(TmuxCommand::hide_status(&name));

        log::info!(
            "{} tmux session {} ({}x{})",
            if existed { "Attaching to" } else { "Creating" },
            name,
            request.cols,
            request.rows
        );

        let size = PtySize {
            rows: request.rows,
            cols: request.cols,
            pixel_width: 0,
            pixel_height: 0,
        };
        let (tx, rx) = mpsc::unbounded_channel();
        let client = PtyClient {
            tmux_path: self.tmux_path.clone(),
            session_name: name,
        };
        let cancel = request.cancel.clone();
        let process = tokio::task::spawn_blocking(move || {
            client.spawn(&tmux_command, size, tx, cancel)
        })
        .await
        .map_err(join_error)??;

        Ok(Attached {
            process: Box::new(process),
            output: rx,
            was_recovered: existed,
            group_key: None,
        })
    }

    async fn list_sessions(&self) -> Result<Vec<BackendSessionInfo>, BackendError> {
        let output = run_tmux(&self.tmux_path, &TmuxCommand::list_sessions()).await?;
        if !output.status.success() {
            // No server running means no sessions
            log::debug!(
                "tmux list-sessions failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Ok(Vec::new());
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_list_sessions(&stdout)
            .into_iter()
            .filter_map(|info| {
                let pane_id = self.naming.pane_id(&info.name)?;
                Some(BackendSessionInfo {
                    attached: info.is_attached(),
                    key: info.name,
                    pane_id,
                })
            })
            .collect())
    }

    fn session_key(&self, pane_id: &str) -> String {
        self.naming.session_name(pane_id)
    }

    async fn kill_session(&self, info: &BackendSessionInfo) -> Result<(), BackendError> {
        let output = run_tmux(&self.tmux_path, &TmuxCommand::kill_session(&info.key)).await?;
        if !output.status.success() {
            return Err(BackendError::Spawn(format!(
                "kill-session {} failed: {}",
                info.key,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    async fn history(&self, pane_id: &str) -> Result<Option<String>, BackendError> {
        let name = self.naming.session_name(pane_id);
        let output = run_tmux(&self.tmux_path, &TmuxCommand::capture_pane(&name, None)).await?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()))
    }
}

// ============================================================================
// PTY client
// ============================================================================

struct PtyClient {
    tmux_path: String,
    session_name: String,
}

impl PtyClient {
    /// Open a PTY, start the tmux client in it and begin reading output
    fn spawn(
        self,
        command: &TmuxCommand,
        size: PtySize,
        tx: mpsc::UnboundedSender<BackendOutput>,
        cancel: CancellationToken,
    ) -> Result<LocalProcess, BackendError> {
        let pair = native_pty_system()
            .openpty(size)
            .map_err(|e| BackendError::Spawn(format!("openpty: {}", e)))?;

        let mut builder = CommandBuilder::new(&self.tmux_path);
        builder.args(command.args());
        builder.env("TERM", "xterm-256color");
        let child = pair
            .slave
            .spawn_command(builder)
            .map_err(|e| BackendError::Spawn(format!("tmux client: {}", e)))?;
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| BackendError::Spawn(format!("clone PTY reader: {}", e)))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| BackendError::Spawn(format!("take PTY writer: {}", e)))?;

        let child: Arc<Mutex<Box<dyn Child + Send + Sync>>> = Arc::new(Mutex::new(child));
        spawn_reader_thread(&self.session_name, reader, child.clone(), tx, cancel)?;

        Ok(LocalProcess {
            tmux_path: self.tmux_path,
            session_name: self.session_name,
            master: Mutex::new(pair.master),
            writer: Arc::new(Mutex::new(writer)),
            child,
        })
    }
}

fn spawn_reader_thread(
    session_name: &str,
    mut reader: Box<dyn Read + Send>,
    child: Arc<Mutex<Box<dyn Child + Send + Sync>>>,
    tx: mpsc::UnboundedSender<BackendOutput>,
    cancel: CancellationToken,
) -> Result<(), BackendError> {
    let name = session_name.to_string();
    std::thread::Builder::new()
        .name(format!("pty-{}", name))
        .spawn(move || {
            let mut buf = [0u8; READ_BUFFER_SIZE];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(BackendOutput::Data(buf[..n].to_vec())).is_err() {
                            return;
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        log::debug!("PTY read for {} ended: {}", name, e);
                        break;
                    }
                }
            }

            // A cancelled session was torn down deliberately; no exit to report
            if cancel.is_cancelled() {
                return;
            }
            let code = child
                .lock()
                .wait()
                .ok()
                .map(|status| status.exit_code() as i32);
            log::debug!("tmux client for {} exited with {:?}", name, code);
            let _ = tx.send(BackendOutput::Exit(code));
        })?;
    Ok(())
}

struct LocalProcess {
    tmux_path: String,
    session_name: String,
    master: Mutex<Box<dyn MasterPty + Send>>,
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
    child: Arc<Mutex<Box<dyn Child + Send + Sync>>>,
}

impl LocalProcess {
    fn stop_client(&self) {
        let mut child = self.child.lock();
        if let Err(e) = child.kill() {
            log::debug!("tmux client for {} already gone: {}", self.session_name, e);
        }
    }
}

#[async_trait]
impl BackendProcess for LocalProcess {
    async fn write(&self, data: &[u8]) -> Result<(), BackendError> {
        let writer = self.writer.clone();
        let data = data.to_vec();
        tokio::task::spawn_blocking(move || {
            let mut writer = writer.lock();
            writer.write_all(&data)?;
            writer.flush()
        })
        .await
        .map_err(join_error)??;
        Ok(())
    }

    async fn resize(&self, cols: u16, rows: u16) -> Result<(), BackendError> {
        let size = PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        };
        self.master
            .lock()
            .resize(size)
            .map_err(|e| BackendError::Io(std::io::Error::other(e.to_string())))
    }

    async fn signal(&self, signal: &str) -> Result<(), BackendError> {
        let number =
            signal_number(signal).ok_or_else(|| BackendError::UnknownSignal(signal.to_string()))?;
        let output = run_tmux(&self.tmux_path, &TmuxCommand::pane_pid(&self.session_name)).await?;
        let pid = parse_pane_pid(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
            BackendError::Unavailable(format!("no pane process for {}", self.session_name))
        })?;

        // SAFETY: kill(2) has no memory-safety preconditions
        let rc = unsafe { libc::kill(pid as libc::pid_t, number) };
        if rc != 0 {
            return Err(BackendError::Io(std::io::Error::last_os_error()));
        }
        log::debug!("Sent {} to pid {} ({})", signal, pid, self.session_name);
        Ok(())
    }

    async fn kill(&self) -> Result<(), BackendError> {
        let result = run_tmux(&self.tmux_path, &TmuxCommand::kill_session(&self.session_name)).await;
        self.stop_client();
        let output = result?;
        if !output.status.success() {
            log::debug!(
                "kill-session {}: {}",
                self.session_name,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }

    async fn release(&self) -> Result<(), BackendError> {
        self.stop_client();
        Ok(())
    }
}
