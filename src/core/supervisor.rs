use crate::domain::model::PortRange;
use crate::utils::error::{LocalDbError, Result};
use crate::utils::process::ProcessTable;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::process::{Child, ChildStdout, Command};
use tokio_util::sync::CancellationToken;

#[cfg(windows)]
pub const JAVA_PROGRAM: &str = "java.exe";
#[cfg(not(windows))]
pub const JAVA_PROGRAM: &str = "java";

#[cfg(windows)]
pub const PORT_TRY_TIMEOUT: Duration = Duration::from_secs(4);
#[cfg(not(windows))]
pub const PORT_TRY_TIMEOUT: Duration = Duration::from_millis(1);

/// A process that exits within this window failed to start.
pub const STARTUP_CHECK: Duration = Duration::from_millis(100);

const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub port_range: PortRange,
    pub java_program: PathBuf,
    /// Cancelling it while [`DynamoDbLocal::shutdown`] waits kills the
    /// process. Nothing listens for signals on the caller's behalf.
    pub interrupt: CancellationToken,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            port_range: PortRange::default(),
            java_program: PathBuf::from(JAVA_PROGRAM),
            interrupt: CancellationToken::new(),
        }
    }
}

impl ServiceOptions {
    pub fn with_port_range(mut self, port_range: impl Into<PortRange>) -> Self {
        self.port_range = port_range.into();
        self
    }

    pub fn with_java_program(mut self, java_program: impl Into<PathBuf>) -> Self {
        self.java_program = java_program.into();
        self
    }

    pub fn with_interrupt(mut self, interrupt: CancellationToken) -> Self {
        self.interrupt = interrupt;
        self
    }
}

pub fn local_endpoint_url(port: u16) -> String {
    format!("http://localhost:{}", port)
}

fn launch_args(port: u16) -> Vec<String> {
    vec![
        "-Djava.library.path=./DynamoDBLocal_lib".to_string(),
        "-jar".to_string(),
        "DynamoDBLocal.jar".to_string(),
        "-inMemory".to_string(),
        "-port".to_string(),
        port.to_string(),
    ]
}

/// True when nothing listens on `localhost:port`, judged by the connection
/// being refused. A connect that succeeds or times out means the port is not
/// usable. Addresses that fail any other way (e.g. no IPv6 loopback) are
/// ignored, but at least one address must refuse.
pub async fn port_refuses_connections(port: u16) -> bool {
    let addrs = match tokio::net::lookup_host(("localhost", port)).await {
        Ok(addrs) => addrs,
        Err(_) => return false,
    };

    let mut refused = false;
    for addr in addrs {
        match tokio::time::timeout(PORT_TRY_TIMEOUT, TcpStream::connect(addr)).await {
            Ok(Ok(_stream)) => return false,
            Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => refused = true,
            Ok(Err(e)) => tracing::trace!("Probe of {} failed: {}", addr, e),
            Err(_elapsed) => return false,
        }
    }
    refused
}

/// Returns the first port in `port_range` that refuses a TCP connection.
pub async fn find_available_port(port_range: &PortRange) -> Result<u16> {
    for port in port_range.iter() {
        if port_refuses_connections(port).await {
            return Ok(port);
        }
    }

    Err(LocalDbError::NoPortAvailable {
        range: port_range.to_string(),
    })
}

/// A running, in-memory DynamoDB Local process.
///
/// Call [`DynamoDbLocal::shutdown`] to stop it. Dropping the value without
/// shutting down kills the process without waiting for it.
#[derive(Debug)]
pub struct DynamoDbLocal {
    child: Child,
    pid: u32,
    port: u16,
    software_path: PathBuf,
    interrupt: CancellationToken,
}

impl DynamoDbLocal {
    /// Picks a free port from `options.port_range`, launches DynamoDB Local
    /// from `software_path` on it and checks that it did not exit right away.
    pub async fn start(software_path: impl AsRef<Path>, options: &ServiceOptions) -> Result<Self> {
        let software_path = software_path.as_ref().to_path_buf();
        let port = find_available_port(&options.port_range).await?;

        tracing::debug!("Opening DynamoDBLocal on port {}", port);
        let mut child = Command::new(&options.java_program)
            .args(launch_args(port))
            .current_dir(&software_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;
        let pid = child.id().unwrap_or_default();
        tracing::debug!("DynamoDBLocal server (pid {}) on port {}", pid, port);

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(drain_output(stdout, pid));
        }

        if let Ok(status) = tokio::time::timeout(STARTUP_CHECK, child.wait()).await {
            let status = status?;
            tracing::error!("DynamoDBLocal (pid {}) exited during startup: {}", pid, status);
            return Err(LocalDbError::ServiceStartupFailed {
                code: status.code(),
            });
        }

        Ok(Self {
            child,
            pid,
            port,
            software_path,
            interrupt: options.interrupt.clone(),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn software_path(&self) -> &Path {
        &self.software_path
    }

    pub fn endpoint_url(&self) -> String {
        local_endpoint_url(self.port)
    }

    /// Waits until the service accepts TCP connections. Fails if the process
    /// exits or `timeout` passes first.
    pub async fn wait_until_ready(&mut self, timeout: Duration) -> Result<()> {
        let started = tokio::time::Instant::now();

        loop {
            if let Some(status) = self.child.try_wait()? {
                return Err(LocalDbError::ServiceStartupFailed {
                    code: status.code(),
                });
            }
            if TcpStream::connect(("localhost", self.port)).await.is_ok() {
                tracing::debug!(
                    "DynamoDBLocal (pid {}) ready after {:?}",
                    self.pid,
                    started.elapsed()
                );
                return Ok(());
            }
            if started.elapsed() >= timeout {
                return Err(LocalDbError::ServiceNotReady {
                    port: self.port,
                    waited: timeout,
                });
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }

    /// Asks the process to terminate and waits for it to exit. If the
    /// options' interrupt token is cancelled while waiting, the process is
    /// killed and [`LocalDbError::Interrupted`] returned.
    pub async fn shutdown(mut self) -> Result<ExitStatus> {
        tracing::debug!("Terminating DynamoDBLocal server (pid {})", self.pid);
        self.terminate();

        let interrupt = self.interrupt.clone();
        let exited = tokio::select! {
            biased;
            status = self.child.wait() => Some(status),
            _ = interrupt.cancelled() => None,
        };

        match exited {
            Some(status) => {
                let status = status?;
                tracing::debug!(
                    "DynamoDBLocal (pid {}) server has exited with {}",
                    self.pid,
                    status
                );
                Ok(status)
            }
            None => {
                tracing::warn!("Killing DynamoDBLocal server (pid {}), not waiting", self.pid);
                self.child.kill().await?;
                Err(LocalDbError::Interrupted)
            }
        }
    }

    fn terminate(&mut self) {
        // The Windows launcher leaves the JVM as a child; it would outlive
        // its parent.
        if cfg!(windows) {
            ProcessTable::snapshot().kill_descendants(self.pid);
        }

        if !ProcessTable::of(self.pid).terminate(self.pid) {
            if let Err(e) = self.child.start_kill() {
                tracing::debug!("Could not kill DynamoDBLocal (pid {}): {}", self.pid, e);
            }
        }
    }
}

async fn drain_output(stdout: ChildStdout, pid: u32) {
    let mut lines = BufReader::new(stdout).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::trace!(pid, "{}", line);
    }
}

/// Runs `body` with the port of a fresh DynamoDB Local and shuts the service
/// down afterwards.
pub async fn in_subprocess<F, Fut, T>(
    software_path: impl AsRef<Path>,
    options: &ServiceOptions,
    body: F,
) -> Result<T>
where
    F: FnOnce(u16) -> Fut,
    Fut: Future<Output = T>,
{
    let service = DynamoDbLocal::start(software_path, options).await?;
    let value = body(service.port()).await;
    service.shutdown().await?;
    Ok(value)
}
