use std::io;
use std::process::Stdio;
use std::time::Duration;

use log::{debug, warn};
use tokio::process::Command;
use tokio::runtime::{Builder, Runtime};

use crate::transport::{CommandOutput, Transport, TransportError};

/// Commands that take longer than this are killed and reported as failed
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Runs real processes (ssh, scp, sshfs, ...) and waits for them synchronously
///
/// Each call blocks the caller. A private current-thread runtime is only used to race the child
/// against the timeout; the child is killed when it loses.
pub struct ProcessTransport {
    timeout: Duration,
    runtime: Runtime,
}

impl ProcessTransport {
    pub fn new() -> io::Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> io::Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(ProcessTransport { timeout, runtime })
    }
}

impl Transport for ProcessTransport {
    fn run(&self, argv: &[String]) -> Result<CommandOutput, TransportError> {
        let command = argv.join(" ");
        let (program, args) = argv.split_first().ok_or_else(|| TransportError::Spawn {
            command: command.clone(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "empty command"),
        })?;

        let mut child = Command::new(program);
        child.args(args).stdin(Stdio::null()).kill_on_drop(true);
        debug!("Running {:?}", &child);

        let result = self
            .runtime
            .block_on(async { tokio::time::timeout(self.timeout, child.output()).await });

        let output = match result {
            Ok(output) => output.map_err(|source| TransportError::Spawn {
                command: command.clone(),
                source,
            })?,
            Err(_) => {
                warn!("{command} didn't finish within {}s, killed", self.timeout.as_secs());
                return Err(TransportError::Timeout { command, seconds: self.timeout.as_secs() });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if output.status.success() {
            Ok(CommandOutput { stdout, stderr })
        } else {
            warn!("{command} failed: {}", stderr.trim());
            Err(TransportError::CommandFailed { command, status: output.status.code(), stderr })
        }
    }
}
