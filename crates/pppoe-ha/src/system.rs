//! Host adapters: interface commands and the detached stabilizer.

use async_trait::async_trait;
use common::{Error, Result};
use failover::{InterfaceActuator, StabilizeRequest, StabilizerLauncher};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Drives interfaces through `ifconfig` and `pfSctl`
#[derive(Debug, Clone)]
pub struct SystemActuator {
    ifconfig: PathBuf,
    pfsctl: PathBuf,
}

impl SystemActuator {
    pub fn new(ifconfig: impl Into<PathBuf>, pfsctl: impl Into<PathBuf>) -> Self {
        Self {
            ifconfig: ifconfig.into(),
            pfsctl: pfsctl.into(),
        }
    }

    async fn run(&self, program: &Path, args: &[&str]) -> Result<()> {
        let rendered = format!("{} {}", program.display(), args.join(" "));
        debug!(command = %rendered, "Running");

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(Error::command(format!(
            "{rendered} exited with {}: {}",
            output.status,
            stderr.trim()
        )))
    }
}

#[async_trait]
impl InterfaceActuator for SystemActuator {
    async fn reload(&self, friendly: &str) -> Result<()> {
        let command = format!("interface reload {friendly}");
        self.run(&self.pfsctl, &["-c", &command]).await
    }

    async fn up(&self, real: &str) -> Result<()> {
        self.run(&self.ifconfig, &[real, "up"]).await
    }

    async fn down(&self, real: &str) -> Result<()> {
        self.run(&self.ifconfig, &[real, "down"]).await
    }
}

/// Starts `<program> stabilize <vhid> <friendly> <real>` in its own process
/// group, so it survives the devd handler that spawned it.
///
/// The child's stderr is appended to `stderr_log` when one is set and
/// discarded otherwise.
#[derive(Debug, Clone)]
pub struct SelfLauncher {
    program: PathBuf,
    stderr_log: Option<PathBuf>,
}

impl SelfLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            stderr_log: None,
        }
    }

    /// Launcher re-executing the running binary
    pub fn current() -> Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    pub fn with_stderr_log(mut self, path: Option<PathBuf>) -> Self {
        self.stderr_log = path;
        self
    }

    fn stderr_sink(&self) -> Stdio {
        let Some(path) = &self.stderr_log else {
            return Stdio::null();
        };
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Stdio::from(file),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot open stabilizer log, discarding its stderr");
                Stdio::null()
            }
        }
    }
}

impl StabilizerLauncher for SelfLauncher {
    fn launch(&self, request: &StabilizeRequest) -> Result<()> {
        let mut command = std::process::Command::new(&self.program);
        command
            .arg("stabilize")
            .arg(request.vhid.to_string())
            .arg(&request.friendly)
            .arg(&request.real)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(self.stderr_sink());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        // Never waited on; init reaps it once this process exits
        let child = command.spawn()?;
        info!(
            vhid = request.vhid,
            pid = child.id(),
            program = %self.program.display(),
            "Spawned stabilizer"
        );
        Ok(())
    }
}
