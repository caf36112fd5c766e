use crate::defs::{ScanError, ScanRequest, ScanVerdict, Scanner};
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error, info};

/// Runs an external analyzer script per scan: `<program> <script> <args..>`.
pub struct ProcessScanner {
    program: PathBuf,
    script_dir: PathBuf,
    timeout: Duration,
}

impl ProcessScanner {
    pub fn new(program: impl Into<PathBuf>, script_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            script_dir: script_dir.into(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self, request: &ScanRequest) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg(self.script_dir.join(request.kind.script_name()))
            .args(request.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl Scanner for ProcessScanner {
    async fn scan(&self, request: &ScanRequest) -> Result<ScanVerdict, ScanError> {
        debug!("Starting {} scan of {}", request.kind.label(), request.target);

        let child = self.command(request).spawn()?;
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                // kill_on_drop reaps the child once the future is dropped
                error!("{} scan timed out: {}", request.kind.label(), request.target);
                return Err(ScanError::Timeout {
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            error!(
                "{} scanner exited with {:?}: {}",
                request.kind.label(),
                output.status.code(),
                stderr.trim()
            );
            return Err(ScanError::Failed {
                code: output.status.code(),
                stderr,
            });
        }

        let verdict = parse_verdict(&stdout)?;
        info!("{} scan finished for {}", request.kind.label(), request.target);
        Ok(verdict)
    }
}

/// Scanner stdout must be exactly one JSON object.
pub fn parse_verdict(stdout: &str) -> Result<ScanVerdict, ScanError> {
    match serde_json::from_str::<Value>(stdout.trim()) {
        Ok(Value::Object(map)) => Ok(ScanVerdict(map)),
        _ => Err(ScanError::InvalidOutput {
            stdout: stdout.to_string(),
        }),
    }
}
