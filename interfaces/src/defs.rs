use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which external analyzer a scan is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanKind {
    Url,
    File,
    Log,
}

impl ScanKind {
    /// Script file name inside the scanner directory.
    pub fn script_name(&self) -> &'static str {
        match self {
            ScanKind::Url => "url_scanner_enhanced.py",
            ScanKind::File => "scanner.py",
            ScanKind::Log => "log_analyzer.py",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScanKind::Url => "URL",
            ScanKind::File => "File",
            ScanKind::Log => "Log",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub kind: ScanKind,
    /// URL string or path of the file to analyze
    pub target: String,
    /// Original upload name, forwarded to file scans only
    pub display_name: Option<String>,
}

impl ScanRequest {
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            kind: ScanKind::Url,
            target: url.into(),
            display_name: None,
        }
    }

    pub fn file(path: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            kind: ScanKind::File,
            target: path.into(),
            display_name: Some(display_name.into()),
        }
    }

    pub fn log(path: impl Into<String>) -> Self {
        Self {
            kind: ScanKind::Log,
            target: path.into(),
            display_name: None,
        }
    }

    /// Positional arguments passed after the script path.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![self.target.clone()];
        if self.kind == ScanKind::File {
            if let Some(name) = &self.display_name {
                args.push(name.clone());
            }
        }
        args
    }
}

/// The single JSON object a scanner prints on success. Its fields are owned
/// by the scanner and relayed to clients untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanVerdict(pub Map<String, Value>);

impl ScanVerdict {
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("failed to start scanner: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("scanner exited with status {code:?}")]
    Failed { code: Option<i32>, stderr: String },

    #[error("scanner output is not a JSON object")]
    InvalidOutput { stdout: String },

    #[error("scanner timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

impl ScanError {
    /// Text relayed to the client in the `details` field.
    pub fn details(&self) -> String {
        match self {
            ScanError::Failed { stderr, .. } => stderr.clone(),
            ScanError::InvalidOutput { stdout } => stdout.clone(),
            other => other.to_string(),
        }
    }
}

/// Boundary to the classification subsystem. The core hands over a target
/// and receives a structured verdict; how the verdict is produced is opaque.
#[async_trait]
pub trait Scanner: Send + Sync {
    async fn scan(&self, request: &ScanRequest) -> Result<ScanVerdict, ScanError>;
}
