use engine::EngineError;
use thiserror::Error;

pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("{tool} not found: {reason}")]
    ToolNotFound { tool: String, reason: String },

    #[error("external tool failed: {message}")]
    ExternalToolFailure {
        message: String,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("missing asset {path}: {reason}")]
    MissingAsset { path: String, reason: String },

    #[error("render cancelled")]
    Cancelled,

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RenderError {
    pub fn tool_failed(message: impl Into<String>, exit_code: Option<i32>, stdout: String, stderr: String) -> Self {
        Self::ExternalToolFailure {
            message: message.into(),
            exit_code,
            stdout,
            stderr,
        }
    }

    pub fn missing_asset(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::MissingAsset {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RenderError::Cancelled)
    }

    /// Message reported to API clients, diagnostics included.
    pub fn report(&self) -> String {
        match self {
            RenderError::ExternalToolFailure {
                message,
                exit_code,
                stderr,
                ..
            } => {
                let code = exit_code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string());
                format!("{} (exit {}): {}", message, code, stderr)
            }
            other => other.to_string(),
        }
    }
}
