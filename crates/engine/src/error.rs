use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised while turning a timeline into a filter-graph program.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unsupported node kind '{kind}'")]
    UnsupportedNodeKind { kind: String },

    #[error("scene {scene} lasts {duration}s, shorter than its {transition}s transition")]
    InvalidTransitionDuration {
        scene: usize,
        duration: f64,
        transition: f64,
    },

    #[error("malformed audio range ss={ss} to={to}")]
    MalformedAudioRange { ss: f64, to: f64 },

    #[error("unknown transition '{0}'")]
    UnknownTransition(String),

    #[error("missing asset: {0}")]
    MissingAsset(String),

    #[error("invalid filter graph: {0}")]
    InvalidGraph(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("template error: {0}")]
    Template(#[from] serde_json::Error),
}

impl EngineError {
    pub fn unsupported(kind: impl Into<String>) -> Self {
        Self::UnsupportedNodeKind { kind: kind.into() }
    }

    pub fn missing_asset(what: impl Into<String>) -> Self {
        Self::MissingAsset(what.into())
    }

    pub fn invalid_graph(reason: impl Into<String>) -> Self {
        Self::InvalidGraph(reason.into())
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }
}
