use bfdr_core::ArtifactLabel;

/// Why a single fetch produced an error marker instead of data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollectError {
    #[error("Patient required for {0}")]
    MissingDependency(ArtifactLabel),
    #[error("{0}")]
    NotFound(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl CollectError {
    /// Connection-level failures abort a record when they hit its initial chain.
    pub fn is_network(&self) -> bool {
        matches!(self, CollectError::Network(_))
    }
}
