use thiserror::Error;

/// Errors raised while assembling the playback service.
///
/// Once built, the service never returns errors from its mutators: failures
/// are stored as the last error and broadcast as `PlaybackFailed`.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),
}

impl CoreError {
    pub(crate) fn capability_missing(capability: &str, message: &str) -> Self {
        Self::CapabilityMissing {
            capability: capability.to_string(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
