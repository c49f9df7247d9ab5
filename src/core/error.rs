use std::path::PathBuf;

use thiserror::Error;

/// Why a registry entry could not become a working detector.
///
/// These are expected operator-configuration problems, so they travel as
/// values across the registry/detector boundary instead of panicking.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no detector named '{0}' in the registry")]
    NameNotFound(String),

    #[error("registry entry does not declare a recognized type (expected \"network\" or \"cascade\")")]
    TypeNotProvided,

    #[error("network entry has an empty model path (paths.model)")]
    ModelPathEmpty,

    #[error("network entry has an empty inference graph path (paths.inf)")]
    InfGraphPathEmpty,

    #[error("cascade entry has an empty face cascade path (paths.face)")]
    FaceCascadePathEmpty,

    #[error("the inference engine could not read network '{path}': {reason}")]
    CannotReadNetwork { path: PathBuf, reason: String },

    #[error("cascade '{path}' failed to load: {reason}")]
    InvalidCascade { path: PathBuf, reason: String },

    #[error("registry document '{path}' is unusable: {reason}")]
    Source { path: PathBuf, reason: String },
}

impl LoadError {
    pub fn cannot_read_network(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::CannotReadNetwork {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// True when the error belongs to one registry entry rather than the
    /// registry document as a whole
    pub fn is_entry_error(&self) -> bool {
        !matches!(self, Self::Source { .. })
    }

    pub fn invalid_cascade(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::InvalidCascade {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Failure of a single frame's detection step.
///
/// The frame is still displayed; the caller deactivates the detector.
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("network detectors need a color frame, got a single-channel image")]
    GrayscaleFrame,

    #[error("malformed inference output: {0}")]
    MalformedOutput(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("detector '{0}' was used before it finished loading")]
    NotLoaded(String),
}

/// Informational notice from a detector that loaded with reduced capability
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadNotice {
    EyeClassifierUnavailable { reason: String },
    SmileClassifierUnavailable { reason: String },
}

impl std::fmt::Display for LoadNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadNotice::EyeClassifierUnavailable { reason } => {
                write!(f, "eye detection unavailable: {}", reason)
            }
            LoadNotice::SmileClassifierUnavailable { reason } => {
                write!(f, "smile detection unavailable: {}", reason)
            }
        }
    }
}
