pub mod config;
pub mod error;
pub mod history;
pub mod registry;

pub use config::{CascadeParams, DetectorConfig, DetectorParams, NetworkParams};
pub use error::{DetectionError, LoadError, LoadNotice};
pub use history::{History, Operation, OperationField, OperationState};
pub use registry::ModelRegistry;
