use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while declaring or serializing a stack.
///
/// The provisioning service enforces most rules again at deployment time;
/// these are the ones worth failing on before anything leaves the machine.
#[derive(Debug, Error)]
pub enum SynthError {
    #[error("invalid stack name {name:?}: {reason}")]
    InvalidStackName { name: String, reason: &'static str },

    #[error("duplicate stack name {0:?}")]
    DuplicateStackName(String),

    #[error("invalid logical id {id:?}: {reason}")]
    InvalidLogicalId { id: String, reason: &'static str },

    #[error("duplicate logical id {0:?}")]
    DuplicateLogicalId(String),

    #[error("invalid {field} on {resource}: {reason}")]
    InvalidProperty {
        resource: String,
        field: &'static str,
        reason: String,
    },

    #[error("no role declared under logical id {0:?}")]
    UnknownRole(String),

    #[error("asset {path:?}: {reason}")]
    Asset { path: PathBuf, reason: String },

    #[error("{path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize template for stack {stack:?}: {reason}")]
    Serialize { stack: String, reason: String },
}
