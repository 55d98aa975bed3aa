//! Error type shared by the trainer, tester, environments and output layout.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while setting up or running the DDQN trainer and tester.
#[derive(Debug, Error)]
pub enum DdqnError {
    #[error("Unsupported env_type '{0}': no observation function is available")]
    UnknownEnvType(String),

    #[error("Unsupported obs_type '{0}': expected 'dense' or 'conv'")]
    UnknownObsType(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Observation for agent {id} has dimension {got}, expected {expected}")]
    ObservationDim {
        id: String,
        expected: usize,
        got: usize,
    },

    #[error("Checkpoint already exists: {}", .0.display())]
    CheckpointExists(PathBuf),

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Torch(#[from] tch::TchError),
}

impl DdqnError {
    /// Wraps an I/O error together with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DdqnError::Io {
            path: path.into(),
            source,
        }
    }
}
