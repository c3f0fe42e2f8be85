//! Error types for the tar pusher.
//!
//! The taxonomy is a closed set: registry-level failures (initiate upload,
//! manifest push), upload-level failures (chunk transfer, finalize) and
//! manifest failures (parse, build, validate), each carrying enough context
//! to identify the blob, tag and operation that failed. Ambient IO/network
//! variants cover everything outside the wire protocol.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PusherError>;

/// Registry-addressed operations that can fail outside of payload streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryOperation {
    InitiateUpload,
    PushManifest,
}

impl fmt::Display for RegistryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryOperation::InitiateUpload => write!(f, "initiate_upload"),
            RegistryOperation::PushManifest => write!(f, "push_manifest"),
        }
    }
}

/// Phases of a single blob upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOperation {
    Chunk,
    Finalize,
}

impl fmt::Display for UploadOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadOperation::Chunk => write!(f, "chunk"),
            UploadOperation::Finalize => write!(f, "finalize"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestOperation {
    Parse,
    Build,
    Validate,
}

impl fmt::Display for ManifestOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestOperation::Parse => write!(f, "parse"),
            ManifestOperation::Build => write!(f, "build"),
            ManifestOperation::Validate => write!(f, "validate"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PusherError {
    /// A registry HTTP call failed outside of payload streaming.
    #[error("registry error during {operation} for {image}: {message}")]
    Registry {
        message: String,
        status: Option<u16>,
        url: String,
        image: String,
        tag: Option<String>,
        operation: RegistryOperation,
    },

    /// A chunk transfer or blob finalization failed.
    #[error(
        "upload error for {file_name} during {operation} ({bytes_uploaded}/{total_bytes} bytes): {message}"
    )]
    Upload {
        message: String,
        file_name: String,
        upload_url: String,
        bytes_uploaded: u64,
        total_bytes: u64,
        operation: UploadOperation,
    },

    /// The tar manifest could not be read, or the registry manifest could not
    /// be built from the recorded descriptors.
    #[error("manifest error during {operation}: {message}")]
    Manifest {
        message: String,
        manifest_path: Option<PathBuf>,
        operation: ManifestOperation,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl PusherError {
    pub fn manifest(message: impl Into<String>, operation: ManifestOperation) -> Self {
        PusherError::Manifest {
            message: message.into(),
            manifest_path: None,
            operation,
        }
    }
}
