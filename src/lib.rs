//! docker-tar-pusher
//!
//! Pushes a saved Docker image tarball to a registry over the Distribution
//! API v2 chunked blob upload protocol: every layer and the image config are
//! streamed in resumable upload sessions while their digests are computed
//! incrementally, then a schema-2 manifest referencing the resulting digests
//! is assembled and pushed per repo tag.

pub mod cli;
pub mod config;
pub mod digest;
pub mod error;
pub mod manifest;
pub mod output;
pub mod progress;
pub mod pusher;
pub mod registry;
pub mod workdir;

pub use config::PushConfig;
pub use error::{PusherError, Result};
pub use output::OutputManager;
pub use progress::{ProgressEvent, ProgressKind};
pub use pusher::TarPusher;
