//! Command-line argument parsing.

use clap::Parser;

use crate::config::{PushConfig, DEFAULT_CHUNK_SIZE, DEFAULT_CONCURRENCY};
use crate::error::{PusherError, Result};

#[derive(Debug, Parser)]
#[command(name = "docker-tar-pusher")]
#[command(about = "Push a saved Docker image tarball to a registry")]
#[command(version)]
pub struct Args {
    /// Registry base URL, e.g. https://registry.example.com
    #[arg(long = "registry-url", short = 'r')]
    pub registry_url: String,

    /// Path to the saved image tarball
    #[arg(long = "file", short = 'f')]
    pub file: String,

    /// Chunk size for uploads in bytes
    #[arg(long = "chunk-size", short = 'c', default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Number of concurrent layer uploads
    #[arg(long = "concurrency", short = 'j', default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Username for registry authentication
    #[arg(long = "username", short = 'u')]
    pub username: Option<String>,

    /// Password for registry authentication
    #[arg(long = "password", short = 'p')]
    pub password: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long = "skip-tls", short = 'k')]
    pub skip_tls: bool,

    /// Image name overriding the tar's embedded repo tag
    #[arg(long = "image-name", requires = "image_tag")]
    pub image_name: Option<String>,

    /// Image tag overriding the tar's embedded repo tag
    #[arg(long = "image-tag", requires = "image_name")]
    pub image_tag: Option<String>,

    /// Suppress informational output
    #[arg(long = "quiet", short = 'q')]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(long = "verbose", short = 'v')]
    pub verbose: bool,
}

impl Args {
    /// Fill credentials from the environment when not given on the command
    /// line.
    pub fn from_env(mut self) -> Self {
        if self.username.is_none() {
            self.username = std::env::var("DOCKER_TAR_PUSHER_USERNAME").ok();
        }
        if self.password.is_none() {
            self.password = std::env::var("DOCKER_TAR_PUSHER_PASSWORD").ok();
        }
        self
    }

    pub fn into_config(self) -> Result<PushConfig> {
        let mut config = PushConfig::new(self.registry_url, self.file)
            .with_chunk_size(self.chunk_size)
            .with_concurrency(self.concurrency)
            .with_ssl_verify(!self.skip_tls);

        match (self.username, self.password) {
            (Some(username), Some(password)) => {
                config = config.with_auth(username, password);
            }
            (None, None) => {}
            _ => {
                return Err(PusherError::Configuration(
                    "username and password must be provided together".to_string(),
                ))
            }
        }
        if let (Some(name), Some(tag)) = (self.image_name, self.image_tag) {
            config = config.with_image(name, tag);
        }
        Ok(config)
    }
}
