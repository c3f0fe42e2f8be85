//! Push configuration: one explicit structure with documented defaults,
//! validated once at the boundary before the core runs.

use std::path::PathBuf;

use crate::error::{PusherError, Result};

/// Default chunk size: 10 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 10 * 1024 * 1024;

/// Default number of concurrent layer uploads per tag.
pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
}

/// Explicit `{name, tag}` pair overriding the repo tag embedded in the tar.
#[derive(Debug, Clone)]
pub struct ImageOverride {
    pub name: String,
    pub tag: String,
}

#[derive(Debug, Clone)]
pub struct PushConfig {
    /// Registry base URL, e.g. `https://registry.example.com`.
    pub registry_url: String,
    /// Path to the saved image tarball.
    pub tarball: PathBuf,
    /// Maximum bytes per chunk transfer. Also caps request body size.
    pub chunk_size: usize,
    /// Verify TLS certificates (disable for self-signed registries).
    pub ssl_verify: bool,
    /// Concurrent layer uploads per repo tag.
    pub concurrency: usize,
    /// Static basic-auth credentials, injected on every request.
    pub auth: Option<AuthConfig>,
    /// Overrides the tar's embedded `name:tag` when set.
    pub image: Option<ImageOverride>,
}

impl PushConfig {
    pub fn new(registry_url: impl Into<String>, tarball: impl Into<PathBuf>) -> Self {
        Self {
            registry_url: registry_url.into(),
            tarball: tarball.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            ssl_verify: true,
            concurrency: DEFAULT_CONCURRENCY,
            auth: None,
            image: None,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_ssl_verify(mut self, ssl_verify: bool) -> Self {
        self.ssl_verify = ssl_verify;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(AuthConfig {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub fn with_image(mut self, name: impl Into<String>, tag: impl Into<String>) -> Self {
        self.image = Some(ImageOverride {
            name: name.into(),
            tag: tag.into(),
        });
        self
    }

    /// Validate field values and normalize the registry URL. A URL without a
    /// scheme is assumed to be plain HTTP, matching common local-registry
    /// setups.
    pub fn validate(mut self) -> Result<Self> {
        if self.registry_url.is_empty() {
            return Err(PusherError::Configuration(
                "registry URL cannot be empty".to_string(),
            ));
        }
        if !self.registry_url.starts_with("http://") && !self.registry_url.starts_with("https://") {
            self.registry_url = format!("http://{}", self.registry_url);
        }
        while self.registry_url.ends_with('/') {
            self.registry_url.pop();
        }
        if self.chunk_size == 0 {
            return Err(PusherError::Configuration(
                "chunk size must be greater than 0".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(PusherError::Configuration(
                "concurrency must be greater than 0".to_string(),
            ));
        }
        if !self.tarball.exists() {
            return Err(PusherError::Configuration(format!(
                "tarball does not exist: {}",
                self.tarball.display()
            )));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn tarball() -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"stub").unwrap();
        f
    }

    #[test]
    fn test_defaults() {
        let config = PushConfig::new("https://registry.example.com", "image.tar");
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
        assert!(config.ssl_verify);
        assert!(config.auth.is_none());
        assert!(config.image.is_none());
    }

    #[test]
    fn test_validate_normalizes_scheme_and_trailing_slash() {
        let f = tarball();
        let config = PushConfig::new("registry.example.com/", f.path())
            .validate()
            .unwrap();
        assert_eq!(config.registry_url, "http://registry.example.com");
    }

    #[test]
    fn test_validate_rejects_zero_chunk_size() {
        let f = tarball();
        let result = PushConfig::new("http://r", f.path())
            .with_chunk_size(0)
            .validate();
        assert!(matches!(result, Err(PusherError::Configuration(_))));
    }

    #[test]
    fn test_validate_rejects_missing_tarball() {
        let result = PushConfig::new("http://r", "/definitely/not/here.tar").validate();
        assert!(matches!(result, Err(PusherError::Configuration(_))));
    }
}
