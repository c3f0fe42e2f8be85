//! Manifest data model: the tar's `manifest.json` entry on the input side and
//! the Distribution API v2 image manifest on the output side.

use serde::{Deserialize, Serialize};

use crate::error::{ManifestOperation, PusherError, Result};

/// Media type constants used on the wire.
pub mod media_types {
    pub const OCTET_STREAM: &str = "application/octet-stream";
    pub const MANIFEST: &str = "application/vnd.docker.distribution.manifest.v2+json";
    pub const LAYER: &str = "application/vnd.docker.image.rootfs.diff.tar";
    pub const CONFIG: &str = "application/vnd.docker.container.image.v1+json";
}

/// One entry of the `manifest.json` array inside a `docker save` tarball.
#[derive(Debug, Clone, Deserialize)]
pub struct TarManifest {
    #[serde(rename = "Config")]
    pub config: String,
    #[serde(rename = "RepoTags")]
    pub repo_tags: Vec<String>,
    #[serde(rename = "Layers")]
    pub layers: Vec<String>,
}

impl TarManifest {
    /// Reject manifests that are missing any of the three pieces the push
    /// flow depends on.
    pub fn validate(&self) -> Result<()> {
        if self.config.is_empty() || self.repo_tags.is_empty() || self.layers.is_empty() {
            return Err(PusherError::manifest(
                "manifest does not contain layers, repo tags or config information",
                ManifestOperation::Validate,
            ));
        }
        Ok(())
    }
}

/// A completed blob: content digest, size in bytes and wire media type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlobDescriptor {
    #[serde(rename = "mediaType")]
    pub media_type: String,
    pub size: u64,
    pub digest: String,
}

/// The image manifest pushed to `/v2/{name}/manifests/{tag}`.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryManifest {
    #[serde(rename = "schemaVersion")]
    pub schema_version: u32,
    #[serde(rename = "mediaType")]
    pub media_type: String,
    pub config: BlobDescriptor,
    pub layers: Vec<BlobDescriptor>,
}

/// Collects layer and config descriptors as their uploads complete and
/// assembles the registry manifest once everything is recorded.
///
/// Layer order is the caller's responsibility: descriptors must be added in
/// the order the layers appear in the source tar manifest, not in upload
/// completion order.
#[derive(Debug, Default)]
pub struct ManifestBuilder {
    config: Option<BlobDescriptor>,
    layers: Vec<BlobDescriptor>,
}

impl ManifestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_layer(&mut self, digest: impl Into<String>, size: u64) {
        self.layers.push(BlobDescriptor {
            media_type: media_types::LAYER.to_string(),
            size,
            digest: digest.into(),
        });
    }

    pub fn set_config(&mut self, digest: impl Into<String>, size: u64) {
        self.config = Some(BlobDescriptor {
            media_type: media_types::CONFIG.to_string(),
            size,
            digest: digest.into(),
        });
    }

    /// Fails unless both the config descriptor and at least one layer have
    /// been recorded.
    pub fn build(self) -> Result<RegistryManifest> {
        let config = self.config.ok_or_else(|| {
            PusherError::manifest("manifest config is not set", ManifestOperation::Build)
        })?;
        if self.layers.is_empty() {
            return Err(PusherError::manifest(
                "manifest layers are not set",
                ManifestOperation::Build,
            ));
        }
        Ok(RegistryManifest {
            schema_version: 2,
            media_type: media_types::MANIFEST.to_string(),
            config,
            layers: self.layers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_requires_config() {
        let mut builder = ManifestBuilder::new();
        builder.add_layer("sha256:aaaa", 10);
        assert!(matches!(
            builder.build(),
            Err(PusherError::Manifest {
                operation: ManifestOperation::Build,
                ..
            })
        ));
    }

    #[test]
    fn test_build_requires_layers() {
        let mut builder = ManifestBuilder::new();
        builder.set_config("sha256:cccc", 42);
        assert!(matches!(
            builder.build(),
            Err(PusherError::Manifest {
                operation: ManifestOperation::Build,
                ..
            })
        ));
    }

    #[test]
    fn test_build_preserves_layer_order() {
        let mut builder = ManifestBuilder::new();
        builder.add_layer("sha256:first", 1);
        builder.add_layer("sha256:second", 2);
        builder.add_layer("sha256:third", 3);
        builder.set_config("sha256:cfg", 4);

        let manifest = builder.build().unwrap();
        assert_eq!(manifest.schema_version, 2);
        assert_eq!(manifest.media_type, media_types::MANIFEST);
        assert_eq!(manifest.config.media_type, media_types::CONFIG);
        let digests: Vec<&str> = manifest.layers.iter().map(|l| l.digest.as_str()).collect();
        assert_eq!(digests, vec!["sha256:first", "sha256:second", "sha256:third"]);
    }

    #[test]
    fn test_wire_field_names() {
        let mut builder = ManifestBuilder::new();
        builder.add_layer("sha256:l", 7);
        builder.set_config("sha256:c", 3);
        let value = serde_json::to_value(builder.build().unwrap()).unwrap();

        assert_eq!(value["schemaVersion"], 2);
        assert_eq!(value["mediaType"], media_types::MANIFEST);
        assert_eq!(value["config"]["mediaType"], media_types::CONFIG);
        assert_eq!(value["layers"][0]["mediaType"], media_types::LAYER);
        assert_eq!(value["layers"][0]["size"], 7);
    }

    #[test]
    fn test_tar_manifest_validate() {
        let manifest: TarManifest = serde_json::from_str(
            r#"{"Config":"cfg.json","RepoTags":["app:v1"],"Layers":["l1/layer.tar"]}"#,
        )
        .unwrap();
        assert!(manifest.validate().is_ok());

        let empty_layers: TarManifest =
            serde_json::from_str(r#"{"Config":"cfg.json","RepoTags":["app:v1"],"Layers":[]}"#)
                .unwrap();
        assert!(empty_layers.validate().is_err());
    }
}
