//! Push orchestration: extract the tarball, then for each repo tag upload all
//! layers (concurrently), upload the config, assemble the manifest and push
//! it. Any failure aborts the current tag and the whole push call; the
//! working directory is released on every exit path.

use futures::stream::{self, StreamExt, TryStreamExt};

use crate::config::PushConfig;
use crate::error::{PusherError, Result};
use crate::manifest::{media_types, BlobDescriptor, ManifestBuilder, TarManifest};
use crate::output::OutputManager;
use crate::progress::{ProgressCallback, ProgressEvent, ProgressKind};
use crate::registry::RegistryClient;
use crate::workdir::WorkDir;

pub struct TarPusher {
    config: PushConfig,
    output: OutputManager,
    progress: Option<ProgressCallback>,
}

impl TarPusher {
    /// Validates the configuration before anything else runs.
    pub fn new(config: PushConfig) -> Result<Self> {
        Ok(Self {
            config: config.validate()?,
            output: OutputManager::default(),
            progress: None,
        })
    }

    pub fn with_output(mut self, output: OutputManager) -> Self {
        self.output = output;
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Push every repo tag of the tarball to the registry, sequentially.
    pub async fn push(&self) -> Result<()> {
        let client = RegistryClient::builder(self.config.registry_url.clone())
            .with_auth(self.config.auth.clone())
            .with_ssl_verify(self.config.ssl_verify)
            .build()?;

        let workdir = WorkDir::create()?;
        self.output.debug(&format!(
            "extracting {} into {}",
            self.config.tarball.display(),
            workdir.path().display()
        ));
        workdir.extract(&self.config.tarball)?;
        let manifest = workdir.read_tar_manifest()?;

        for repo_tag in &manifest.repo_tags {
            let (image, tag) = self.resolve_reference(repo_tag);
            self.output.info(&format!("[{image}:{tag}] push started"));
            self.push_tag(&client, &workdir, &manifest, &image, &tag).await?;
            self.output.success(&format!("[{image}:{tag}] push finished"));
        }
        Ok(())
    }

    async fn push_tag(
        &self,
        client: &RegistryClient,
        workdir: &WorkDir,
        manifest: &TarManifest,
        image: &str,
        tag: &str,
    ) -> Result<()> {
        let total = manifest.layers.len();

        // Layers upload concurrently; each result keeps its source index so
        // the manifest's layer order matches the tar manifest regardless of
        // completion order.
        let uploads = stream::iter(manifest.layers.iter().enumerate().map(|(index, layer)| {
            async move {
                self.emit(ProgressKind::Layer, index + 1, total, layer);
                self.output.debug(&format!("[{image}:{tag}] pushing layer {layer}"));
                let descriptor = self
                    .upload_file(client, workdir, image, layer, media_types::LAYER)
                    .await?;
                Ok::<_, PusherError>((index, descriptor))
            }
        }));
        let mut results: Vec<(usize, BlobDescriptor)> = uploads
            .buffer_unordered(self.config.concurrency)
            .try_collect()
            .await?;
        results.sort_by_key(|(index, _)| *index);

        let mut builder = ManifestBuilder::new();
        for (_, descriptor) in results {
            builder.add_layer(descriptor.digest, descriptor.size);
        }

        self.emit(ProgressKind::Config, 1, 1, &manifest.config);
        self.output.debug(&format!("[{image}:{tag}] pushing config {}", manifest.config));
        let config = self
            .upload_file(client, workdir, image, &manifest.config, media_types::CONFIG)
            .await?;
        builder.set_config(config.digest, config.size);

        let registry_manifest = builder.build()?;

        self.emit(ProgressKind::Manifest, 1, 1, &format!("{image}:{tag}"));
        self.output.debug(&format!("[{image}:{tag}] pushing manifest"));
        client.push_manifest(image, tag, &registry_manifest).await
    }

    async fn upload_file(
        &self,
        client: &RegistryClient,
        workdir: &WorkDir,
        image: &str,
        file: &str,
        media_type: &str,
    ) -> Result<BlobDescriptor> {
        let size = workdir.file_size(file).await?;
        let mut chunks = workdir.chunk_reader(file, self.config.chunk_size).await?;
        client
            .upload_blob(image, file, media_type, size, &mut chunks)
            .await
    }

    /// The target reference comes from the explicit override when set,
    /// otherwise from the tar's `name:tag` string. A missing tag defaults to
    /// `latest`.
    fn resolve_reference(&self, repo_tag: &str) -> (String, String) {
        if let Some(image) = &self.config.image {
            return (image.name.clone(), image.tag.clone());
        }
        match repo_tag.rsplit_once(':') {
            Some((name, tag)) => (name.to_string(), tag.to_string()),
            None => (repo_tag.to_string(), "latest".to_string()),
        }
    }

    fn emit(&self, kind: ProgressKind, current: usize, total: usize, item: &str) {
        if let Some(callback) = &self.progress {
            callback(&ProgressEvent {
                kind,
                current,
                total,
                item: item.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pusher(config: PushConfig) -> TarPusher {
        TarPusher::new(config).unwrap()
    }

    #[test]
    fn test_resolve_reference_from_repo_tag() {
        let tarball = tempfile::NamedTempFile::new().unwrap();
        let p = pusher(PushConfig::new("http://r", tarball.path()));
        assert_eq!(
            p.resolve_reference("app:v1"),
            ("app".to_string(), "v1".to_string())
        );
        assert_eq!(
            p.resolve_reference("library/app"),
            ("library/app".to_string(), "latest".to_string())
        );
    }

    #[test]
    fn test_resolve_reference_prefers_override() {
        let tarball = tempfile::NamedTempFile::new().unwrap();
        let p = pusher(PushConfig::new("http://r", tarball.path()).with_image("other", "v9"));
        assert_eq!(
            p.resolve_reference("app:v1"),
            ("other".to_string(), "v9".to_string())
        );
    }
}
