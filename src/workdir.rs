//! Temporary working directory for an extracted image tarball.
//!
//! One push call owns one `WorkDir` for its whole lifetime. The directory is
//! removed when the value drops, so every exit path (success, error, or a
//! cancelled future) releases it exactly once.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use tokio::io::AsyncReadExt;
use uuid::Uuid;

use crate::error::{ManifestOperation, PusherError, Result};
use crate::manifest::TarManifest;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

pub struct WorkDir {
    path: PathBuf,
}

impl WorkDir {
    /// Create a fresh directory under the OS temp dir.
    pub fn create() -> Result<Self> {
        let path = std::env::temp_dir().join(format!("dtp-{}", Uuid::new_v4()));
        fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Extract a saved image tarball into the working directory. Plain tar
    /// and gzipped tar are both accepted; the format is sniffed from the
    /// first two bytes.
    pub fn extract(&self, tarball: &Path) -> Result<()> {
        let mut magic = [0u8; 2];
        let mut file = File::open(tarball)?;
        let gzipped = match file.read(&mut magic)? {
            2 => magic == GZIP_MAGIC,
            _ => false,
        };

        let file = File::open(tarball)?;
        if gzipped {
            Archive::new(GzDecoder::new(file)).unpack(&self.path)?;
        } else {
            Archive::new(file).unpack(&self.path)?;
        }
        Ok(())
    }

    /// Read and validate the first entry of the extracted `manifest.json`.
    pub fn read_tar_manifest(&self) -> Result<TarManifest> {
        let manifest_path = self.path.join("manifest.json");
        let raw = fs::read_to_string(&manifest_path).map_err(|e| PusherError::Manifest {
            message: format!("cannot read manifest.json: {e}"),
            manifest_path: Some(manifest_path.clone()),
            operation: ManifestOperation::Parse,
        })?;
        let entries: Vec<TarManifest> =
            serde_json::from_str(&raw).map_err(|e| PusherError::Manifest {
                message: format!("cannot parse manifest.json: {e}"),
                manifest_path: Some(manifest_path.clone()),
                operation: ManifestOperation::Parse,
            })?;
        let manifest = entries.into_iter().next().ok_or_else(|| PusherError::Manifest {
            message: "manifest.json is an empty array".to_string(),
            manifest_path: Some(manifest_path),
            operation: ManifestOperation::Parse,
        })?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Byte length of an extracted file, known before chunking starts.
    pub async fn file_size(&self, file: &str) -> Result<u64> {
        let meta = tokio::fs::metadata(self.path.join(file)).await?;
        Ok(meta.len())
    }

    /// Open an extracted file for chunked reading.
    pub async fn chunk_reader(&self, file: &str, chunk_size: usize) -> Result<ChunkReader> {
        let file = tokio::fs::File::open(self.path.join(file)).await?;
        Ok(ChunkReader { file, chunk_size })
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

/// Pull-based chunk source: yields chunks of at most `chunk_size` bytes whose
/// concatenation equals the file's exact bytes. `None` signals the end of the
/// file. Not resumable mid-stream; reopen the file to start over.
pub struct ChunkReader {
    file: tokio::fs::File,
    chunk_size: usize,
}

impl ChunkReader {
    pub async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        let mut buf = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while filled < self.chunk_size {
            let n = self.file.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            return Ok(None);
        }
        buf.truncate(filled);
        Ok(Some(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn workdir_with_file(name: &str, contents: &[u8]) -> WorkDir {
        let workdir = WorkDir::create().unwrap();
        fs::write(workdir.path().join(name), contents).unwrap();
        workdir
    }

    #[tokio::test]
    async fn test_chunking_is_lossless() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let workdir = workdir_with_file("blob", &data);

        for chunk_size in [1, 13, 4096, 9999, 10_000, 50_000] {
            let mut reader = workdir.chunk_reader("blob", chunk_size).await.unwrap();
            let mut collected = Vec::new();
            let mut chunks = 0;
            while let Some(chunk) = reader.next_chunk().await.unwrap() {
                assert!(chunk.len() <= chunk_size);
                collected.extend_from_slice(&chunk);
                chunks += 1;
            }
            assert_eq!(collected, data);
            assert_eq!(chunks as usize, data.len().div_ceil(chunk_size));
        }
    }

    #[tokio::test]
    async fn test_chunk_larger_than_file_yields_one_chunk() {
        let workdir = workdir_with_file("blob", b"small");
        let mut reader = workdir.chunk_reader("blob", 1024).await.unwrap();
        assert_eq!(reader.next_chunk().await.unwrap().unwrap(), b"small");
        assert!(reader.next_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_file_yields_no_chunks() {
        let workdir = workdir_with_file("blob", b"");
        assert_eq!(workdir.file_size("blob").await.unwrap(), 0);
        let mut reader = workdir.chunk_reader("blob", 1024).await.unwrap();
        assert!(reader.next_chunk().await.unwrap().is_none());
    }

    #[test]
    fn test_extract_and_read_manifest() {
        let mut tarball = tempfile::NamedTempFile::new().unwrap();
        {
            let mut builder = tar::Builder::new(&mut tarball);
            let manifest =
                br#"[{"Config":"cfg.json","RepoTags":["app:v1"],"Layers":["l1/layer.tar"]}]"#;
            let mut header = tar::Header::new_gnu();
            header.set_size(manifest.len() as u64);
            header.set_cksum();
            builder
                .append_data(&mut header, "manifest.json", manifest.as_slice())
                .unwrap();
            let mut header = tar::Header::new_gnu();
            header.set_size(4);
            header.set_cksum();
            builder
                .append_data(&mut header, "l1/layer.tar", b"data".as_slice())
                .unwrap();
            builder.finish().unwrap();
        }
        tarball.flush().unwrap();

        let workdir = WorkDir::create().unwrap();
        workdir.extract(tarball.path()).unwrap();
        let manifest = workdir.read_tar_manifest().unwrap();
        assert_eq!(manifest.config, "cfg.json");
        assert_eq!(manifest.repo_tags, vec!["app:v1"]);
        assert_eq!(manifest.layers, vec!["l1/layer.tar"]);
        assert!(workdir.path().join("l1/layer.tar").exists());
    }

    #[test]
    fn test_missing_manifest_is_parse_error() {
        let workdir = WorkDir::create().unwrap();
        assert!(matches!(
            workdir.read_tar_manifest(),
            Err(PusherError::Manifest {
                operation: ManifestOperation::Parse,
                ..
            })
        ));
    }

    #[test]
    fn test_drop_removes_directory() {
        let workdir = WorkDir::create().unwrap();
        let path = workdir.path().to_path_buf();
        assert!(path.exists());
        drop(workdir);
        assert!(!path.exists());
    }
}
