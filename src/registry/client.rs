//! HTTP client for the Distribution API v2 chunked blob upload protocol.
//!
//! Each blob goes through initiate (POST), zero or more chunk transfers
//! (PATCH) and a finalize (PUT) that carries the last chunk together with the
//! content digest. The session URL returned by the registry may change after
//! every chunk, so the latest `Location` always replaces the current one.

use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, LOCATION};
use reqwest::{Client, Response};

use crate::config::AuthConfig;
use crate::digest::DigestAccumulator;
use crate::error::{PusherError, RegistryOperation, Result, UploadOperation};
use crate::manifest::{media_types, BlobDescriptor, RegistryManifest};
use crate::workdir::ChunkReader;

pub struct RegistryClientBuilder {
    base_url: String,
    auth: Option<AuthConfig>,
    ssl_verify: bool,
}

impl RegistryClientBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth: None,
            ssl_verify: true,
        }
    }

    pub fn with_auth(mut self, auth: Option<AuthConfig>) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_ssl_verify(mut self, ssl_verify: bool) -> Self {
        self.ssl_verify = ssl_verify;
        self
    }

    pub fn build(self) -> Result<RegistryClient> {
        let mut headers = HeaderMap::new();
        if let Some(auth) = &self.auth {
            let token = base64::engine::general_purpose::STANDARD
                .encode(format!("{}:{}", auth.username, auth.password));
            let mut value = HeaderValue::from_str(&format!("Basic {token}"))
                .map_err(|e| PusherError::Configuration(format!("invalid credentials: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = Client::builder().default_headers(headers);
        if !self.ssl_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder.build()?;

        Ok(RegistryClient {
            client,
            base_url: self.base_url,
        })
    }
}

/// Mutable state of one in-flight blob upload. Owned exclusively by the
/// upload that created it and discarded once the blob finalizes.
struct UploadSession {
    session_url: String,
    bytes_sent: u64,
}

pub struct RegistryClient {
    client: Client,
    base_url: String,
}

impl RegistryClient {
    pub fn builder(base_url: impl Into<String>) -> RegistryClientBuilder {
        RegistryClientBuilder::new(base_url)
    }

    /// Start an upload session for a blob of `image`. Returns the absolute
    /// session URL from the `Location` header.
    pub async fn initiate_upload(&self, image: &str) -> Result<String> {
        let url = format!("{}/v2/{}/blobs/uploads/", self.base_url, image);
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| registry_error(&url, image, None, e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(registry_error(
                &url,
                image,
                Some(status),
                format!("unexpected status {status}"),
            ));
        }
        let location = header_location(&response).ok_or_else(|| {
            registry_error(&url, image, None, "no Location header in upload response")
        })?;
        Ok(self.resolve_location(&location))
    }

    /// Upload one blob in chunks and finalize it with its content digest.
    ///
    /// The total size must be known up front: a chunk that brings the byte
    /// count up to `total_size` is the final chunk and is retained for the
    /// finalize request instead of being transferred separately. A zero-byte
    /// blob produces no chunks and finalizes with an empty body and the
    /// digest of the empty byte sequence.
    pub async fn upload_blob(
        &self,
        image: &str,
        file_name: &str,
        media_type: &str,
        total_size: u64,
        chunks: &mut ChunkReader,
    ) -> Result<BlobDescriptor> {
        let session_url = self.initiate_upload(image).await?;
        let mut session = UploadSession {
            session_url,
            bytes_sent: 0,
        };
        let mut digest = DigestAccumulator::new();
        let mut final_chunk: Vec<u8> = Vec::new();

        loop {
            let chunk = match chunks.next_chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => {
                    return Err(upload_error(
                        file_name,
                        &session,
                        total_size,
                        UploadOperation::Chunk,
                        e.to_string(),
                    ))
                }
            };

            let start = session.bytes_sent;
            let len = chunk.len() as u64;
            digest.update(&chunk);
            session.bytes_sent += len;

            if session.bytes_sent < total_size {
                // Intermediate chunk: PATCH it and follow the relocated
                // session URL from the response.
                let response = self
                    .client
                    .patch(&session.session_url)
                    .header(CONTENT_TYPE, media_types::OCTET_STREAM)
                    .header(CONTENT_LENGTH, len)
                    .header(CONTENT_RANGE, format!("{}-{}", start, start + len))
                    .body(chunk)
                    .send()
                    .await
                    .map_err(|e| {
                        upload_error(file_name, &session, total_size, UploadOperation::Chunk, e.to_string())
                    })?;

                if !response.status().is_success() {
                    return Err(upload_error(
                        file_name,
                        &session,
                        total_size,
                        UploadOperation::Chunk,
                        format!("unexpected status {}", response.status().as_u16()),
                    ));
                }
                let location = header_location(&response).ok_or_else(|| {
                    upload_error(
                        file_name,
                        &session,
                        total_size,
                        UploadOperation::Chunk,
                        "no Location header in chunk response",
                    )
                })?;
                session.session_url = self.resolve_location(&location);
            } else {
                // Final chunk: retained and sent with the finalize request,
                // saving a round trip.
                final_chunk = chunk;
            }
        }

        let digest = digest.finalize();
        let len = final_chunk.len() as u64;
        let start = session.bytes_sent - len;
        let url = finalize_url(&session.session_url, &digest);
        let response = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, media_types::OCTET_STREAM)
            .header(CONTENT_LENGTH, len)
            .header(CONTENT_RANGE, format!("{}-{}", start, start + len))
            .body(final_chunk)
            .send()
            .await
            .map_err(|e| {
                upload_error(file_name, &session, total_size, UploadOperation::Finalize, e.to_string())
            })?;

        if !response.status().is_success() {
            return Err(upload_error(
                file_name,
                &session,
                total_size,
                UploadOperation::Finalize,
                format!("unexpected status {}", response.status().as_u16()),
            ));
        }

        Ok(BlobDescriptor {
            media_type: media_type.to_string(),
            size: session.bytes_sent,
            digest,
        })
    }

    /// Push the assembled manifest under `image:tag`.
    pub async fn push_manifest(
        &self,
        image: &str,
        tag: &str,
        manifest: &RegistryManifest,
    ) -> Result<()> {
        let url = format!("{}/v2/{}/manifests/{}", self.base_url, image, tag);
        let body = serde_json::to_vec(manifest).map_err(|e| {
            PusherError::manifest(
                format!("cannot serialize manifest: {e}"),
                crate::error::ManifestOperation::Build,
            )
        })?;
        let response = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, media_types::MANIFEST)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                registry_push_error(&url, image, tag, None, e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(registry_push_error(
                &url,
                image,
                tag,
                Some(status),
                format!("unexpected status {status}"),
            ));
        }
        Ok(())
    }

    /// Registries may return the session URL server-relative; resolve it
    /// against the registry base URL.
    fn resolve_location(&self, location: &str) -> String {
        if location.starts_with('/') {
            format!("{}{}", self.base_url, location)
        } else {
            location.to_string()
        }
    }
}

/// Append the digest to the session URL's query string. Session URLs carry a
/// query in practice; a bare URL gets a fresh one.
fn finalize_url(session_url: &str, digest: &str) -> String {
    if session_url.contains('?') {
        format!("{session_url}&digest={digest}")
    } else {
        format!("{session_url}?digest={digest}")
    }
}

fn header_location(response: &Response) -> Option<String> {
    response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn registry_error(
    url: &str,
    image: &str,
    status: Option<u16>,
    message: impl Into<String>,
) -> PusherError {
    PusherError::Registry {
        message: message.into(),
        status,
        url: url.to_string(),
        image: image.to_string(),
        tag: None,
        operation: RegistryOperation::InitiateUpload,
    }
}

fn registry_push_error(
    url: &str,
    image: &str,
    tag: &str,
    status: Option<u16>,
    message: impl Into<String>,
) -> PusherError {
    PusherError::Registry {
        message: message.into(),
        status,
        url: url.to_string(),
        image: image.to_string(),
        tag: Some(tag.to_string()),
        operation: RegistryOperation::PushManifest,
    }
}

fn upload_error(
    file_name: &str,
    session: &UploadSession,
    total_bytes: u64,
    operation: UploadOperation,
    message: impl Into<String>,
) -> PusherError {
    PusherError::Upload {
        message: message.into(),
        file_name: file_name.to_string(),
        upload_url: session.session_url.clone(),
        bytes_uploaded: session.bytes_sent,
        total_bytes,
        operation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finalize_url_appends_to_existing_query() {
        assert_eq!(
            finalize_url("http://r/upload/abc?_state=x", "sha256:d"),
            "http://r/upload/abc?_state=x&digest=sha256:d"
        );
        assert_eq!(
            finalize_url("http://r/upload/abc", "sha256:d"),
            "http://r/upload/abc?digest=sha256:d"
        );
    }

    #[test]
    fn test_resolve_location() {
        let client = RegistryClient::builder("http://registry:5000").build().unwrap();
        assert_eq!(
            client.resolve_location("/v2/app/blobs/uploads/abc?_state=x"),
            "http://registry:5000/v2/app/blobs/uploads/abc?_state=x"
        );
        assert_eq!(
            client.resolve_location("http://other/session"),
            "http://other/session"
        );
    }
}
