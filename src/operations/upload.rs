//! Upload of archives and extension descriptors to the deploy service.
//!
//! Files larger than the chunk size are split into parts, each part becomes a separate file on
//! the deploy service. Parts already known to the service (same name, size and digest) are reused.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use crate::{
    dependencies::{DeployService, FileReader},
    errors::DeployError,
    interaction::{Terminal, entity_name},
    models::{FileMetadata, UploadedFile},
    operations::RetryPolicy,
};

const DIGEST_ALGORITHM: &str = "SHA-256";

pub struct FileUploader<'a> {
    client: &'a dyn DeployService,
    fs: &'a (dyn FileReader + Send + Sync),
    interaction: &'a dyn Terminal,
    chunk_size: u64,
    retry: &'a RetryPolicy,
}

impl<'a> FileUploader<'a> {
    pub fn new(
        client: &'a dyn DeployService,
        fs: &'a (dyn FileReader + Send + Sync),
        interaction: &'a dyn Terminal,
        chunk_size: u64,
        retry: &'a RetryPolicy,
    ) -> Self {
        Self {
            client,
            fs,
            interaction,
            chunk_size: chunk_size.max(1),
            retry,
        }
    }

    /// Upload `paths` in order.
    ///
    /// The returned files mirror the input order, parts of one file are consecutive. Any failure
    /// fails the whole upload and no identifiers are returned.
    pub async fn upload_files(&self, paths: &[PathBuf]) -> Result<Vec<UploadedFile>> {
        trace!(?paths, chunk_size = self.chunk_size, "uploading files");

        // Validate all files first, nothing is uploaded when one of them is missing
        let mut sizes = Vec::with_capacity(paths.len());
        for path in paths {
            let size = self
                .fs
                .file_size(path)
                .await?
                .ok_or_else(|| {
                    DeployError::Validation(format!("Could not find file {}", path.display()))
                })?;
            sizes.push(size);
        }

        let mut known_files = self
            .retry
            .run("listing uploaded files", || self.client.list_files())
            .await
            .map_err(|e| DeployError::from_client("Could not get uploaded files", e))?;
        debug!(count = known_files.len(), "files already known to the deploy service");

        self.interaction
            .say(&format!("Uploading {} files...", paths.len()));

        let mut uploaded = Vec::new();
        for (path, size) in paths.iter().zip(sizes) {
            self.interaction
                .say(&format!("  {}", entity_name(path.display())));

            let parts = self.upload_file(path, size, &mut known_files).await?;
            uploaded.extend(parts);
        }

        self.interaction.ok();

        Ok(uploaded)
    }

    async fn upload_file(
        &self,
        path: &Path,
        size: u64,
        known_files: &mut Vec<FileMetadata>,
    ) -> Result<Vec<UploadedFile>> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .with_context(|| format!("{} is not a file", path.display()))?;

        let part_count = size.div_ceil(self.chunk_size).max(1);
        let mut parts = Vec::with_capacity(part_count as usize);

        for index in 0..part_count {
            let offset = index * self.chunk_size;
            let content = self
                .fs
                .read_range(path, offset, self.chunk_size)
                .await
                .with_context(|| format!("Could not read file {}", path.display()))?;
            let content_size = content.len() as u64;
            let digest = sha256_digest(&content);

            let part_name = if part_count == 1 {
                file_name.clone()
            } else {
                format!("{file_name}.part.{index}")
            };

            let id = match find_known_file(known_files, &part_name, content_size, &digest) {
                Some(known) => {
                    debug!(part_name, file_id = known.id, "file already uploaded, reusing it");
                    known.id.clone()
                }
                None => {
                    let metadata = self.upload_part(&part_name, content).await?;
                    let id = metadata.id.clone();
                    known_files.push(FileMetadata {
                        digest: Some(digest.clone()),
                        digest_algorithm: Some(DIGEST_ALGORITHM.to_string()),
                        size: content_size,
                        ..metadata
                    });
                    id
                }
            };

            parts.push(UploadedFile {
                id,
                path: path.to_path_buf(),
                size: content_size,
                digest,
            });
        }

        Ok(parts)
    }

    async fn upload_part(&self, name: &str, content: Vec<u8>) -> Result<FileMetadata> {
        let _spinner = self
            .interaction
            .start_spinner(format!("Uploading {name}..."))?;

        let metadata = self
            .retry
            .run("uploading file", || {
                self.client.upload_part(name, content.clone())
            })
            .await
            .map_err(|e| DeployError::from_client(&format!("Could not upload file {name}"), e))?;

        debug!(name, file_id = metadata.id, "file uploaded");

        Ok(metadata)
    }

    /// Best-effort removal of uploaded files once the process no longer needs them.
    pub async fn delete_files(&self, files: &[UploadedFile]) {
        for file in files {
            if let Err(e) = self.client.delete_file(&file.id).await {
                debug!(file_id = file.id, error = %e, "could not delete uploaded file");
            }
        }
    }
}

/// Upper-case hex encoded SHA-256 digest, the format the deploy service reports digests in.
pub fn sha256_digest(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode_upper(hasher.finalize())
}

fn find_known_file<'f>(
    known_files: &'f [FileMetadata],
    name: &str,
    size: u64,
    digest: &str,
) -> Option<&'f FileMetadata> {
    known_files.iter().find(|file| {
        file.name == name
            && file.size == size
            && file
                .digest_algorithm
                .as_deref()
                .is_some_and(is_sha256_algorithm)
            && file
                .digest
                .as_deref()
                .is_some_and(|known| known.eq_ignore_ascii_case(digest))
    })
}

fn is_sha256_algorithm(algorithm: &str) -> bool {
    algorithm.replace('-', "").eq_ignore_ascii_case("sha256")
}
