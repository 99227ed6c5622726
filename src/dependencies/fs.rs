use std::{
    io::{Read, SeekFrom},
    path::Path,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

#[derive(Debug, Clone, Default)]
pub struct TokioFs;

impl TokioFs {
    pub fn new() -> Self {
        Self
    }
}

// Dependency to read local archives and descriptors
#[async_trait]
pub trait FileReader {
    /// Returns `None` when the file does not exist.
    async fn file_size(&self, path: &Path) -> Result<Option<u64>>;

    /// Reads at most `length` bytes starting at `offset`.
    async fn read_range(&self, path: &Path, offset: u64, length: u64) -> Result<Vec<u8>>;

    /// Reads a text entry of a zip archive, `None` when the archive has no such entry.
    async fn read_archive_entry(&self, archive: &Path, entry: &str) -> Result<Option<String>>;
}

#[async_trait]
impl FileReader for TokioFs {
    async fn file_size(&self, path: &Path) -> Result<Option<u64>> {
        match tokio::fs::metadata(path).await {
            Ok(metadata) if metadata.is_file() => Ok(Some(metadata.len())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                Err(e).with_context(|| format!("failed to read metadata: {}", path.display()))
            }
        }
    }

    async fn read_range(&self, path: &Path, offset: u64, length: u64) -> Result<Vec<u8>> {
        let mut file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("failed to open file: {}", path.display()))?;
        file.seek(SeekFrom::Start(offset))
            .await
            .with_context(|| format!("failed to seek in file: {}", path.display()))?;

        let mut content = Vec::new();
        file.take(length)
            .read_to_end(&mut content)
            .await
            .with_context(|| format!("failed to read file: {}", path.display()))?;

        Ok(content)
    }

    async fn read_archive_entry(&self, archive: &Path, entry: &str) -> Result<Option<String>> {
        let archive = archive.to_path_buf();
        let entry = entry.to_string();

        // The zip crate is blocking
        tokio::task::spawn_blocking(move || -> Result<Option<String>> {
            let file = std::fs::File::open(&archive)
                .with_context(|| format!("failed to open archive: {}", archive.display()))?;
            let mut zip = zip::ZipArchive::new(file)
                .with_context(|| format!("not a valid archive: {}", archive.display()))?;

            let mut zip_entry = match zip.by_name(&entry) {
                Ok(zip_entry) => zip_entry,
                Err(zip::result::ZipError::FileNotFound) => return Ok(None),
                Err(e) => {
                    return Err(e).with_context(|| format!("failed to read archive entry {entry}"));
                }
            };

            let mut content = String::new();
            zip_entry
                .read_to_string(&mut content)
                .with_context(|| format!("failed to read archive entry {entry}"))?;

            Ok(Some(content))
        })
        .await
        .context("reading archive entry")?
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use mockall::mock;

    mock! {
        pub TokioFs {}

        #[async_trait]
        impl FileReader for TokioFs {
            async fn file_size(&self, path: &Path) -> Result<Option<u64>>;
            async fn read_range(&self, path: &Path, offset: u64, length: u64) -> Result<Vec<u8>>;
            async fn read_archive_entry(&self, archive: &Path, entry: &str) -> Result<Option<String>>;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    #[tokio::test]
    async fn test_file_size_missing_file() {
        let dir = tempfile::tempdir().unwrap();

        let size = TokioFs::new()
            .file_size(&dir.path().join("missing.mtar"))
            .await
            .unwrap();

        assert_eq!(size, None);
    }

    #[tokio::test]
    async fn test_read_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.mtar");
        std::fs::write(&path, b"0123456789").unwrap();

        let fs = TokioFs::new();

        assert_eq!(fs.file_size(&path).await.unwrap(), Some(10));
        assert_eq!(fs.read_range(&path, 0, 4).await.unwrap(), b"0123");
        assert_eq!(fs.read_range(&path, 8, 4).await.unwrap(), b"89");
    }

    #[tokio::test]
    async fn test_read_archive_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.mtar");

        let mut zip = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
        zip.start_file("META-INF/mtad.yaml", SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"ID: com.example.app\nversion: 1.0.0\n")
            .unwrap();
        zip.finish().unwrap();

        let fs = TokioFs::new();

        assert_eq!(
            fs.read_archive_entry(&path, "META-INF/mtad.yaml")
                .await
                .unwrap()
                .as_deref(),
            Some("ID: com.example.app\nversion: 1.0.0\n")
        );
        assert_eq!(
            fs.read_archive_entry(&path, "META-INF/MANIFEST.MF")
                .await
                .unwrap(),
            None
        );
    }
}
