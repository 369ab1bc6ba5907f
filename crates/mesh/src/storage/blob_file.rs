//! File-based blob storage
//!
//! Directory structure:
//! ```text
//! root/
//!   inbound/
//!     bss_episodes.csv
//!   inbound-poison/
//!     20261018093000_ABC123_bss_episodes.csv.gz
//!   config/
//!     MeshState.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::blob::{BlobExistsError, BlobStore, validate_blob_name, validate_container_name};
use crate::models::BlobFile;

/// File-based blob storage, one directory per container
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    /// Create a new file blob store at the given path
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).context("Failed to create blob storage directory")?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn container_path(&self, container: &str) -> Result<PathBuf> {
        validate_container_name(container)?;
        Ok(self.root.join(container))
    }

    /// Get the file path for a blob
    fn blob_path(&self, container: &str, file_name: &str) -> Result<PathBuf> {
        validate_blob_name(file_name)?;
        Ok(self.container_path(container)?.join(file_name))
    }
}

impl BlobStore for FileBlobStore {
    fn upload(&self, container: &str, file: &BlobFile, overwrite: bool) -> Result<()> {
        let path = self.blob_path(container, &file.file_name)?;

        if !overwrite && path.exists() {
            return Err(BlobExistsError {
                container: container.to_string(),
                file_name: file.file_name.clone(),
            }
            .into());
        }

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write atomically (write to temp, then rename)
        let temp_name = format!(
            ".{}.tmp",
            path.file_name().and_then(|n| n.to_str()).unwrap_or("blob")
        );
        let temp_path = path.with_file_name(temp_name);
        fs::write(&temp_path, &file.content)
            .with_context(|| format!("Failed to write blob {}/{}", container, file.file_name))?;
        fs::rename(&temp_path, &path)?;

        Ok(())
    }

    fn download(&self, container: &str, file_name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.blob_path(container, file_name)?;

        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read(&path)
            .with_context(|| format!("Failed to read blob {}/{}", container, file_name))?;
        Ok(Some(content))
    }

    fn exists(&self, container: &str, file_name: &str) -> Result<bool> {
        Ok(self.blob_path(container, file_name)?.exists())
    }

    fn delete(&self, container: &str, file_name: &str) -> Result<()> {
        let path = self.blob_path(container, file_name)?;
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn ensure_container(&self, container: &str) -> Result<()> {
        let path = self.container_path(container)?;
        fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create container directory: {}", path.display()))
    }
}
