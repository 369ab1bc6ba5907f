//! Blob storage trait for transferred files and engine state

use anyhow::Result;

use crate::models::BlobFile;

/// Error returned when an upload without overwrite hits an existing blob
#[derive(Debug, thiserror::Error)]
#[error("Blob {container}/{file_name} already exists")]
pub struct BlobExistsError {
    pub container: String,
    pub file_name: String,
}

/// Trait for blob storage operations
///
/// A store is bound to one storage account (or root directory) when it is
/// constructed; containers are addressed by name on each call.
pub trait BlobStore: Send + Sync {
    /// Write a file into a container
    ///
    /// With `overwrite == false` an existing blob of the same name fails the
    /// upload with [`BlobExistsError`].
    fn upload(&self, container: &str, file: &BlobFile, overwrite: bool) -> Result<()>;

    /// Read a blob
    ///
    /// Returns None if the blob doesn't exist.
    fn download(&self, container: &str, file_name: &str) -> Result<Option<Vec<u8>>>;

    /// Check if a blob exists
    fn exists(&self, container: &str, file_name: &str) -> Result<bool>;

    /// Delete a blob; deleting a missing blob is not an error
    fn delete(&self, container: &str, file_name: &str) -> Result<()>;

    /// Create the container if it doesn't exist yet
    fn ensure_container(&self, container: &str) -> Result<()>;
}

/// Check a container name against the Azure naming rules
///
/// 3-63 characters of lowercase letters, digits and single hyphens, starting
/// and ending with a letter or digit.
pub fn validate_container_name(container: &str) -> Result<()> {
    let valid_chars = container
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    let valid = (3..=63).contains(&container.len())
        && valid_chars
        && !container.starts_with('-')
        && !container.ends_with('-')
        && !container.contains("--");
    anyhow::ensure!(valid, "Invalid container name: {:?}", container);
    Ok(())
}

/// Reject blob names that could escape their container
pub fn validate_blob_name(file_name: &str) -> Result<()> {
    let valid = !file_name.is_empty()
        && file_name.len() <= 1024
        && !file_name.starts_with('/')
        && !file_name.contains('\\')
        && !file_name.split('/').any(|part| part == ".." || part == "." || part.is_empty());
    anyhow::ensure!(valid, "Invalid blob name: {:?}", file_name);
    Ok(())
}
