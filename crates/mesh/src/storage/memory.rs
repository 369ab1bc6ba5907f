//! In-memory blob storage implementation
//!
//! This implementation is used for testing. Containers or individual file
//! names can be marked as failing to exercise partial-failure paths.

use anyhow::Result;
use std::collections::{BTreeMap, HashSet};
use std::sync::RwLock;

use super::blob::{BlobExistsError, BlobStore, validate_blob_name, validate_container_name};
use crate::models::BlobFile;

/// In-memory implementation of BlobStore
///
/// Uses a BTreeMap keyed by (container, file name) protected by a RwLock.
pub struct InMemoryBlobStore {
    blobs: RwLock<BTreeMap<(String, String), Vec<u8>>>,
    containers: RwLock<HashSet<String>>,
    failing_containers: RwLock<HashSet<String>>,
    failing_files: RwLock<HashSet<String>>,
    uploads: RwLock<Vec<(String, String)>>,
}

impl InMemoryBlobStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(BTreeMap::new()),
            containers: RwLock::new(HashSet::new()),
            failing_containers: RwLock::new(HashSet::new()),
            failing_files: RwLock::new(HashSet::new()),
            uploads: RwLock::new(Vec::new()),
        }
    }

    /// Make every operation against `container` fail
    pub fn fail_container(&self, container: &str) {
        self.failing_containers
            .write()
            .unwrap()
            .insert(container.to_string());
    }

    /// Make uploads of `file_name` fail in any container
    pub fn fail_file(&self, file_name: &str) {
        self.failing_files
            .write()
            .unwrap()
            .insert(file_name.to_string());
    }

    /// Clear all injected failures
    pub fn heal(&self) {
        self.failing_containers.write().unwrap().clear();
        self.failing_files.write().unwrap().clear();
    }

    /// Successful uploads as (container, file name), in order
    pub fn uploads(&self) -> Vec<(String, String)> {
        self.uploads.read().unwrap().clone()
    }

    /// File names stored in a container, sorted
    pub fn list(&self, container: &str) -> Vec<String> {
        self.blobs
            .read()
            .unwrap()
            .keys()
            .filter(|(c, _)| c == container)
            .map(|(_, name)| name.clone())
            .collect()
    }

    pub fn has_container(&self, container: &str) -> bool {
        self.containers.read().unwrap().contains(container)
    }

    fn check_container(&self, container: &str) -> Result<()> {
        validate_container_name(container)?;
        if self.failing_containers.read().unwrap().contains(container) {
            anyhow::bail!("Container {} is unavailable", container);
        }
        Ok(())
    }

    fn key(container: &str, file_name: &str) -> (String, String) {
        (container.to_string(), file_name.to_string())
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobStore for InMemoryBlobStore {
    fn upload(&self, container: &str, file: &BlobFile, overwrite: bool) -> Result<()> {
        self.check_container(container)?;
        validate_blob_name(&file.file_name)?;
        if self.failing_files.read().unwrap().contains(&file.file_name) {
            anyhow::bail!("Upload of {} rejected", file.file_name);
        }

        let key = Self::key(container, &file.file_name);
        let mut blobs = self.blobs.write().unwrap();
        if !overwrite && blobs.contains_key(&key) {
            return Err(BlobExistsError {
                container: container.to_string(),
                file_name: file.file_name.clone(),
            }
            .into());
        }
        blobs.insert(key.clone(), file.content.clone());
        drop(blobs);

        self.containers.write().unwrap().insert(container.to_string());
        self.uploads.write().unwrap().push(key);
        Ok(())
    }

    fn download(&self, container: &str, file_name: &str) -> Result<Option<Vec<u8>>> {
        self.check_container(container)?;
        let blobs = self.blobs.read().unwrap();
        Ok(blobs.get(&Self::key(container, file_name)).cloned())
    }

    fn exists(&self, container: &str, file_name: &str) -> Result<bool> {
        self.check_container(container)?;
        let blobs = self.blobs.read().unwrap();
        Ok(blobs.contains_key(&Self::key(container, file_name)))
    }

    fn delete(&self, container: &str, file_name: &str) -> Result<()> {
        self.check_container(container)?;
        self.blobs
            .write()
            .unwrap()
            .remove(&Self::key(container, file_name));
        Ok(())
    }

    fn ensure_container(&self, container: &str) -> Result<()> {
        self.check_container(container)?;
        self.containers.write().unwrap().insert(container.to_string());
        Ok(())
    }
}
