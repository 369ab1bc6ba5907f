//! A named file ready to be written to a blob container

/// File content plus the name it is stored under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobFile {
    pub file_name: String,
    pub content: Vec<u8>,
}

impl BlobFile {
    pub fn new(content: Vec<u8>, file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            content,
        }
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}
