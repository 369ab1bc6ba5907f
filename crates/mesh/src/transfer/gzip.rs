//! Gzip detection and decompression for downloaded message content

use flate2::read::MultiGzDecoder;
use std::io::Read;

/// Gzip magic number
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Extensions removed from a file name after successful decompression
const COMPRESSION_EXTENSIONS: [&str; 2] = [".gz", ".gzip"];

/// Check the first two bytes for the gzip magic number
pub fn is_gzip(content: &[u8]) -> bool {
    content.len() >= 2 && content[..2] == GZIP_MAGIC
}

/// Result of a successful decompression
#[derive(Debug)]
pub struct Decompressed {
    pub content: Vec<u8>,
    /// File name stored in the gzip header (FNAME), if the sender set one
    pub embedded_name: Option<String>,
}

/// Decompress a gzip stream (multi-member streams are concatenated)
pub fn decompress(content: &[u8]) -> std::io::Result<Decompressed> {
    let mut decoder = MultiGzDecoder::new(content);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;

    let embedded_name = decoder
        .header()
        .and_then(|h| h.filename())
        .and_then(sanitize_embedded_name);

    Ok(Decompressed {
        content: out,
        embedded_name,
    })
}

/// Remove a trailing `.gz` / `.gzip` (case-insensitive)
pub fn strip_compression_extension(file_name: &str) -> &str {
    let lower = file_name.to_ascii_lowercase();
    for ext in COMPRESSION_EXTENSIONS {
        if lower.ends_with(ext) && file_name.len() > ext.len() {
            return &file_name[..file_name.len() - ext.len()];
        }
    }
    file_name
}

/// Keep only the final path component of a header name
fn sanitize_embedded_name(raw: &[u8]) -> Option<String> {
    let name = String::from_utf8_lossy(raw);
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if base.is_empty() || base == "." || base == ".." {
        None
    } else {
        Some(base.to_string())
    }
}
