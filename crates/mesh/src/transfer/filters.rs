//! File name predicates and namers for transfer passes

use crate::models::MessageMetadata;

const BSS_PREFIX: &str = "bss_";
const BSS_EXTENSION: &str = ".csv";

/// A breast screening extract: `bss_*.csv`, case-insensitive
pub fn is_valid_bss_file(metadata: &MessageMetadata) -> bool {
    let name = metadata.file_name.to_ascii_lowercase();
    name.starts_with(BSS_PREFIX) && name.ends_with(BSS_EXTENSION)
}

/// Complement of `predicate`, used for the poison pass
pub fn negate<F>(predicate: F) -> impl Fn(&MessageMetadata) -> bool
where
    F: Fn(&MessageMetadata) -> bool,
{
    move |metadata: &MessageMetadata| !predicate(metadata)
}

/// Store files under the name the sender gave them
pub fn original_file_name(metadata: &MessageMetadata) -> String {
    metadata.file_name.clone()
}
