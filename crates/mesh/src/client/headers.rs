//! MESH response header parsing
//!
//! Converts the `mex-*` headers of a HEAD/GET inbox response into
//! [`MessageMetadata`].

use ureq::http::HeaderMap;

use crate::models::{MessageId, MessageMetadata, MessageType};

pub(crate) const MEX_FILENAME: &str = "mex-filename";
pub(crate) const MEX_MESSAGETYPE: &str = "mex-messagetype";
pub(crate) const MEX_CHUNK_RANGE: &str = "mex-chunk-range";
pub(crate) const MEX_MESSAGEID: &str = "mex-messageid";
const MEX_WORKFLOWID: &str = "mex-workflowid";
const MEX_FROM: &str = "mex-from";
const MEX_TO: &str = "mex-to";
const MEX_LOCALID: &str = "mex-localid";
const MEX_SUBJECT: &str = "mex-subject";

/// Build message metadata from response headers
///
/// `message_id` is used when the response doesn't echo `mex-messageid`.
/// A missing `mex-messagetype` is treated as DATA.
pub fn parse_message_headers(message_id: &MessageId, headers: &HeaderMap) -> MessageMetadata {
    let id = header(headers, MEX_MESSAGEID)
        .map(MessageId::new)
        .unwrap_or_else(|| message_id.clone());
    let file_name = header(headers, MEX_FILENAME).unwrap_or_default();

    let mut builder = MessageMetadata::builder(id, file_name).message_type(
        header(headers, MEX_MESSAGETYPE)
            .map(|t| MessageType::parse(&t))
            .unwrap_or(MessageType::Data),
    );

    if let Some(total) = header(headers, MEX_CHUNK_RANGE).and_then(|r| parse_chunk_range(&r)) {
        builder = builder.total_chunks(total);
    }
    if let Some(v) = header(headers, MEX_WORKFLOWID) {
        builder = builder.workflow_id(v);
    }
    if let Some(v) = header(headers, MEX_FROM) {
        builder = builder.sender(v);
    }
    if let Some(v) = header(headers, MEX_TO) {
        builder = builder.recipient(v);
    }
    if let Some(v) = header(headers, MEX_LOCALID) {
        builder = builder.local_id(v);
    }
    if let Some(v) = header(headers, MEX_SUBJECT) {
        builder = builder.subject(v);
    }
    if let Some(v) = header(headers, "content-type") {
        builder = builder.content_type(v);
    }
    if let Some(v) = header(headers, "content-encoding") {
        builder = builder.content_encoding(v);
    }

    builder.build()
}

/// Parse `"{current}:{total}"` into the total chunk count
pub(crate) fn parse_chunk_range(range: &str) -> Option<u32> {
    let (_, total) = range.trim().split_once(':')?;
    total.trim().parse().ok()
}

/// Extract a non-empty header value as a string
pub(crate) fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
