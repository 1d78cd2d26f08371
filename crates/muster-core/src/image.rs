//! Image payload guard.
//!
//! Validates the encoded capture payload before any recognizer call is
//! made. Only the data-URI envelope is inspected; decoding and pixel work
//! belong to the recognizer service.

use crate::error::{WorkflowError, WorkflowResult};

/// Ceiling on the transmitted payload: 10 MiB of raw bytes in base64
/// expansion, rounded up. Works out to 13,981,014 characters.
pub const MAX_ENCODED_IMAGE_LEN: usize = (10 * 1024 * 1024 * 4 + 2) / 3;

const ALLOWED_MIME_PREFIXES: [&str; 2] = [
    "data:image/jpeg;base64,",
    "data:image/png;base64,",
];

/// Check the payload's claimed MIME kind and encoded size.
///
/// Rejections are client-input errors: nothing is retried and nothing is
/// truncated. A payload exactly at the ceiling is accepted.
pub fn validate_payload(image: &str) -> WorkflowResult<()> {
    let has_valid_mime = ALLOWED_MIME_PREFIXES
        .iter()
        .any(|prefix| image.starts_with(prefix));
    if !has_valid_mime {
        return Err(WorkflowError::InvalidInput(
            "invalid image format; only JPEG and PNG are supported".into(),
        ));
    }
    if image.len() > MAX_ENCODED_IMAGE_LEN {
        return Err(WorkflowError::InvalidInput(
            "image exceeds the maximum allowed size of 10 MiB".into(),
        ));
    }
    Ok(())
}
