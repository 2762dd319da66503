use base64::Engine;
use sha2::{Digest, Sha256};

use super::types::PixelBuffer;

/// SHA-256 over the decoded pixels and their shape, base64-encoded.
///
/// Two files that decode to the same pixels get the same digest regardless
/// of container format or compression.
pub fn pixel_digest(pixels: &PixelBuffer) -> String {
    let mut hasher = Sha256::new();
    hasher.update(pixels.width().to_le_bytes());
    hasher.update(pixels.height().to_le_bytes());
    hasher.update((pixels.channels() as u32).to_le_bytes());
    hasher.update(pixels.as_raw());
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}
