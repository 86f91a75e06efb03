//! User-facing failure messages.
//!
//! Raw failure text never reaches the unit record as-is, whether it came from
//! engine stderr, a library error, or a panic payload. Everything funnels
//! through here so the record always carries a short, readable message
//! instead of an opaque dump.

use std::any::Any;

/// Fixed message for HEIC variants the decoder cannot handle.
pub const UNSUPPORTED_FORMAT_MESSAGE: &str =
    "Format not supported. This usually happens with certain 10-bit or ProRAW HEIC files.";

/// Fallback when a failure carries no usable text at all.
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown conversion error";

/// Reported when the engine returns successfully but with zero images.
pub const NO_OUTPUT_MESSAGE: &str = "Conversion produced no output.";

/// Reported for every image-bearing unit when no engine was injected.
pub const ENGINE_MISSING_MESSAGE: &str =
    "Conversion engine failed to load. Install ImageMagick (magick or convert) or rebuild with the libheif feature.";

/// Longest raw-detail excerpt shown to the user.
const DETAIL_LIMIT: usize = 80;

/// Turn a decode failure into its user-facing message.
///
/// Known unsupported-variant markers ("format not supported", `ERR_LIBHEIF`)
/// get the fixed educational message; anything else is surfaced as
/// `Error: <detail>` with the detail capped at 80 characters.
pub fn classify_decode_failure(detail: &str) -> String {
    if detail.contains("format not supported") || detail.contains("ERR_LIBHEIF") {
        UNSUPPORTED_FORMAT_MESSAGE.to_string()
    } else {
        format!("Error: {}", truncate_chars(detail, DETAIL_LIMIT))
    }
}

/// Extract readable text from a panic payload.
///
/// `panic!("...")` payloads are `&str` or `String`; anything else becomes the
/// fixed unknown-error message.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        UNKNOWN_ERROR_MESSAGE.to_string()
    }
}

/// Truncate to at most `max` characters, never splitting a code point.
fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn libheif_marker_gets_fixed_message() {
        let raw = "heif: ERR_LIBHEIF code 4.3000: Unsupported bit depth";
        assert_eq!(classify_decode_failure(raw), UNSUPPORTED_FORMAT_MESSAGE);
    }

    #[test]
    fn format_not_supported_marker_gets_fixed_message() {
        let raw = "image format not supported by this build";
        assert_eq!(classify_decode_failure(raw), UNSUPPORTED_FORMAT_MESSAGE);
    }

    #[test]
    fn short_detail_passes_through_with_prefix() {
        assert_eq!(
            classify_decode_failure("delegate missing"),
            "Error: delegate missing"
        );
    }

    #[test]
    fn long_detail_is_capped_at_eighty_chars() {
        let raw = "x".repeat(200);
        let message = classify_decode_failure(&raw);
        assert_eq!(message, format!("Error: {}", "x".repeat(80)));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let raw = "é".repeat(100);
        let message = classify_decode_failure(&raw);
        assert_eq!(message.chars().count(), "Error: ".len() + 80);
    }

    #[test]
    fn panic_message_from_str_payload() {
        let payload: Box<dyn Any + Send> = Box::new("worker exploded");
        assert_eq!(panic_message(payload.as_ref()), "worker exploded");
    }

    #[test]
    fn panic_message_from_string_payload() {
        let payload: Box<dyn Any + Send> = Box::new(String::from("formatted panic"));
        assert_eq!(panic_message(payload.as_ref()), "formatted panic");
    }

    #[test]
    fn panic_message_falls_back_for_opaque_payloads() {
        let payload: Box<dyn Any + Send> = Box::new(42u32);
        assert_eq!(panic_message(payload.as_ref()), UNKNOWN_ERROR_MESSAGE);
    }
}
