//! Photo ingestion contract for camera and gallery captures.
//!
//! A raw capture becomes a self-contained data-URI `Photo` with an empty
//! caption; callers append it to a report's photo list. Edits replace the
//! payload in place via [`crate::models::Report::replace_photo_uri`].

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::models::Photo;

/// Convert a raw capture into a stored photo.
pub fn ingest_capture(bytes: &[u8], mime: &str) -> Photo {
  Photo {
    uri: format!("data:{};base64,{}", mime, STANDARD.encode(bytes)),
    caption: String::new(),
  }
}
