//! EXIF re-attachment for encoded JPEG streams.
//!
//! The encoder produces a bare JFIF stream. The source's EXIF block goes back
//! in as an APP1 segment right after the JFIF APP0:
//!
//! ```text
//! FF D8                      SOI
//! FF E0 <len> JFIF\0 ...     APP0 (kept first when present)
//! FF E1 <len> Exif\0\0 TIFF  APP1 (inserted)
//! ...                        rest of the stream, untouched
//! ```
//!
//! Segment parsing and re-encoding is done by `img-parts`.

use super::backend::BackendError;
use img_parts::jpeg::{Jpeg, JpegSegment, markers};
use img_parts::{Bytes, ImageEXIF};

const EXIF_HEADER: &[u8] = b"Exif\0\0";

/// Largest TIFF payload that fits one APP1 segment (length field is u16 and
/// counts itself plus the `Exif\0\0` header).
pub const MAX_EXIF_PAYLOAD: usize = u16::MAX as usize - 2 - EXIF_HEADER.len();

/// Return a copy of `jpeg` with `tiff` embedded as an APP1 EXIF segment,
/// replacing any EXIF already present.
pub fn insert_exif_segment(jpeg: &[u8], tiff: &[u8]) -> Result<Vec<u8>, BackendError> {
    if tiff.len() > MAX_EXIF_PAYLOAD {
        return Err(BackendError::ProcessingFailed(format!(
            "EXIF block of {} bytes does not fit an APP1 segment",
            tiff.len()
        )));
    }
    let mut parsed = Jpeg::from_bytes(Bytes::copy_from_slice(jpeg)).map_err(|e| {
        BackendError::ProcessingFailed(format!("encoded stream is not a JPEG: {}", e))
    })?;
    parsed.set_exif(None);

    let mut contents = Vec::with_capacity(EXIF_HEADER.len() + tiff.len());
    contents.extend_from_slice(EXIF_HEADER);
    contents.extend_from_slice(tiff);
    let segment = JpegSegment::new_with_contents(markers::APP1, Bytes::from(contents));

    let segments = parsed.segments_mut();
    let at = match segments.first() {
        Some(first) if first.marker() == markers::APP0 => 1,
        _ => 0,
    };
    segments.insert(at, segment);

    Ok(parsed.encoder().bytes().to_vec())
}
