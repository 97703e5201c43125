//! Pure Rust codec backend, no system libraries.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, BMP, TIFF, WebP) | `image` crate (pure Rust decoders) |
//! | RGB normalisation | `DynamicImage::to_rgba8` + white composite, or `into_rgb8` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//! | EXIF read / validate | `kamadak-exif` (`Reader::read_from_container`) |
//! | EXIF rebuild (TIFF sources) | `kamadak-exif` (`experimental::Writer`) |
//! | EXIF re-attach | `img-parts`, via [`jpeg::insert_exif_segment`](super::jpeg::insert_exif_segment) |
//!
//! For JPEG, PNG and HEIC sources the EXIF block is carried over verbatim. A
//! TIFF file *is* its EXIF container, pixel strips included, so for TIFF the
//! block is rebuilt from the parsed descriptive fields instead.
//!
//! HEIC files are discovered and inspected for EXIF, but no pure Rust HEVC
//! decoder is compiled in, so they are absent from [`Capabilities`].

use super::backend::{BackendError, Capabilities, ImageBackend};
use super::jpeg::{MAX_EXIF_PAYLOAD, insert_exif_segment};
use super::params::{AlphaPolicy, EncodeParams};
use image::codecs::jpeg::JpegEncoder;
use exif::experimental::Writer;
use exif::{In, Tag, Value};
use image::{DynamicImage, ImageFormat, ImageReader, Rgb, RgbImage, RgbaImage};
use std::path::Path;

/// Primary-IFD tags that describe a TIFF's own pixel layout. They are wrong
/// for the re-encoded JPEG and are left out of a rebuilt block.
const TIFF_LAYOUT_TAGS: &[Tag] = &[
    Tag::ImageWidth,
    Tag::ImageLength,
    Tag::BitsPerSample,
    Tag::Compression,
    Tag::PhotometricInterpretation,
    Tag::SamplesPerPixel,
    Tag::RowsPerStrip,
    Tag::PlanarConfiguration,
];

/// Extension → decoder candidates. Only those whose decoder is compiled in
/// end up in the backend's [`Capabilities`].
const DECODE_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("gif", ImageFormat::Gif),
    ("bmp", ImageFormat::Bmp),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
];

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend {
    capabilities: Capabilities,
}

impl RustBackend {
    pub fn new() -> Self {
        let capabilities = Capabilities::new(
            DECODE_CANDIDATES
                .iter()
                .filter(|(_, fmt)| fmt.reading_enabled())
                .map(|(ext, _)| *ext),
        );
        tracing::debug!(
            decoders = ?capabilities.extensions().collect::<Vec<_>>(),
            "codec backend ready"
        );
        Self { capabilities }
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Composite an RGBA image onto an opaque white background.
fn flatten_on_white(rgba: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let a = a as u32;
        let blend = |c: u8| ((c as u32 * a + 255 * (255 - a) + 127) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Re-serialize the descriptive primary-IFD fields (camera, date, GPS) of a
/// TIFF-contained EXIF into a standalone block.
fn rebuild_exif(exif: &exif::Exif) -> Result<Vec<u8>, BackendError> {
    let mut writer = Writer::new();
    for field in exif.fields() {
        if field.ifd_num != In::PRIMARY
            || TIFF_LAYOUT_TAGS.contains(&field.tag)
            || matches!(field.value, Value::Unknown(..))
        {
            continue;
        }
        writer.push_field(field);
    }
    let mut buf = std::io::Cursor::new(Vec::new());
    writer
        .write(&mut buf, exif.little_endian())
        .map_err(|e| BackendError::ProcessingFailed(format!("Failed to rebuild EXIF: {}", e)))?;
    Ok(buf.into_inner())
}

fn normalize(img: DynamicImage, alpha: AlphaPolicy) -> RgbImage {
    match alpha {
        AlphaPolicy::FlattenOnWhite if img.color().has_alpha() => flatten_on_white(&img.to_rgba8()),
        _ => img.into_rgb8(),
    }
}

impl ImageBackend for RustBackend {
    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn read_exif(&self, path: &Path) -> Result<Option<Vec<u8>>, BackendError> {
        let file = std::fs::File::open(path)?;
        let mut reader = std::io::BufReader::new(file);
        match exif::Reader::new().read_from_container(&mut reader) {
            Ok(exif) => {
                let raw = match ImageFormat::from_path(path) {
                    Ok(ImageFormat::Tiff) => rebuild_exif(&exif)?,
                    _ => exif.buf().to_vec(),
                };
                if raw.len() > MAX_EXIF_PAYLOAD {
                    return Err(BackendError::ProcessingFailed(format!(
                        "EXIF block too large to re-attach ({} bytes)",
                        raw.len()
                    )));
                }
                Ok(Some(raw))
            }
            Err(exif::Error::NotFound(_)) => Ok(None),
            Err(e) => Err(BackendError::ProcessingFailed(format!(
                "Failed to read EXIF from {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn load_rgb(&self, path: &Path, alpha: AlphaPolicy) -> Result<RgbImage, BackendError> {
        let img = ImageReader::open(path)?
            .with_guessed_format()?
            .decode()
            .map_err(|e| {
                BackendError::ProcessingFailed(format!(
                    "Failed to decode {}: {}",
                    path.display(),
                    e
                ))
            })?;
        Ok(normalize(img, alpha))
    }

    fn encode(&self, params: &EncodeParams<'_>) -> Result<(), BackendError> {
        let img = params.image;
        let mut buf = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, params.quality.value().max(1));
        encoder
            .encode(
                img.as_raw(),
                img.width(),
                img.height(),
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {}", e)))?;

        let bytes = match params.exif {
            Some(tiff) => insert_exif_segment(&buf, tiff)?,
            None => buf,
        };
        std::fs::write(params.output, bytes)?;
        Ok(())
    }
}
