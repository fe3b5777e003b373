//! Canonical raster re-encoding for embedded media.
//!
//! Every image re-embedded into an output package is stored in one of exactly
//! two encodings: PNG or JPEG. Bytes already in a canonical encoding pass
//! through untouched; everything else is decoded and re-encoded as PNG.
//! Keeping the output alphabet this small is what lets mainstream readers
//! open the generated packages without format surprises.

use crate::opc::constants::content_type as ct;
use std::io::Cursor;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("image decode/encode error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, MediaError>;

/// Re-encode media bytes to a canonical raster encoding.
///
/// Returns the (possibly new) bytes together with the canonical content type
/// they now carry. `image/jpg` is folded into `image/jpeg`; PNG and JPEG
/// bytes pass through unchanged; any other declared type is decoded and
/// re-encoded as PNG. Undecodable bytes are an error, which the caller
/// treats as a failed media resolution.
pub fn to_canonical(blob: Vec<u8>, content_type: &str) -> Result<(Vec<u8>, &'static str)> {
    match content_type.to_ascii_lowercase().as_str() {
        ct::PNG => Ok((blob, ct::PNG)),
        ct::JPEG | "image/jpg" => Ok((blob, ct::JPEG)),
        _ => {
            let decoded = image::load_from_memory(&blob)?;
            let mut out = Cursor::new(Vec::new());
            decoded.write_to(&mut out, image::ImageFormat::Png)?;
            Ok((out.into_inner(), ct::PNG))
        }
    }
}
