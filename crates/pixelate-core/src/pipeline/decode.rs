//! The codec boundary: bytes in, RGBA raster out (and back).

use image::{ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::Path;

use crate::error::{PipelineError, PipelineResult};
use crate::types::Raster;

/// Turns file contents into rasters and rasters into file contents.
pub trait RasterCodec: Send + Sync {
    /// Decode `bytes` read from `path` into an RGBA raster.
    fn decode(&self, bytes: &[u8], path: &Path) -> PipelineResult<Raster>;

    /// Encode a raster for persistence.
    fn encode(&self, raster: &Raster) -> PipelineResult<Vec<u8>>;
}

/// Codec backed by the `image` crate.
///
/// The input format is sniffed from the content, falling back to the file
/// extension. Output is always PNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCodec;

impl RasterCodec for ImageCodec {
    fn decode(&self, bytes: &[u8], path: &Path) -> PipelineResult<Raster> {
        let mut reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Cannot detect image format: {e}"),
            })?;

        if reader.format().is_none() {
            let format = ImageFormat::from_path(path).map_err(|_| PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!(
                    "Unrecognized image format (extension: {})",
                    path.extension()
                        .and_then(|e| e.to_str())
                        .unwrap_or("none")
                ),
            })?;
            reader.set_format(format);
        }

        let image = reader.decode().map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(image.into_rgba8())
    }

    fn encode(&self, raster: &Raster) -> PipelineResult<Vec<u8>> {
        let mut out = Cursor::new(Vec::new());
        raster
            .write_to(&mut out, ImageFormat::Png)
            .map_err(|e| PipelineError::Encode {
                message: e.to_string(),
            })?;
        Ok(out.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn png_bytes(raster: &RgbaImage) -> Vec<u8> {
        ImageCodec.encode(raster).unwrap()
    }

    #[test]
    fn test_decode_png() {
        let source = RgbaImage::from_pixel(5, 3, Rgba([10, 20, 30, 40]));
        let decoded = ImageCodec
            .decode(&png_bytes(&source), Path::new("a.png"))
            .unwrap();
        assert_eq!(decoded, source);
    }

    #[test]
    fn test_format_detected_by_content() {
        // PNG bytes behind a .jpg name still decode
        let source = RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 255]));
        let decoded = ImageCodec
            .decode(&png_bytes(&source), Path::new("misnamed.jpg"))
            .unwrap();
        assert_eq!(decoded.dimensions(), (2, 2));
    }

    #[test]
    fn test_decode_garbage_is_decode_error() {
        let err = ImageCodec
            .decode(b"definitely not an image", Path::new("junk.png"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
        assert!(err.to_string().contains("junk.png"));
    }

    #[test]
    fn test_decode_unknown_content_and_extension() {
        let err = ImageCodec
            .decode(b"hello, world", Path::new("notes.raw"))
            .unwrap_err();
        assert!(err.to_string().contains("Unrecognized image format"));
    }

    #[test]
    fn test_decode_headerless_family_ppm() {
        // Binary PPM, 2x1
        let mut bytes = b"P6\n2 1\n255\n".to_vec();
        bytes.extend_from_slice(&[255, 0, 0, 0, 0, 255]);
        let decoded = ImageCodec.decode(&bytes, Path::new("tiny.ppm")).unwrap();
        assert_eq!(decoded.dimensions(), (2, 1));
        assert_eq!(decoded.get_pixel(1, 0), &Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_decode_truncated_png_fails() {
        let bytes = png_bytes(&RgbaImage::new(16, 16));
        let err = ImageCodec
            .decode(&bytes[..bytes.len() / 2], Path::new("cut.png"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
    }

    #[test]
    fn test_encode_writes_png_signature() {
        let bytes = png_bytes(&RgbaImage::new(1, 1));
        assert_eq!(&bytes[..4], &[0x89, b'P', b'N', b'G']);
    }
}
