use image::{ImageReader, RgbImage};
use std::io::Cursor;

use crate::error::{LectioError, Result};

/// Decodes JPEG/PNG/WEBP/BMP/GIF/TIFF bytes into a 3-channel buffer.
///
/// The format is sniffed from the content. Alpha and grayscale inputs are
/// converted to RGB.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage> {
    if bytes.is_empty() {
        return Err(LectioError::Decode("empty image data".to_string()));
    }

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| LectioError::Decode(format!("Failed to read image: {e}")))?;

    if reader.format().is_none() {
        let detected = infer::get(bytes)
            .map(|kind| kind.mime_type())
            .unwrap_or("unknown");
        return Err(LectioError::Decode(format!(
            "unsupported image format ({detected})"
        )));
    }

    let img = reader
        .decode()
        .map_err(|e| LectioError::Decode(e.to_string()))?;

    if img.width() == 0 || img.height() == 0 {
        return Err(LectioError::Decode(format!(
            "image has no pixels ({}x{})",
            img.width(),
            img.height()
        )));
    }

    Ok(img.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgba, RgbaImage};

    fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), format).unwrap();
        out
    }

    #[test]
    fn test_decode_png() {
        let img = RgbImage::from_pixel(12, 7, image::Rgb([10, 20, 30]));
        let bytes = encode(DynamicImage::ImageRgb8(img), ImageFormat::Png);

        let decoded = decode_image(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (12, 7));
        assert_eq!(decoded.get_pixel(3, 3).0, [10, 20, 30]);
    }

    #[test]
    fn test_decode_drops_alpha() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([200, 100, 50, 128]));
        let bytes = encode(DynamicImage::ImageRgba8(img), ImageFormat::Png);

        let decoded = decode_image(&bytes).unwrap();
        assert_eq!(decoded.get_pixel(0, 0).0, [200, 100, 50]);
    }

    #[test]
    fn test_decode_grayscale_becomes_rgb() {
        let img = GrayImage::from_pixel(5, 5, Luma([77]));
        let bytes = encode(DynamicImage::ImageLuma8(img), ImageFormat::Png);

        let decoded = decode_image(&bytes).unwrap();
        assert_eq!(decoded.get_pixel(2, 2).0, [77, 77, 77]);
    }

    #[test]
    fn test_decode_ignores_misleading_extension() {
        // Only bytes are inspected, so a JPEG body decodes regardless of name.
        let img = RgbImage::from_pixel(16, 16, image::Rgb([255, 255, 255]));
        let bytes = encode(DynamicImage::ImageRgb8(img), ImageFormat::Jpeg);

        assert!(decode_image(&bytes).is_ok());
    }

    #[test]
    fn test_empty_input_is_decode_error() {
        let err = decode_image(&[]).unwrap_err();
        assert!(matches!(err, LectioError::Decode(_)));
    }

    #[test]
    fn test_random_bytes_are_decode_error() {
        let err = decode_image(b"definitely not an image").unwrap_err();
        assert!(matches!(err, LectioError::Decode(_)));
    }

    #[test]
    fn test_pdf_reports_detected_type() {
        let err = decode_image(b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n1 0 obj").unwrap_err();
        assert!(err.to_string().contains("application/pdf"), "got: {err}");
    }

    #[test]
    fn test_truncated_png_is_decode_error() {
        let img = RgbImage::from_pixel(32, 32, image::Rgb([1, 2, 3]));
        let bytes = encode(DynamicImage::ImageRgb8(img), ImageFormat::Png);

        let err = decode_image(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, LectioError::Decode(_)));
    }
}
