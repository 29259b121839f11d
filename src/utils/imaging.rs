// src/utils/imaging.rs

use std::io::Cursor;

use base64::{Engine, engine::general_purpose::STANDARD};
use image::{DynamicImage, ImageFormat, ImageReader, Limits, Rgb, RgbImage, imageops::FilterType};

use crate::error::AppError;

/// Drawings larger than this on either edge are scaled down before marking.
pub const MAX_DRAWING_EDGE: u32 = 2000;

/// Drawings larger than this on either edge are refused before decoding.
pub const MAX_DECODE_EDGE: u32 = 4000;

/// Channel value below which a flattened pixel counts as ink.
const INK_THRESHOLD: u8 = 245;

/// Decodes a `data:image/...;base64,` URL from the canvas widget.
pub fn decode_data_url(data_url: &str) -> Result<Vec<u8>, AppError> {
    let invalid = || AppError::BadRequest("Drawing must be a base64 image data URL".to_string());

    let (meta, payload) = data_url.split_once(',').ok_or_else(invalid)?;
    let meta = meta.strip_prefix("data:").ok_or_else(invalid)?;
    if !meta.starts_with("image/") || !meta.ends_with(";base64") {
        return Err(invalid());
    }

    STANDARD
        .decode(payload.trim())
        .map_err(|e| AppError::BadRequest(format!("Drawing is not valid base64: {}", e)))
}

/// Encodes bytes as a data URL for multimodal model input.
pub fn to_data_url(bytes: &[u8], content_type: &str) -> String {
    format!("data:{};base64,{}", content_type, STANDARD.encode(bytes))
}

/// A canvas drawing composited onto white.
#[derive(Debug)]
pub struct FlattenedDrawing {
    pub png: Vec<u8>,
    /// No stroke darker than the background was found.
    pub blank: bool,
}

/// Decodes an untrusted image, refusing anything over `MAX_DECODE_EDGE`
/// before pixel buffers are allocated.
fn decode_limited(bytes: &[u8]) -> Result<DynamicImage, AppError> {
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_DECODE_EDGE);
    limits.max_image_height = Some(MAX_DECODE_EDGE);

    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| AppError::BadRequest(format!("Unreadable image: {}", e)))?;
    reader.limits(limits);
    Ok(reader.decode()?)
}

/// Composites a (possibly transparent) drawing onto a white background,
/// scales it down if oversized and re-encodes it as PNG.
///
/// CPU-bound; call it from `spawn_blocking`.
pub fn flatten_drawing(bytes: &[u8]) -> Result<FlattenedDrawing, AppError> {
    let rgba = decode_limited(bytes)?.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut flat = RgbImage::new(width, height);
    let mut blank = true;
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = u32::from(a);
        let over_white = |c: u8| ((u32::from(c) * alpha + 255 * (255 - alpha)) / 255) as u8;
        let rgb = [over_white(r), over_white(g), over_white(b)];
        if rgb.iter().any(|c| *c < INK_THRESHOLD) {
            blank = false;
        }
        flat.put_pixel(x, y, Rgb(rgb));
    }

    let mut flattened = DynamicImage::ImageRgb8(flat);
    if width.max(height) > MAX_DRAWING_EDGE {
        flattened = flattened.resize(MAX_DRAWING_EDGE, MAX_DRAWING_EDGE, FilterType::Triangle);
    }

    Ok(FlattenedDrawing {
        png: encode_png(&flattened)?,
        blank,
    })
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, AppError> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| AppError::InternalServerError(format!("PNG encoding failed: {}", e)))?;
    Ok(buffer.into_inner())
}

/// An uploaded scan whose format has been verified.
#[derive(Debug, Clone)]
pub struct ScanImage {
    pub bytes: Vec<u8>,
    pub extension: &'static str,
    pub content_type: &'static str,
}

/// Accepts PNG and JPEG scans with readable headers.
pub fn sniff_scan(bytes: Vec<u8>) -> Result<ScanImage, AppError> {
    let (extension, content_type) = match image::guess_format(&bytes) {
        Ok(ImageFormat::Png) => ("png", "image/png"),
        Ok(ImageFormat::Jpeg) => ("jpg", "image/jpeg"),
        _ => {
            return Err(AppError::BadRequest(
                "Scans must be PNG or JPEG images".to_string(),
            ));
        }
    };

    ImageReader::new(Cursor::new(&bytes))
        .with_guessed_format()
        .map_err(|e| AppError::BadRequest(format!("Unreadable image: {}", e)))?
        .into_dimensions()?;

    Ok(ScanImage {
        bytes,
        extension,
        content_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn png_with_stroke(stroke: bool) -> Vec<u8> {
        let mut img = RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 0]));
        if stroke {
            img.put_pixel(3, 3, Rgba([0, 0, 0, 255]));
        }
        encode_png(&DynamicImage::ImageRgba8(img)).unwrap()
    }

    #[test]
    fn data_url_round_trips_through_decoder() {
        let png = png_with_stroke(true);
        let url = to_data_url(&png, "image/png");
        assert_eq!(decode_data_url(&url).unwrap(), png);
    }

    #[test]
    fn rejects_non_image_data_urls() {
        assert!(decode_data_url("data:text/plain;base64,aGk=").is_err());
        assert!(decode_data_url("not a url").is_err());
        assert!(decode_data_url("data:image/png;base64,@@@").is_err());
    }

    #[test]
    fn transparent_background_becomes_white() {
        let flat = flatten_drawing(&png_with_stroke(true)).unwrap();
        assert!(!flat.blank);
        let decoded = image::load_from_memory(&flat.png).unwrap().to_rgb8();
        assert_eq!(decoded.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(decoded.get_pixel(3, 3).0, [0, 0, 0]);
    }

    #[test]
    fn oversized_drawing_is_refused_before_decoding() {
        let img = RgbaImage::from_pixel(MAX_DECODE_EDGE + 1, 1, Rgba([0, 0, 0, 0]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();

        let err = flatten_drawing(&out.into_inner()).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn empty_canvas_is_blank() {
        assert!(flatten_drawing(&png_with_stroke(false)).unwrap().blank);
    }

    #[test]
    fn sniff_accepts_png_and_rejects_text() {
        let scan = sniff_scan(png_with_stroke(true)).unwrap();
        assert_eq!(scan.extension, "png");
        assert_eq!(scan.content_type, "image/png");
        assert!(sniff_scan(b"hello world".to_vec()).is_err());
    }
}
