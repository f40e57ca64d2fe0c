use super::{Normalizer, PreprocessingError};
use base64::{engine::general_purpose::STANDARD, Engine};
use cdss_common::payload::CanonicalPayload;
use cdss_common::schema::{normalize_channel, IMAGE_SIDE};
use image::imageops::FilterType;

/// Decodes a base64 image into a `[1, 3, 224, 224]` normalized tensor
pub struct ImageNormalizer;

impl Normalizer for ImageNormalizer {
    fn name(&self) -> &'static str {
        "image"
    }

    fn tags(&self) -> &'static [&'static str] {
        &["img_rx", "img_skin"]
    }

    fn normalize(&self, tag: &str, raw: &str) -> Result<CanonicalPayload, PreprocessingError> {
        let bytes = decode_base64(raw).map_err(|reason| PreprocessingError::malformed(tag, reason))?;

        let decoded = image::load_from_memory(&bytes)
            .map_err(|e| PreprocessingError::malformed(tag, format!("cannot decode image: {}", e)))?;

        let rgb = decoded.to_rgb8();
        let resized = image::imageops::resize(&rgb, IMAGE_SIDE, IMAGE_SIDE, FilterType::CatmullRom);

        let side = IMAGE_SIDE as usize;
        let plane = side * side;
        let mut values = vec![0f32; 3 * plane];

        // HWC pixels into CHW planes
        for (x, y, pixel) in resized.enumerate_pixels() {
            let offset = y as usize * side + x as usize;
            for c in 0..3 {
                values[c * plane + offset] = normalize_channel(c, pixel.0[c] as f32 / 255.0);
            }
        }

        Ok(CanonicalPayload::Tensor {
            shape: vec![1, 3, side, side],
            values,
        })
    }
}

/// Base64 body, optionally behind a `data:<mime>;base64,` prefix
fn decode_base64(raw: &str) -> Result<Vec<u8>, String> {
    let trimmed = raw.trim();
    let body = match trimmed.strip_prefix("data:") {
        Some(rest) => match rest.split_once(',') {
            Some((_, body)) => body,
            None => return Err("data URL has no payload".to_string()),
        },
        None => trimmed,
    };

    let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err("image payload is empty".to_string());
    }

    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| format!("invalid base64: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdss_common::schema::{IMAGE_MEAN, IMAGE_STD};
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png_base64(width: u32, height: u32, color: [u8; 3]) -> String {
        let img = RgbImage::from_pixel(width, height, Rgb(color));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        STANDARD.encode(buf)
    }

    #[test]
    fn test_shape_and_channel_normalization() {
        let raw = png_base64(40, 30, [255, 0, 0]);
        let payload = ImageNormalizer.normalize("img_rx", &raw).unwrap();

        let CanonicalPayload::Tensor { shape, values } = payload else {
            panic!("expected tensor");
        };
        assert_eq!(shape, vec![1, 3, 224, 224]);
        assert_eq!(values.len(), 3 * 224 * 224);

        let plane = 224 * 224;
        let red = (1.0 - IMAGE_MEAN[0]) / IMAGE_STD[0];
        let green = (0.0 - IMAGE_MEAN[1]) / IMAGE_STD[1];
        assert!((values[0] - red).abs() < 1e-4);
        assert!((values[plane + 100] - green).abs() < 1e-4);
    }

    #[test]
    fn test_data_url_prefix_accepted() {
        let raw = format!("data:image/png;base64,{}", png_base64(8, 8, [10, 20, 30]));
        assert!(ImageNormalizer.normalize("img_skin", &raw).is_ok());
    }

    #[test]
    fn test_bad_input_is_preprocessing_error() {
        let not_base64 = ImageNormalizer.normalize("img_rx", "%%%").unwrap_err();
        assert!(matches!(not_base64, PreprocessingError::Malformed { .. }));

        let not_image = ImageNormalizer
            .normalize("img_rx", &STANDARD.encode(b"plain text, not pixels"))
            .unwrap_err();
        assert!(matches!(not_image, PreprocessingError::Malformed { .. }));

        assert!(ImageNormalizer.normalize("img_rx", "   ").is_err());
    }
}
