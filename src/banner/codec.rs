use std::io::Cursor;

use base64::{engine::general_purpose, Engine as _};
use image::{DynamicImage, ImageFormat};

use crate::llm::media::detect_mime_type;

pub const ANALYSIS_MIME_TYPE: &str = "image/png";

const ACCEPTED_UPLOAD_MIME_TYPES: [&str; 3] = ["image/png", "image/jpeg", "image/webp"];

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("upload is empty")]
    Empty,
    #[error("unsupported image type: {0}")]
    Unsupported(String),
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("failed to encode image as PNG: {0}")]
    Encode(#[source] image::ImageError),
    #[error("invalid base64 image data: {0}")]
    Base64(#[source] base64::DecodeError),
}

/// An uploaded image normalized to PNG, with its pixel dimensions.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    png: Vec<u8>,
    width: u32,
    height: u32,
}

impl EncodedImage {
    pub fn from_upload(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.is_empty() {
            return Err(CodecError::Empty);
        }

        let mime_type = detect_mime_type(bytes).unwrap_or_else(|| "unknown".to_string());
        if !ACCEPTED_UPLOAD_MIME_TYPES.contains(&mime_type.as_str()) {
            return Err(CodecError::Unsupported(mime_type));
        }
        let format = ImageFormat::from_mime_type(&mime_type)
            .ok_or_else(|| CodecError::Unsupported(mime_type.clone()))?;

        let decoded =
            image::load_from_memory_with_format(bytes, format).map_err(CodecError::Decode)?;
        Self::from_image(&decoded)
    }

    pub fn from_image(image: &DynamicImage) -> Result<Self, CodecError> {
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(CodecError::Encode)?;
        Ok(Self {
            png,
            width: image.width(),
            height: image.height(),
        })
    }

    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.png)
    }

    /// Accepts bare base64 or a `data:image/...;base64,` URL. Line breaks are ignored.
    pub fn from_base64(text: &str) -> Result<Self, CodecError> {
        let text = text.trim();
        let data = text
            .split_once(";base64,")
            .map_or(text, |(_, data)| data);
        let compact: String = data.split_whitespace().collect();
        if compact.is_empty() {
            return Err(CodecError::Empty);
        }
        let bytes = general_purpose::STANDARD
            .decode(compact)
            .map_err(CodecError::Base64)?;
        Self::from_upload(&bytes)
    }

    pub fn png_bytes(&self) -> &[u8] {
        &self.png
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> ImageDimensions {
        ImageDimensions {
            width: self.width,
            height: self.height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn sample_bytes(format: ImageFormat) -> Vec<u8> {
        let image = RgbImage::from_fn(12, 5, |x, y| Rgb([(x * 20) as u8, (y * 40) as u8, 90]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut bytes), format)
            .unwrap();
        bytes
    }

    #[test]
    fn normalizes_jpeg_upload_to_png() {
        let encoded = EncodedImage::from_upload(&sample_bytes(ImageFormat::Jpeg)).unwrap();
        assert_eq!(encoded.dimensions(), ImageDimensions { width: 12, height: 5 });
        assert_eq!(
            detect_mime_type(encoded.png_bytes()).as_deref(),
            Some(ANALYSIS_MIME_TYPE)
        );
    }

    #[test]
    fn base64_form_decodes_back_to_the_same_image() {
        let encoded = EncodedImage::from_upload(&sample_bytes(ImageFormat::Png)).unwrap();
        let restored = EncodedImage::from_base64(&encoded.to_base64()).unwrap();
        assert_eq!(restored.dimensions(), encoded.dimensions());
        assert_eq!(restored.png_bytes(), encoded.png_bytes());
    }

    #[test]
    fn base64_accepts_data_urls_and_wrapped_lines() {
        let jpeg = general_purpose::STANDARD.encode(sample_bytes(ImageFormat::Jpeg));
        let data_url = format!("data:image/jpeg;base64,{jpeg}");
        let restored = EncodedImage::from_base64(&data_url).unwrap();
        assert_eq!(restored.dimensions(), ImageDimensions { width: 12, height: 5 });

        let (head, tail) = jpeg.split_at(jpeg.len() / 2);
        let wrapped = format!("{head}\n{tail}\n");
        assert!(EncodedImage::from_base64(&wrapped).is_ok());
    }

    #[test]
    fn base64_rejects_garbage_and_blank_input() {
        assert!(matches!(
            EncodedImage::from_base64("not base64 at all!"),
            Err(CodecError::Base64(_))
        ));
        assert!(matches!(EncodedImage::from_base64("  \n"), Err(CodecError::Empty)));
        let text = general_purpose::STANDARD.encode(b"hello, plain text");
        assert!(matches!(
            EncodedImage::from_base64(&text),
            Err(CodecError::Unsupported(_))
        ));
    }

    #[test]
    fn rejects_empty_and_non_image_uploads() {
        assert!(matches!(EncodedImage::from_upload(&[]), Err(CodecError::Empty)));
        assert!(matches!(
            EncodedImage::from_upload(b"%PDF-1.7 not a banner"),
            Err(CodecError::Unsupported(_))
        ));
    }

    #[test]
    fn truncated_png_fails_to_decode() {
        let bytes = sample_bytes(ImageFormat::Png);
        let truncated = &bytes[..bytes.len() / 2];
        assert!(matches!(
            EncodedImage::from_upload(truncated),
            Err(CodecError::Decode(_))
        ));
    }
}
