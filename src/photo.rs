//! Uploaded photos: validation on the way in, and the payload handed to the generator.

use std::fmt;
use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose;
use image::ImageFormat;
use tracing::debug;

use crate::constants::ALLOWED_MIME_TYPES;

/// Why an upload was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// Nothing was uploaded
    Empty,
    /// The bytes are not a JPEG, PNG or WebP image
    UnsupportedType,
    /// The upload is over the size limit
    TooLarge {
        /// The configured limit
        max_bytes: usize,
    },
    /// The bytes claim a supported format but do not decode
    Unreadable,
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "No image was uploaded."),
            Self::UnsupportedType => write!(f, "Solo JPG, PNG o WebP."),
            Self::TooLarge { max_bytes } => {
                write!(f, "Max {}MB.", max_bytes / (1024 * 1024))
            }
            Self::Unreadable => write!(f, "The image could not be read."),
        }
    }
}

impl std::error::Error for UploadError {}

/// Image bytes plus their mime type, as sent to the generator.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ImagePayload {
    /// eg `image/jpeg`
    pub mime_type: String,
    /// Raw image bytes
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    /// Base64 (standard alphabet, padded) for JSON transports.
    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.bytes)
    }
}

/// A validated photo uploaded by the user.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SourceImage {
    file_name: String,
    mime_type: &'static str,
    bytes: Vec<u8>,
}

impl SourceImage {
    /// Validates an upload. The mime type comes from the content, not from the client.
    pub fn from_upload(
        bytes: Vec<u8>,
        file_name: &str,
        max_bytes: usize,
    ) -> Result<Self, UploadError> {
        if bytes.is_empty() {
            return Err(UploadError::Empty);
        }
        if bytes.len() > max_bytes {
            debug!("Upload of {} bytes is over the {} byte limit", bytes.len(), max_bytes);
            return Err(UploadError::TooLarge { max_bytes });
        }

        let reader = image::ImageReader::new(Cursor::new(bytes.as_slice()))
            .with_guessed_format()
            .map_err(|err| {
                debug!("Failed to guess image format: {}", err);
                UploadError::UnsupportedType
            })?;
        let mime_type = match reader.format() {
            Some(ImageFormat::Jpeg) => "image/jpeg",
            Some(ImageFormat::Png) => "image/png",
            Some(ImageFormat::WebP) => "image/webp",
            other => {
                debug!("Rejected upload with format {:?}", other);
                return Err(UploadError::UnsupportedType);
            }
        };
        debug_assert!(ALLOWED_MIME_TYPES.contains(&mime_type));
        reader.decode().map_err(|err| {
            debug!("Failed to decode image: {}", err);
            UploadError::Unreadable
        })?;

        let file_name = file_name.trim();
        let file_name = if file_name.is_empty() {
            "photo".to_string()
        } else {
            file_name.to_string()
        };

        Ok(Self {
            file_name,
            mime_type,
            bytes,
        })
    }

    /// Name the browser sent with the upload.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Sniffed mime type.
    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    /// Raw bytes as uploaded.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Copies the image into a transport payload.
    pub fn to_payload(&self) -> ImagePayload {
        ImagePayload {
            mime_type: self.mime_type.to_string(),
            bytes: self.bytes.clone(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Encodes a tiny image in the given format.
    pub(crate) fn sample_image(format: ImageFormat) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(4, 3, image::Rgb([200, 30, 40]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, format)
            .expect("encode sample image");
        out.into_inner()
    }

    #[test]
    fn accepts_png_and_jpeg_by_content() {
        let png = SourceImage::from_upload(sample_image(ImageFormat::Png), "family.jpg", 1024 * 1024)
            .expect("png accepted");
        assert_eq!(png.mime_type(), "image/png");
        assert_eq!(png.file_name(), "family.jpg");

        let jpeg = SourceImage::from_upload(sample_image(ImageFormat::Jpeg), "", 1024 * 1024)
            .expect("jpeg accepted");
        assert_eq!(jpeg.mime_type(), "image/jpeg");
        assert_eq!(jpeg.file_name(), "photo");
    }

    #[test]
    fn rejects_bad_uploads() {
        assert_eq!(
            SourceImage::from_upload(Vec::new(), "x.png", 10),
            Err(UploadError::Empty)
        );
        assert_eq!(
            SourceImage::from_upload(sample_image(ImageFormat::Png), "x.png", 10),
            Err(UploadError::TooLarge { max_bytes: 10 })
        );
        assert_eq!(
            SourceImage::from_upload(b"This is not an image.".to_vec(), "x.png", 1024),
            Err(UploadError::UnsupportedType)
        );
        assert_eq!(
            SourceImage::from_upload(vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0], "x.png", 1024),
            Err(UploadError::Unreadable)
        );
    }

    #[test]
    fn payload_keeps_bytes_and_mime() {
        let bytes = sample_image(ImageFormat::Png);
        let image = SourceImage::from_upload(bytes.clone(), "a.png", 1024 * 1024).expect("png");
        let payload = image.to_payload();
        assert_eq!(payload.mime_type, "image/png");
        assert_eq!(payload.bytes, bytes);
        let decoded = general_purpose::STANDARD
            .decode(payload.to_base64())
            .expect("valid base64");
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn too_large_message_names_the_limit() {
        let err = UploadError::TooLarge {
            max_bytes: 4 * 1024 * 1024,
        };
        assert_eq!(err.to_string(), "Max 4MB.");
    }
}
