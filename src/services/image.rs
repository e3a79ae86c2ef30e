use base64::{engine::general_purpose, Engine};
use thiserror::Error;

/// Inline image data limit accepted by the provider
pub const MAX_IMAGE_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMime {
    Png,
    Jpeg,
    Webp,
}

impl ImageMime {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageMime::Png => "image/png",
            ImageMime::Jpeg => "image/jpeg",
            ImageMime::Webp => "image/webp",
        }
    }

    pub fn from_content_type(content_type: &str) -> Option<Self> {
        // "image/jpeg; charset=binary" still counts
        let essence = content_type.split(';').next().unwrap_or("").trim().to_lowercase();
        match essence.as_str() {
            "image/png" => Some(ImageMime::Png),
            "image/jpeg" => Some(ImageMime::Jpeg),
            "image/webp" => Some(ImageMime::Webp),
            _ => None,
        }
    }

    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let (_, extension) = file_name.rsplit_once('.')?;
        match extension.to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageMime::Jpeg),
            "png" => Some(ImageMime::Png),
            "webp" => Some(ImageMime::Webp),
            _ => None,
        }
    }
}

impl std::fmt::Display for ImageMime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageRejection {
    #[error("Please upload an image first.")]
    Missing,

    #[error("We couldn't read that image. Please try uploading it again.")]
    Unreadable,

    #[error("That image is a bit too large. Please choose one under 4MB.")]
    TooLarge { size: usize },

    #[error("That file format isn't supported. Please use a PNG, JPG, or WEBP image.")]
    UnsupportedFormat,
}

/// Raw upload as received from a client.
#[derive(Debug, Clone, Default)]
pub struct ImageUpload {
    pub data: Vec<u8>,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

impl ImageUpload {
    /// Accepts plain base64 or a `data:<mime>;base64,<payload>` URL.
    pub fn from_base64(
        encoded: &str,
        content_type: Option<String>,
        file_name: Option<String>,
    ) -> Result<Self, ImageRejection> {
        let encoded = encoded.trim();
        if encoded.is_empty() {
            return Err(ImageRejection::Missing);
        }

        let (declared, payload) = match encoded.strip_prefix("data:") {
            Some(rest) => {
                let (header, payload) = rest.split_once(',').ok_or(ImageRejection::Unreadable)?;
                let mime = header.split(';').next().filter(|m| !m.is_empty()).map(str::to_string);
                (mime, payload)
            }
            None => (None, encoded),
        };

        let data = general_purpose::STANDARD
            .decode(payload)
            .map_err(|_| ImageRejection::Unreadable)?;

        // A supported type wins over an unsupported one, wherever it was declared
        let is_supported = |mime: &str| ImageMime::from_content_type(mime).is_some();
        let content_type = match (content_type, declared) {
            (Some(explicit), Some(embedded)) if !is_supported(&explicit) && is_supported(&embedded) => Some(embedded),
            (explicit, embedded) => explicit.or(embedded),
        };

        Ok(Self {
            data,
            content_type,
            file_name,
        })
    }
}

/// An image that passed validation and may be sent to the provider.
#[derive(Debug, Clone)]
pub struct MealImage {
    mime: ImageMime,
    data: Vec<u8>,
}

impl MealImage {
    /// Declared content type first, file extension as fallback.
    pub fn from_upload(upload: ImageUpload) -> Result<Self, ImageRejection> {
        if upload.data.is_empty() {
            return Err(ImageRejection::Missing);
        }
        if upload.data.len() > MAX_IMAGE_BYTES {
            return Err(ImageRejection::TooLarge {
                size: upload.data.len(),
            });
        }

        let mime = upload
            .content_type
            .as_deref()
            .and_then(ImageMime::from_content_type)
            .or_else(|| upload.file_name.as_deref().and_then(ImageMime::from_file_name))
            .ok_or(ImageRejection::UnsupportedFormat)?;

        log::debug!("📊 Image accepted: {} bytes as {}", upload.data.len(), mime);

        Ok(Self {
            mime,
            data: upload.data,
        })
    }

    pub fn mime(&self) -> ImageMime {
        self.mime
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(data: Vec<u8>, content_type: Option<&str>, file_name: Option<&str>) -> ImageUpload {
        ImageUpload {
            data,
            content_type: content_type.map(str::to_string),
            file_name: file_name.map(str::to_string),
        }
    }

    #[test]
    fn test_content_type_takes_priority() {
        let image = MealImage::from_upload(upload(vec![1, 2, 3], Some("image/webp"), Some("meal.png"))).unwrap();
        assert_eq!(image.mime(), ImageMime::Webp);
    }

    #[test]
    fn test_extension_fallback() {
        let image = MealImage::from_upload(upload(vec![1], Some("application/octet-stream"), Some("Lunch.JPG"))).unwrap();
        assert_eq!(image.mime(), ImageMime::Jpeg);

        let image = MealImage::from_upload(upload(vec![1], None, Some("bowl.jpeg"))).unwrap();
        assert_eq!(image.mime().as_str(), "image/jpeg");
    }

    #[test]
    fn test_gif_is_rejected() {
        let result = MealImage::from_upload(upload(vec![0x47, 0x49, 0x46], None, Some("dinner.gif")));
        assert_eq!(result.unwrap_err(), ImageRejection::UnsupportedFormat);

        let result = MealImage::from_upload(upload(vec![1], Some("image/gif"), Some("dinner.gif")));
        assert_eq!(result.unwrap_err(), ImageRejection::UnsupportedFormat);

        let result = MealImage::from_upload(upload(vec![1], None, Some("no_extension")));
        assert_eq!(result.unwrap_err(), ImageRejection::UnsupportedFormat);
    }

    #[test]
    fn test_size_limit() {
        let at_limit = MealImage::from_upload(upload(vec![0; MAX_IMAGE_BYTES], Some("image/png"), None));
        assert!(at_limit.is_ok());

        let over = MealImage::from_upload(upload(vec![0; MAX_IMAGE_BYTES + 1], Some("image/png"), None));
        assert_eq!(over.unwrap_err(), ImageRejection::TooLarge { size: MAX_IMAGE_BYTES + 1 });
    }

    #[test]
    fn test_empty_upload() {
        let result = MealImage::from_upload(upload(Vec::new(), Some("image/png"), None));
        assert_eq!(result.unwrap_err(), ImageRejection::Missing);
    }

    #[test]
    fn test_data_url_upload() {
        let upload = ImageUpload::from_base64("data:image/png;base64,AQID", None, None).unwrap();

        assert_eq!(upload.data, vec![1, 2, 3]);
        assert_eq!(upload.content_type.as_deref(), Some("image/png"));

        let image = MealImage::from_upload(upload).unwrap();
        assert_eq!(image.to_base64(), "AQID");
        assert_eq!(image.len(), 3);
    }

    #[test]
    fn test_data_url_mime_beats_generic_content_type() {
        let upload = ImageUpload::from_base64(
            "data:image/webp;base64,AQID",
            Some("application/octet-stream".to_string()),
            Some("upload".to_string()),
        )
        .unwrap();
        assert_eq!(MealImage::from_upload(upload).unwrap().mime(), ImageMime::Webp);

        // An explicit supported type still wins
        let upload = ImageUpload::from_base64(
            "data:image/webp;base64,AQID",
            Some("image/png".to_string()),
            None,
        )
        .unwrap();
        assert_eq!(upload.content_type.as_deref(), Some("image/png"));
    }

    #[test]
    fn test_invalid_base64() {
        assert_eq!(
            ImageUpload::from_base64("not base64!!", None, None).unwrap_err(),
            ImageRejection::Unreadable
        );
        assert_eq!(ImageUpload::from_base64("  ", None, None).unwrap_err(), ImageRejection::Missing);
    }
}
