//! Image value classification and placement
//!
//! An image placeholder's value can be a URL, an inline base64 payload, the id
//! of a file in an opaque image store, or just a description of the picture.
//! [`plan_image`] decides which, decodes inline payloads on the spot and tells
//! the shell what to fetch for the rest. Failures are values
//! ([`ImageResolution::Failed`]) so a bad image never aborts a slide.

use std::io::Cursor;
use std::sync::LazyLock;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use regex::Regex;
use serde::Serialize;

use crate::deck::Geometry;

pub const DEFAULT_PLACEHOLDER_BASE: &str = "https://via.placeholder.com";
pub const DEFAULT_PLACEHOLDER_WIDTH: u32 = 400;
pub const DEFAULT_PLACEHOLDER_HEIGHT: u32 = 300;
pub const DEFAULT_MIME_TYPE: &str = "image/png";

/// Horizontal gap between a text element and the image placed next to it.
pub const IMAGE_GAP: f64 = 20.0;
pub const MAX_IMAGE_WIDTH: f64 = 300.0;

static STORE_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]{25,}$").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageKind {
    Url,
    Base64,
    StoreReference,
    GeneratedPlaceholder,
}

impl std::fmt::Display for ImageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ImageKind::Url => "url",
            ImageKind::Base64 => "base64",
            ImageKind::StoreReference => "store-reference",
            ImageKind::GeneratedPlaceholder => "generated-placeholder",
        };
        f.write_str(label)
    }
}

/// Classify a non-empty image value by its shape.
pub fn classify_image_value(value: &str) -> ImageKind {
    if value.starts_with("http://") || value.starts_with("https://") {
        ImageKind::Url
    } else if value.starts_with("data:image/") || value.starts_with("base64,") {
        ImageKind::Base64
    } else if STORE_REFERENCE.is_match(value) {
        ImageKind::StoreReference
    } else {
        ImageKind::GeneratedPlaceholder
    }
}

/// Decoded image bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub data: Vec<u8>,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageResolution {
    Resolved {
        kind: ImageKind,
        payload: ImagePayload,
    },
    Failed {
        kind: Option<ImageKind>,
        message: String,
    },
}

impl ImageResolution {
    pub fn failed(kind: Option<ImageKind>, message: impl Into<String>) -> Self {
        ImageResolution::Failed {
            kind,
            message: message.into(),
        }
    }
}

/// What the shell has to do to finish resolving an image value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePlan {
    /// Already settled: empty values and inline payloads.
    Done(ImageResolution),
    /// HTTP GET `url`; `kind` is reported on the resulting resolution.
    Fetch { kind: ImageKind, url: String },
    /// Look `id` up in the image store.
    Lookup { id: String },
}

/// Size requested for generated placeholder images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ImageSize {
    fn default() -> Self {
        Self {
            width: DEFAULT_PLACEHOLDER_WIDTH,
            height: DEFAULT_PLACEHOLDER_HEIGHT,
        }
    }
}

impl ImageSize {
    /// Size of the element hosting the placeholder, or the defaults when the
    /// element has no usable size.
    pub fn from_geometry(geometry: &Geometry) -> Self {
        let default = Self::default();
        let width = geometry.width.round();
        let height = geometry.height.round();
        Self {
            width: if width >= 1.0 { width as u32 } else { default.width },
            height: if height >= 1.0 { height as u32 } else { default.height },
        }
    }
}

/// Decide how to resolve an image value.
pub fn plan_image(value: &str, size: ImageSize, placeholder_base: &str) -> ImagePlan {
    if value.is_empty() {
        return ImagePlan::Done(ImageResolution::failed(None, "No image data provided"));
    }

    match classify_image_value(value) {
        ImageKind::Url => ImagePlan::Fetch {
            kind: ImageKind::Url,
            url: value.to_string(),
        },
        ImageKind::Base64 => ImagePlan::Done(match decode_data_url(value) {
            Ok(payload) => ImageResolution::Resolved {
                kind: ImageKind::Base64,
                payload,
            },
            Err(e) => ImageResolution::failed(
                Some(ImageKind::Base64),
                format!("Error processing base64 image: {}", e),
            ),
        }),
        ImageKind::StoreReference => ImagePlan::Lookup {
            id: value.to_string(),
        },
        ImageKind::GeneratedPlaceholder => ImagePlan::Fetch {
            kind: ImageKind::GeneratedPlaceholder,
            url: placeholder_image_url(placeholder_base, value, size),
        },
    }
}

/// Decode a `data:<mime>;base64,<data>` URL or a bare `base64,<data>` value.
pub fn decode_data_url(value: &str) -> Result<ImagePayload, base64::DecodeError> {
    let encoded = match value.split_once("base64,") {
        Some((_, rest)) => rest,
        None => value,
    };

    let mime_type = value
        .strip_prefix("data:")
        .filter(|rest| rest.starts_with("image/"))
        .and_then(|rest| rest.split(';').next())
        .unwrap_or(DEFAULT_MIME_TYPE)
        .to_string();

    let data = STANDARD.decode(encoded.trim())?;
    Ok(ImagePayload { data, mime_type })
}

/// URL of a generated placeholder image showing `description`.
pub fn placeholder_image_url(base: &str, description: &str, size: ImageSize) -> String {
    format!(
        "{}/{}x{}?text={}",
        base.trim_end_matches('/'),
        size.width,
        size.height,
        urlencoding::encode(description)
    )
}

/// Turn an HTTP response into a resolution.
pub fn fetched_resolution(
    kind: ImageKind,
    status: u16,
    mime_type: Option<&str>,
    data: Vec<u8>,
) -> ImageResolution {
    if status != 200 {
        return ImageResolution::failed(
            Some(kind),
            format!("Failed to fetch image: HTTP {}", status),
        );
    }
    let mime_type = mime_type
        .map(|m| m.split(';').next().unwrap_or(m).trim().to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());
    ImageResolution::Resolved {
        kind,
        payload: ImagePayload { data, mime_type },
    }
}

/// Turn an image-store hit into a resolution; non-image files are rejected.
pub fn stored_resolution(mime_type: &str, data: Vec<u8>) -> ImageResolution {
    if !mime_type.starts_with("image/") {
        return ImageResolution::failed(Some(ImageKind::StoreReference), "File is not an image");
    }
    ImageResolution::Resolved {
        kind: ImageKind::StoreReference,
        payload: ImagePayload {
            data,
            mime_type: mime_type.to_string(),
        },
    }
}

/// Pixel dimensions of an encoded image, when the format is recognised.
pub fn image_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// Geometry for an image placed to the right of `anchor`.
///
/// The image is capped at the anchor's height and [`MAX_IMAGE_WIDTH`],
/// keeping the aspect ratio when the natural size is known.
pub fn place_image(anchor: &Geometry, natural: Option<(u32, u32)>) -> Geometry {
    let max_height = if anchor.height > 0.0 {
        anchor.height
    } else {
        DEFAULT_PLACEHOLDER_HEIGHT as f64
    };

    let (mut width, mut height) = match natural {
        Some((w, h)) if w > 0 && h > 0 => (w as f64, h as f64),
        _ => (max_height.min(MAX_IMAGE_WIDTH), max_height),
    };
    let aspect = width / height;

    if height > max_height {
        height = max_height;
        width = max_height * aspect;
    }
    if width > MAX_IMAGE_WIDTH {
        width = MAX_IMAGE_WIDTH;
        height = MAX_IMAGE_WIDTH / aspect;
    }

    Geometry {
        left: anchor.left + anchor.width + IMAGE_GAP,
        top: anchor.top,
        width,
        height,
    }
}

/// Marker left in the text while an image is pending.
pub fn image_marker(field_name: &str) -> String {
    format!("[IMAGE:{}]", field_name)
}

/// Marker that replaces an image that could not be resolved.
pub fn image_error_marker(message: &str) -> String {
    format!("[Image Error: {}]", message)
}
