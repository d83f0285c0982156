use serde::Serialize;

use common::media::Variant;

/// One stored variant, as reported back to the uploader.
#[derive(Serialize, utoipa::ToSchema)]
pub struct VariantResponse {
    /// Size class suffix (`thumb`, `small`, `medium`, `large`, `original`).
    #[schema(example = "thumb")]
    pub class: String,
    /// Stored object name.
    #[schema(example = "1700000000000-ab12cd-thumb.webp")]
    pub object_name: String,
    #[schema(example = 112)]
    pub width: u32,
    #[schema(example = 149)]
    pub height: u32,
    /// Encoded size in bytes.
    #[schema(example = 4096)]
    pub size: u64,
}

/// Response DTO for a successful upload.
#[derive(Serialize, utoipa::ToSchema)]
pub struct MediaUploadResponse {
    /// Public URL in canonical (size-less) form. This is what the catalog
    /// stores.
    #[schema(example = "https://cdn.example.com/storage/produtos/1700000000000-ab12cd")]
    pub url: String,
    /// Canonical path.
    #[schema(example = "1700000000000-ab12cd")]
    pub path: String,
    pub variants: Vec<VariantResponse>,
}

/// Response DTO for a per-image delete.
#[derive(Serialize, utoipa::ToSchema)]
pub struct MediaDeleteResponse {
    /// Object names that were removed.
    pub removed: Vec<String>,
    pub total: u64,
}

impl VariantResponse {
    pub fn from_variant(variant: &Variant, object_name: String) -> Self {
        Self {
            class: variant.class.suffix().to_string(),
            object_name,
            width: variant.width,
            height: variant.height,
            size: variant.bytes.len() as u64,
        }
    }
}
