use std::sync::Arc;

use axum::Json;
use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use tracing::instrument;

use common::media::{
    SizeClass, SizePolicy, UploadOptions, Uploader, generate_variants, new_canonical_path,
    object_name, remove_variants, validate_upload,
};
use common::storage::WriteMode;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::models::media::{MediaDeleteResponse, MediaUploadResponse, VariantResponse};
use crate::state::AppState;
use crate::utils::url::strip_public_prefix;

pub fn media_upload_body_limit() -> DefaultBodyLimit {
    DefaultBodyLimit::max(32 * 1024 * 1024) // 32 MB
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct DeleteParams {
    /// Object name or public URL; every variant sharing its base is removed.
    pub path: String,
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Media",
    operation_id = "uploadMedia",
    summary = "Upload a product image",
    description = "Accepts one image in the `file` multipart field, derives the full \
        set of WebP variants and stores them. The returned `url` is the canonical \
        size-less form the catalog persists; the upload only succeeds when every \
        variant was stored.",
    request_body(content_type = "multipart/form-data", description = "Image upload"),
    responses(
        (status = 201, description = "All variants stored", body = MediaUploadResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 502, description = "Variant set incomplete, rolled back (UPLOAD_INCOMPLETE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, multipart))]
pub async fn upload_media(
    auth_user: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("media:upload")?;

    let mut payload: Option<(Vec<u8>, String)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        if field.name() == Some("file") {
            let content_type = field
                .content_type()
                .ok_or_else(|| AppError::Validation("File field must have a content type".into()))?
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Upload read error: {e}")))?;
            payload = Some((bytes.to_vec(), content_type));
        }
        // Ignore unknown fields.
    }

    let (bytes, content_type) =
        payload.ok_or_else(|| AppError::Validation("Missing 'file' field".into()))?;

    validate_upload(
        &content_type,
        bytes.len() as u64,
        state.config.storage.max_upload_bytes,
    )?;

    let variants = generate_variants(bytes, SizePolicy::default(), SizeClass::ALL.to_vec()).await?;

    let canonical = new_canonical_path();
    let uploader = Uploader::new(
        Arc::clone(&state.store),
        UploadOptions::from(&state.config.upload),
    );
    let outcome = uploader
        .upload_variants(&canonical, &variants, WriteMode::Create)
        .await?;

    let responses = variants
        .iter()
        .map(|variant| {
            VariantResponse::from_variant(variant, object_name(&outcome.canonical, variant.class))
        })
        .collect();

    Ok((
        StatusCode::CREATED,
        Json(MediaUploadResponse {
            url: state.store.public_url(&outcome.canonical),
            path: outcome.canonical,
            variants: responses,
        }),
    ))
}

#[utoipa::path(
    delete,
    path = "/",
    tag = "Media",
    operation_id = "deleteMedia",
    summary = "Delete every variant of an image",
    description = "Computes the base name of `path` and removes all objects under \
        `{base}-`. Matching is on the exact base plus dash, so `shoe-42` can never \
        remove `shoe-420-*`.",
    params(DeleteParams),
    responses(
        (status = 200, description = "Variants removed", body = MediaDeleteResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user))]
pub async fn delete_media(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<DeleteParams>,
) -> Result<Json<MediaDeleteResponse>, AppError> {
    auth_user.require_permission("media:delete")?;

    let cfg = &state.config.storage;
    let name = strip_public_prefix(&params.path, &cfg.public_base_url, cfg.folder.as_deref())
        .ok_or_else(|| AppError::Validation("Path does not belong to this store".into()))?;

    let removed = remove_variants(&*state.store, name).await?;
    let total = removed.len() as u64;

    Ok(Json(MediaDeleteResponse { removed, total }))
}
