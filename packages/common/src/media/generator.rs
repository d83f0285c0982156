use std::io::Cursor;

use image::metadata::Orientation;
use image::{DynamicImage, ImageReader, imageops::FilterType};

use super::error::PipelineError;
use super::policy::{SizeClass, SizePolicy};

/// Mime types accepted for ingestion. Everything else is rejected before any
/// decoding happens.
const ACCEPTED_MIMES: [&str; 4] = ["image/jpeg", "image/png", "image/webp", "image/gif"];

/// One derived, size-class-specific re-encoding of an original image.
#[derive(Clone, Debug)]
pub struct Variant {
    pub class: SizeClass,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Reject non-image mimes and oversize payloads before any pixel work.
pub fn validate_upload(
    content_type: &str,
    len: u64,
    max_bytes: u64,
) -> Result<(), PipelineError> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if !ACCEPTED_MIMES.contains(&mime.as_str()) {
        return Err(PipelineError::Validation(format!(
            "unsupported content type '{content_type}'"
        )));
    }
    if len > max_bytes {
        return Err(PipelineError::Validation(format!(
            "payload of {len} bytes exceeds the {max_bytes} byte limit"
        )));
    }
    Ok(())
}

/// Generate one variant per requested size class.
///
/// Decoding and re-encoding are CPU-bound, so the work runs off the async
/// pool.
pub async fn generate_variants(
    bytes: Vec<u8>,
    policy: SizePolicy,
    classes: Vec<SizeClass>,
) -> Result<Vec<Variant>, PipelineError> {
    tokio::task::spawn_blocking(move || generate_variants_sync(&bytes, &policy, &classes))
        .await
        .map_err(|e| PipelineError::Generation(format!("generation task panicked: {e}")))?
}

/// Synchronous variant generation.
///
/// Dimensions are always read from the bytes themselves; if they cannot be
/// determined the call fails instead of assuming a default, which would
/// silently break the no-upscale rule for small images.
pub fn generate_variants_sync(
    bytes: &[u8],
    policy: &SizePolicy,
    classes: &[SizeClass],
) -> Result<Vec<Variant>, PipelineError> {
    let image = decode_oriented(bytes)?;
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(PipelineError::Generation(
            "image reports zero dimensions".into(),
        ));
    }

    let mut variants = Vec::with_capacity(classes.len());
    for &class in classes {
        let variant = match policy.target_width(class) {
            None => encode(&image, class, policy.quality(class))?,
            Some(policy_width) => {
                let (target_w, target_h) = fit_within(width, height, policy_width);
                if target_w == width {
                    // Never upscale; re-encode at native size.
                    encode(&image, class, policy.quality(class))?
                } else {
                    let resized = image.resize_exact(target_w, target_h, FilterType::Lanczos3);
                    encode(&resized, class, policy.quality(class))?
                }
            }
        };
        variants.push(variant);
    }

    Ok(variants)
}

/// Decode and apply any EXIF orientation so the pixel dimensions match what
/// a viewer sees.
fn decode_oriented(bytes: &[u8]) -> Result<DynamicImage, PipelineError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| PipelineError::Generation(format!("unreadable image data: {e}")))?;

    let mut decoder = reader
        .into_decoder()
        .map_err(|e| PipelineError::Generation(format!("undecodable image: {e}")))?;
    let orientation = image::ImageDecoder::orientation(&mut decoder)
        .unwrap_or(Orientation::NoTransforms);

    let mut image = DynamicImage::from_decoder(decoder)
        .map_err(|e| PipelineError::Generation(format!("undecodable image: {e}")))?;
    image.apply_orientation(orientation);
    Ok(image)
}

/// Scaled dimensions that fit inside `policy_width` without enlargement.
fn fit_within(width: u32, height: u32, policy_width: u32) -> (u32, u32) {
    let target_w = policy_width.min(width);
    let target_h = ((height as f64 * target_w as f64 / width as f64).round() as u32).max(1);
    (target_w, target_h)
}

fn encode(image: &DynamicImage, class: SizeClass, quality: u8) -> Result<Variant, PipelineError> {
    // The lossy encoder wants RGB8/RGBA8 input.
    let rgba = DynamicImage::ImageRgba8(image.to_rgba8());
    let encoded = webp::Encoder::from_image(&rgba)
        .map_err(|e| PipelineError::Generation(format!("webp encode failed: {e}")))?
        .encode(quality as f32);

    Ok(Variant {
        class,
        bytes: encoded.to_vec(),
        width: image.width(),
        height: image.height(),
    })
}
