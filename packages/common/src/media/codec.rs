//! Canonical path codec.
//!
//! A canonical path is the size-less, extension-less identifier for one
//! logical image (e.g. `1700000000000-ab12cd`). It is the only form the
//! catalog ever stores. A variant object name is
//! `{canonical}-{class}.webp`. Both directions are pure string work and
//! never touch the network, so they are safe from the ingestion path and
//! from any consumer that only has a URL.

use rand::Rng;
use rand::distr::Alphanumeric;

use super::policy::SizeClass;

/// All derived variants are encoded to a single fixed format so the suffix
/// grammar stays unambiguous.
pub const VARIANT_EXT: &str = "webp";

/// Concrete object name for one variant of a canonical path.
///
/// Any extension or size suffix already present on the input is stripped
/// first, so feeding an existing variant name back in is harmless.
pub fn object_name(canonical: &str, class: SizeClass) -> String {
    format!(
        "{}-{}.{}",
        strip_size_suffixes(strip_extension(canonical)),
        class.suffix(),
        VARIANT_EXT
    )
}

/// Canonical path of an object name or URL path segment.
///
/// Strips the extension, then any trailing `-{class}` suffixes. Applying it
/// twice is a no-op.
pub fn base_path(name_or_url: &str) -> String {
    strip_size_suffixes(strip_extension(name_or_url)).to_string()
}

/// Whether a name already carries a recognized size suffix. The reprocessing
/// driver skips such names without touching them.
pub fn has_size_suffix(name: &str) -> bool {
    let stem = strip_extension(name);
    SizeClass::ALL
        .iter()
        .any(|class| stem.ends_with(&format!("-{}", class.suffix())))
}

/// Fresh canonical path for a new upload: unix millis plus a short random
/// alphanumeric tail. Collisions are astronomically unlikely, and a collision
/// fails loudly at the create-without-overwrite put rather than corrupting
/// the earlier upload.
pub fn new_canonical_path() -> String {
    let tail: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect();
    format!("{}-{}", chrono::Utc::now().timestamp_millis(), tail)
}

fn strip_extension(input: &str) -> &str {
    // Only the filename segment can carry an extension.
    let filename_start = input.rfind('/').map(|i| i + 1).unwrap_or(0);
    match input[filename_start..].rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => &input[..filename_start + stem.len()],
        _ => input,
    }
}

fn strip_size_suffixes(mut input: &str) -> &str {
    'outer: loop {
        for class in SizeClass::ALL {
            if let Some(stem) = input.strip_suffix(&format!("-{}", class.suffix()))
                && !stem.is_empty()
            {
                input = stem;
                continue 'outer;
            }
        }
        return input;
    }
}
