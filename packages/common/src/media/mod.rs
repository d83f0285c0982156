mod codec;
mod error;
mod generator;
mod policy;
mod upload;

pub use codec::{base_path, has_size_suffix, new_canonical_path, object_name};
pub use error::PipelineError;
pub use generator::{Variant, generate_variants, generate_variants_sync, validate_upload};
pub use policy::{ClassTarget, SizeClass, SizePolicy};
pub use upload::{UploadOptions, UploadOutcome, Uploader, remove_variants};
