mod error;
mod traits;

pub mod filesystem;
pub mod memory;
pub mod s3;

pub use error::StorageError;
pub use traits::{BucketStore, ObjectPage, StoredObject, WriteMode, list_all};
