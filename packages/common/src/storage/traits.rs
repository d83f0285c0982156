use async_trait::async_trait;

use super::error::StorageError;

/// How a put treats an existing object under the same name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteMode {
    /// Fail with [`StorageError::AlreadyExists`] if the object exists.
    /// Normal ingestion always uses this.
    Create,
    /// Replace whatever is there. Reserved for explicit repair operations.
    Overwrite,
}

/// An object physically present in the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub name: String,
    pub size: u64,
}

/// One page of a listing. `next` is the continuation token for the following
/// page, when the store reports more data.
#[derive(Clone, Debug, Default)]
pub struct ObjectPage {
    pub objects: Vec<StoredObject>,
    pub next: Option<String>,
}

/// Flat-namespace object storage, optionally folder-prefixed.
///
/// Object names are plain strings within the bucket; `public_url` turns a
/// name into the externally served form.
#[async_trait]
pub trait BucketStore: Send + Sync {
    /// Store bytes under `name`.
    async fn put(
        &self,
        name: &str,
        bytes: &[u8],
        content_type: &str,
        mode: WriteMode,
    ) -> Result<(), StorageError>;

    /// Retrieve all bytes of an object.
    async fn get(&self, name: &str) -> Result<Vec<u8>, StorageError>;

    /// Check whether an object exists.
    async fn exists(&self, name: &str) -> Result<bool, StorageError>;

    /// Delete an object. Returns `true` if it existed.
    async fn delete(&self, name: &str) -> Result<bool, StorageError>;

    /// Delete a batch of objects, returning the names that were removed.
    ///
    /// `Err` means the batch mechanism itself failed; callers fall back to
    /// per-object [`BucketStore::delete`] so one bad object cannot block the
    /// rest of its batch.
    async fn delete_many(&self, names: &[String]) -> Result<Vec<String>, StorageError> {
        let mut removed = Vec::with_capacity(names.len());
        for name in names {
            if self.delete(name).await? {
                removed.push(name.clone());
            }
        }
        Ok(removed)
    }

    /// List one page of objects under `prefix`.
    async fn list_page(
        &self,
        prefix: &str,
        token: Option<String>,
        page_size: usize,
    ) -> Result<ObjectPage, StorageError>;

    /// Publicly served URL for an object name.
    fn public_url(&self, name: &str) -> String;
}

/// Enumerate every object under `prefix`, following pagination until a short
/// page. A full page does not guarantee more data (the store may keep
/// handing out tokens), but any short page terminates the loop.
pub async fn list_all(
    store: &dyn BucketStore,
    prefix: &str,
    page_size: usize,
) -> Result<Vec<StoredObject>, StorageError> {
    let mut objects = Vec::new();
    let mut token = None;

    loop {
        let page = store.list_page(prefix, token, page_size).await?;
        let short = page.objects.len() < page_size;
        objects.extend(page.objects);

        match page.next {
            Some(next) if !short => token = Some(next),
            _ => break,
        }
    }

    Ok(objects)
}
