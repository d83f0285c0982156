use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::config::StorageConfig;

use super::error::StorageError;
use super::traits::{BucketStore, ObjectPage, StoredObject, WriteMode};

/// Directory-backed object store for development and tests.
///
/// Object names map to paths under the root; names may contain `/` segments,
/// so the namespace is not assumed flat. Listing walks the tree and returns
/// lexicographically ordered names, paginated with the last returned name as
/// the continuation token.
pub struct FsStore {
    root: PathBuf,
    public_base_url: String,
}

impl FsStore {
    pub async fn new(root: PathBuf, public_base_url: &str) -> Result<Self, StorageError> {
        fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn from_config(cfg: &StorageConfig) -> Result<Self, StorageError> {
        let root = match &cfg.folder {
            Some(folder) => cfg.root.join(&cfg.bucket).join(folder),
            None => cfg.root.join(&cfg.bucket),
        };
        Self::new(root, &cfg.public_base_url).await
    }

    fn object_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Collect every object name/size under `dir`, recursing into
    /// subdirectories.
    async fn walk(&self, dir: &Path, out: &mut Vec<StoredObject>) -> Result<(), StorageError> {
        let mut stack = vec![dir.to_path_buf()];

        while let Some(current) = stack.pop() {
            let mut entries = match fs::read_dir(&current).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            while let Some(entry) = entries.next_entry().await? {
                let meta = entry.metadata().await?;
                if meta.is_dir() {
                    stack.push(entry.path());
                } else {
                    let name = entry
                        .path()
                        .strip_prefix(&self.root)
                        .map_err(|e| StorageError::Backend(e.to_string()))?
                        .to_string_lossy()
                        .replace('\\', "/");
                    out.push(StoredObject {
                        name,
                        size: meta.len(),
                    });
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl BucketStore for FsStore {
    async fn put(
        &self,
        name: &str,
        bytes: &[u8],
        _content_type: &str,
        mode: WriteMode,
    ) -> Result<(), StorageError> {
        let path = self.object_path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        match mode {
            WriteMode::Create => {
                let mut options = fs::OpenOptions::new();
                options.write(true).create_new(true);
                match options.open(&path).await {
                    Ok(mut file) => {
                        use tokio::io::AsyncWriteExt;
                        file.write_all(bytes).await?;
                        file.flush().await?;
                        Ok(())
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                        Err(StorageError::AlreadyExists(name.to_string()))
                    }
                    Err(e) => Err(e.into()),
                }
            }
            WriteMode::Overwrite => {
                fs::write(&path, bytes).await?;
                Ok(())
            }
        }
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        match fs::read(self.object_path(name)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        Ok(fs::try_exists(self.object_path(name)).await?)
    }

    async fn delete(&self, name: &str) -> Result<bool, StorageError> {
        match fs::remove_file(self.object_path(name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_page(
        &self,
        prefix: &str,
        token: Option<String>,
        page_size: usize,
    ) -> Result<ObjectPage, StorageError> {
        let mut all = Vec::new();
        let root = self.root.clone();
        self.walk(&root, &mut all).await?;

        all.retain(|obj| obj.name.starts_with(prefix));
        all.sort_by(|a, b| a.name.cmp(&b.name));

        let start = match &token {
            Some(after) => all.partition_point(|obj| obj.name.as_str() <= after.as_str()),
            None => 0,
        };

        let objects: Vec<StoredObject> = all.into_iter().skip(start).take(page_size).collect();
        let next = objects.last().map(|obj| obj.name.clone());

        Ok(ObjectPage { objects, next })
    }

    fn public_url(&self, name: &str) -> String {
        format!("{}/{name}", self.public_base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::list_all;

    async fn temp_store() -> (FsStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path().join("produtos"), "http://localhost/storage")
            .await
            .unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn put_get_round_trip() {
        let (store, _dir) = temp_store().await;
        store
            .put("a-thumb.webp", b"bytes", "image/webp", WriteMode::Create)
            .await
            .unwrap();
        assert_eq!(store.get("a-thumb.webp").await.unwrap(), b"bytes");
    }

    #[tokio::test]
    async fn create_mode_rejects_existing() {
        let (store, _dir) = temp_store().await;
        store
            .put("a.webp", b"one", "image/webp", WriteMode::Create)
            .await
            .unwrap();
        let result = store
            .put("a.webp", b"two", "image/webp", WriteMode::Create)
            .await;
        assert!(matches!(result, Err(StorageError::AlreadyExists(_))));
        // First write is untouched.
        assert_eq!(store.get("a.webp").await.unwrap(), b"one");
    }

    #[tokio::test]
    async fn overwrite_mode_replaces() {
        let (store, _dir) = temp_store().await;
        store
            .put("a.webp", b"one", "image/webp", WriteMode::Create)
            .await
            .unwrap();
        store
            .put("a.webp", b"two", "image/webp", WriteMode::Overwrite)
            .await
            .unwrap();
        assert_eq!(store.get("a.webp").await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let (store, _dir) = temp_store().await;
        store
            .put("a.webp", b"x", "image/webp", WriteMode::Create)
            .await
            .unwrap();
        assert!(store.delete("a.webp").await.unwrap());
        assert!(!store.delete("a.webp").await.unwrap());
    }

    #[tokio::test]
    async fn get_not_found() {
        let (store, _dir) = temp_store().await;
        assert!(matches!(
            store.get("missing.webp").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn listing_paginates_and_respects_prefix() {
        let (store, _dir) = temp_store().await;
        for i in 0..7 {
            store
                .put(
                    &format!("item-{i}.webp"),
                    b"x",
                    "image/webp",
                    WriteMode::Create,
                )
                .await
                .unwrap();
        }
        store
            .put("other.webp", b"x", "image/webp", WriteMode::Create)
            .await
            .unwrap();

        let page = store.list_page("item-", None, 3).await.unwrap();
        assert_eq!(page.objects.len(), 3);
        assert!(page.next.is_some());

        let all = list_all(&store, "item-", 3).await.unwrap();
        assert_eq!(all.len(), 7);
        assert!(all.iter().all(|obj| obj.name.starts_with("item-")));
    }

    #[tokio::test]
    async fn listing_descends_into_folders() {
        let (store, _dir) = temp_store().await;
        store
            .put("nested/deep/a.webp", b"x", "image/webp", WriteMode::Create)
            .await
            .unwrap();
        let all = list_all(&store, "", 100).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "nested/deep/a.webp");
    }
}
