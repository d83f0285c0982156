use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::error::StorageError;
use super::traits::{BucketStore, ObjectPage, StoredObject, WriteMode};

/// In-memory object store used by tests and local experiments.
///
/// Supports targeted fault injection: puts and deletes against registered
/// names fail with a backend error until the registration is cleared, which
/// is how partial-upload and batch-fallback paths get exercised.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    failing_puts: Mutex<HashSet<String>>,
    failing_puts_once: Mutex<HashSet<String>>,
    failing_deletes: Mutex<HashSet<String>>,
    fail_delete_many: Mutex<bool>,
    put_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every put against `name` fail until [`MemoryStore::heal`].
    pub fn fail_puts(&self, name: &str) {
        self.failing_puts.lock().unwrap().insert(name.to_string());
    }

    /// Make only the next put against `name` fail.
    pub fn fail_put_once(&self, name: &str) {
        self.failing_puts_once
            .lock()
            .unwrap()
            .insert(name.to_string());
    }

    /// Make every delete against `name` fail until [`MemoryStore::heal`].
    pub fn fail_deletes(&self, name: &str) {
        self.failing_deletes.lock().unwrap().insert(name.to_string());
    }

    /// Make `delete_many` fail wholesale, forcing per-object fallback.
    pub fn fail_delete_many(&self) {
        *self.fail_delete_many.lock().unwrap() = true;
    }

    /// Clear all injected faults.
    pub fn heal(&self) {
        self.failing_puts.lock().unwrap().clear();
        self.failing_puts_once.lock().unwrap().clear();
        self.failing_deletes.lock().unwrap().clear();
        *self.fail_delete_many.lock().unwrap() = false;
    }

    /// Total number of put attempts, including failed ones.
    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    pub fn names(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.objects.lock().unwrap().contains_key(name)
    }

    pub fn insert(&self, name: &str, bytes: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(name.to_string(), bytes.to_vec());
    }
}

#[async_trait]
impl BucketStore for MemoryStore {
    async fn put(
        &self,
        name: &str,
        bytes: &[u8],
        _content_type: &str,
        mode: WriteMode,
    ) -> Result<(), StorageError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);

        if self.failing_puts.lock().unwrap().contains(name) {
            return Err(StorageError::Backend(format!("injected put failure: {name}")));
        }
        if self.failing_puts_once.lock().unwrap().remove(name) {
            return Err(StorageError::Backend(format!("injected put failure: {name}")));
        }

        let mut objects = self.objects.lock().unwrap();
        if mode == WriteMode::Create && objects.contains_key(name) {
            return Err(StorageError::AlreadyExists(name.to_string()));
        }
        objects.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.objects.lock().unwrap().contains_key(name))
    }

    async fn delete(&self, name: &str) -> Result<bool, StorageError> {
        if self.failing_deletes.lock().unwrap().contains(name) {
            return Err(StorageError::Backend(format!(
                "injected delete failure: {name}"
            )));
        }
        Ok(self.objects.lock().unwrap().remove(name).is_some())
    }

    async fn delete_many(&self, names: &[String]) -> Result<Vec<String>, StorageError> {
        if *self.fail_delete_many.lock().unwrap() {
            return Err(StorageError::Backend("injected batch failure".into()));
        }

        let mut removed = Vec::new();
        for name in names {
            if self.delete(name).await? {
                removed.push(name.clone());
            }
        }
        Ok(removed)
    }

    async fn list_page(
        &self,
        prefix: &str,
        token: Option<String>,
        page_size: usize,
    ) -> Result<ObjectPage, StorageError> {
        let objects = self.objects.lock().unwrap();
        let page: Vec<StoredObject> = objects
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .filter(|(name, _)| match &token {
                Some(after) => name.as_str() > after.as_str(),
                None => true,
            })
            .take(page_size)
            .map(|(name, bytes)| StoredObject {
                name: name.clone(),
                size: bytes.len() as u64,
            })
            .collect();

        let next = page.last().map(|obj| obj.name.clone());
        Ok(ObjectPage { objects: page, next })
    }

    fn public_url(&self, name: &str) -> String {
        format!("memory://{name}")
    }
}
