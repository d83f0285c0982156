use async_trait::async_trait;
use s3::Bucket;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::region::Region;

use crate::config::StorageConfig;

use super::error::StorageError;
use super::traits::{BucketStore, ObjectPage, StoredObject, WriteMode};

/// S3-compatible object store (AWS, Supabase Storage, MinIO).
///
/// Object names are flat strings within the bucket, optionally prefixed by a
/// configured folder segment. Listing strips the folder prefix back off so
/// callers only ever see bare names.
pub struct S3Store {
    bucket: Box<Bucket>,
    folder: Option<String>,
    public_base_url: String,
}

impl S3Store {
    pub fn from_config(cfg: &StorageConfig) -> Result<Self, StorageError> {
        let region = match &cfg.endpoint {
            Some(endpoint) => Region::Custom {
                region: cfg.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => cfg
                .region
                .parse()
                .map_err(|e| StorageError::Backend(format!("invalid region: {e}")))?,
        };

        let credentials = Credentials::new(
            cfg.access_key.as_deref(),
            cfg.secret_key.as_deref(),
            None,
            None,
            None,
        )
        .map_err(|e| StorageError::Backend(format!("invalid credentials: {e}")))?;

        let bucket = Bucket::new(&cfg.bucket, region, credentials)
            .map_err(|e| StorageError::Backend(e.to_string()))?
            .with_path_style();

        Ok(Self {
            bucket,
            folder: cfg.folder.clone(),
            public_base_url: cfg.public_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn key(&self, name: &str) -> String {
        match &self.folder {
            Some(folder) => format!("{folder}/{name}"),
            None => name.to_string(),
        }
    }

    fn strip_folder<'a>(&self, key: &'a str) -> &'a str {
        match &self.folder {
            Some(folder) => key
                .strip_prefix(folder.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
                .unwrap_or(key),
            None => key,
        }
    }
}

fn map_err(name: &str, err: S3Error) -> StorageError {
    match err {
        S3Error::HttpFailWithBody(404, _) => StorageError::NotFound(name.to_string()),
        S3Error::HttpFailWithBody(429, body) | S3Error::HttpFailWithBody(503, body) => {
            StorageError::RateLimited(body)
        }
        other => StorageError::Backend(other.to_string()),
    }
}

fn check_status(name: &str, code: u16) -> Result<(), StorageError> {
    match code {
        200..=299 => Ok(()),
        404 => Err(StorageError::NotFound(name.to_string())),
        429 | 503 => Err(StorageError::RateLimited(format!("status {code}"))),
        other => Err(StorageError::Backend(format!(
            "unexpected status {other} for {name}"
        ))),
    }
}

#[async_trait]
impl BucketStore for S3Store {
    async fn put(
        &self,
        name: &str,
        bytes: &[u8],
        content_type: &str,
        mode: WriteMode,
    ) -> Result<(), StorageError> {
        // The S3 API has no portable create-without-overwrite, so Create is
        // a head-then-put. The race window is acceptable: canonical paths
        // carry a random tail and colliding uploads fail loudly downstream.
        if mode == WriteMode::Create && self.exists(name).await? {
            return Err(StorageError::AlreadyExists(name.to_string()));
        }

        let key = self.key(name);
        let resp = self
            .bucket
            .put_object_with_content_type(&key, bytes, content_type)
            .await
            .map_err(|e| map_err(name, e))?;
        check_status(name, resp.status_code())
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let key = self.key(name);
        let resp = self
            .bucket
            .get_object(&key)
            .await
            .map_err(|e| map_err(name, e))?;
        check_status(name, resp.status_code())?;
        Ok(resp.bytes().to_vec())
    }

    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        let key = self.key(name);
        match self.bucket.head_object(&key).await {
            Ok((_, code)) if (200..=299).contains(&code) => Ok(true),
            Ok((_, 404)) => Ok(false),
            Ok((_, code)) => check_status(name, code).map(|_| true),
            Err(S3Error::HttpFailWithBody(404, _)) => Ok(false),
            Err(e) => Err(map_err(name, e)),
        }
    }

    async fn delete(&self, name: &str) -> Result<bool, StorageError> {
        let key = self.key(name);
        match self.bucket.delete_object(&key).await {
            Ok(resp) => match resp.status_code() {
                200..=299 => Ok(true),
                404 => Ok(false),
                code => check_status(name, code).map(|_| true),
            },
            Err(S3Error::HttpFailWithBody(404, _)) => Ok(false),
            Err(e) => Err(map_err(name, e)),
        }
    }

    async fn list_page(
        &self,
        prefix: &str,
        token: Option<String>,
        page_size: usize,
    ) -> Result<ObjectPage, StorageError> {
        let full_prefix = match &self.folder {
            Some(folder) if prefix.is_empty() => format!("{folder}/"),
            Some(folder) => format!("{folder}/{prefix}"),
            None => prefix.to_string(),
        };

        let (result, code) = self
            .bucket
            .list_page(full_prefix, None, token, None, Some(page_size))
            .await
            .map_err(|e| map_err(prefix, e))?;
        check_status(prefix, code)?;

        let objects = result
            .contents
            .iter()
            .map(|obj| StoredObject {
                name: self.strip_folder(&obj.key).to_string(),
                size: obj.size,
            })
            .collect();

        Ok(ObjectPage {
            objects,
            next: result.next_continuation_token,
        })
    }

    fn public_url(&self, name: &str) -> String {
        match &self.folder {
            Some(folder) => format!("{}/{folder}/{name}", self.public_base_url),
            None => format!("{}/{name}", self.public_base_url),
        }
    }
}
