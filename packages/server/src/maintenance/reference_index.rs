//! Builds the set of canonical paths the catalog actually references.
//!
//! Scans every field known to legally hold an image reference:
//! `products.foto_principal`, `products.fotos[]` and `banners.imagem_url`.
//! Read-only; schema drift in these tables fails compilation of the typed
//! entities instead of silently scanning nothing.

use std::collections::HashSet;

use sea_orm::{ConnectionTrait, DbErr, EntityTrait};
use tracing::info;

use common::config::StorageConfig;
use common::media::base_path;

use crate::entity::{banner, product};
use crate::utils::url::strip_public_prefix;

/// Scan the catalog for image references belonging to this store, returned
/// as bare object names with URL and folder prefixes stripped but sizes and
/// extensions intact. Products first, then banners.
pub async fn scan_values<C: ConnectionTrait>(
    db: &C,
    storage: &StorageConfig,
) -> Result<Vec<String>, DbErr> {
    let folder = storage.folder.as_deref();
    let mut values = Vec::new();
    let mut keep = |value: &str| {
        if let Some(name) = strip_public_prefix(value, &storage.public_base_url, folder) {
            values.push(name.to_string());
        }
    };

    let products = product::Entity::find().all(db).await?;
    for row in &products {
        if let Some(value) = &row.foto_principal {
            keep(value);
        }
        for value in &row.fotos {
            keep(value);
        }
    }

    let banners = banner::Entity::find().all(db).await?;
    for row in &banners {
        if let Some(value) = &row.imagem_url {
            keep(value);
        }
    }

    info!(
        products = products.len(),
        banners = banners.len(),
        values = values.len(),
        "catalog scan complete"
    );

    Ok(values)
}

/// The set of unique canonical paths in use across the whole catalog.
pub async fn build<C: ConnectionTrait>(
    db: &C,
    storage: &StorageConfig,
) -> Result<HashSet<String>, DbErr> {
    let referenced: HashSet<String> = scan_values(db, storage)
        .await?
        .iter()
        .map(|name| base_path(name))
        .filter(|base| !base.is_empty())
        .collect();

    info!(referenced = referenced.len(), "reference index built");
    Ok(referenced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn storage_config() -> StorageConfig {
        StorageConfig {
            public_base_url: "https://cdn.example.com/storage".into(),
            folder: Some("produtos".into()),
            ..StorageConfig::default()
        }
    }

    fn mock_db() -> sea_orm::DatabaseConnection {
        MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![
                product::Model {
                    id: 1,
                    nome: "Tênis".into(),
                    foto_principal: Some(
                        "https://cdn.example.com/storage/produtos/shoe-42-original.webp".into(),
                    ),
                    fotos: vec![
                        "shoe-43-thumb.webp".into(),
                        // Foreign URL must be ignored.
                        "https://ads.example.net/img/campaign.png".into(),
                    ],
                    created_at: Utc::now(),
                },
                product::Model {
                    id: 2,
                    nome: "Bota".into(),
                    foto_principal: None,
                    fotos: vec!["shoe-42-large.webp".into()],
                    created_at: Utc::now(),
                },
            ]])
            .append_query_results([vec![banner::Model {
                id: 1,
                titulo: "Promo".into(),
                imagem_url: Some("banner-7.jpg".into()),
                created_at: Utc::now(),
            }]])
            .into_connection()
    }

    #[tokio::test]
    async fn scan_strips_prefixes_but_keeps_names() {
        let values = scan_values(&mock_db(), &storage_config()).await.unwrap();
        assert_eq!(
            values,
            vec![
                "shoe-42-original.webp".to_string(),
                "shoe-43-thumb.webp".to_string(),
                "shoe-42-large.webp".to_string(),
                "banner-7.jpg".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn build_collects_and_normalizes_every_field() {
        let referenced = build(&mock_db(), &storage_config()).await.unwrap();

        let expected: HashSet<String> = ["shoe-42", "shoe-43", "banner-7"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(referenced, expected);
    }

    #[tokio::test]
    async fn empty_catalog_yields_empty_set() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results::<product::Model, _, _>([vec![]])
            .append_query_results::<banner::Model, _, _>([vec![]])
            .into_connection();

        let referenced = build(&db, &storage_config()).await.unwrap();
        assert!(referenced.is_empty());
    }
}
