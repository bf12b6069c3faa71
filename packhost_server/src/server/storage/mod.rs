use std::path::Path;

use anyhow::Context;
use axum::{body::Bytes, extract::Request, response::Response};
use packhost_core::{api::CatalogEntry, metadata::ArchiveDescriptor};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use super::{config::StorageConfig, error::ApiError};
use blob::BlobClient;
use disk::DiskStorage;
use remote::RemoteStorage;

pub mod blob;
pub mod disk;
pub mod remote;

const ARCHIVE_EXTENSIONS: [&str; 2] = ["zip", "mrpack"];

/// Whether `filename` has a `.zip` or `.mrpack` extension, in any case.
pub fn is_archive(filename: impl AsRef<Path>) -> bool {
    filename
        .as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ARCHIVE_EXTENSIONS.iter().any(|x| ext.eq_ignore_ascii_case(x)))
}

/// Where uploaded packs and their catalog live. Chosen once at startup.
#[derive(Clone)]
pub enum Storage {
    Disk(DiskStorage),
    Remote(RemoteStorage),
}

impl Storage {
    pub async fn connect(config: &StorageConfig, public_url: &str) -> anyhow::Result<Self> {
        match config {
            StorageConfig::Local { directory } | StorageConfig::Scratch { directory } => {
                tokio::fs::create_dir_all(directory).await.with_context(|| {
                    format!("Cannot create storage directory {}", directory.display())
                })?;
                info!("Storing modpacks in {}", directory.display());
                Ok(Storage::Disk(DiskStorage::new(directory.clone(), public_url)))
            }
            StorageConfig::Remote { database_url, blob } => {
                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect(database_url)
                    .await?;

                sqlx::migrate!().run(&pool).await?;

                info!("Storing modpacks in {}", blob.api_url);
                Ok(Storage::Remote(RemoteStorage::new(
                    pool,
                    BlobClient::new(blob)?,
                )))
            }
        }
    }

    pub async fn put(
        &self,
        filename: &str,
        content_type: Option<&str>,
        data: Bytes,
        descriptor: ArchiveDescriptor,
    ) -> Result<CatalogEntry, ApiError> {
        match self {
            Storage::Disk(disk) => disk.put(filename, data, descriptor).await,
            Storage::Remote(remote) => remote.put(filename, content_type, data, descriptor).await,
        }
    }

    pub async fn manifest(&self) -> Result<Vec<CatalogEntry>, ApiError> {
        match self {
            Storage::Disk(disk) => disk.manifest().await,
            Storage::Remote(remote) => remote.manifest().await,
        }
    }

    /// Removes both the stored file and its catalog entry.
    pub async fn delete(&self, filename: &str) -> Result<(), ApiError> {
        match self {
            Storage::Disk(disk) => disk.delete(filename).await,
            Storage::Remote(remote) => remote.delete(filename).await,
        }
    }

    pub async fn download(&self, filename: &str, req: Request) -> Result<Response, ApiError> {
        match self {
            Storage::Disk(disk) => disk.download(filename, req).await,
            Storage::Remote(remote) => remote.download(filename).await,
        }
    }
}
