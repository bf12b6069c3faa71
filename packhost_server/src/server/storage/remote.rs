use axum::{
    body::Bytes,
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use packhost_core::{
    api::{CatalogEntry, ModpackId},
    metadata::ArchiveDescriptor,
};
use sqlx::PgPool;
use tracing::info;

use super::blob::BlobClient;
use crate::server::{error::ApiError, models::modpacks::Modpack};

/// Pack bytes live in the blob store, catalog rows in Postgres.
#[derive(Clone)]
pub struct RemoteStorage {
    pool: PgPool,
    blob: BlobClient,
}

pub fn blob_pathname(filename: &str) -> String {
    format!("modpacks/{filename}")
}

impl RemoteStorage {
    pub fn new(pool: PgPool, blob: BlobClient) -> Self {
        Self { pool, blob }
    }

    pub async fn put(
        &self,
        filename: &str,
        content_type: Option<&str>,
        data: Bytes,
        descriptor: ArchiveDescriptor,
    ) -> Result<CatalogEntry, ApiError> {
        info!("Uploading {filename} to the blob store");
        let blob = self
            .blob
            .put(&blob_pathname(filename), content_type, data)
            .await?;

        let created_at = Utc::now();
        let entry = CatalogEntry::new(descriptor, filename, blob.url.clone(), Some(created_at));
        Modpack::new(&entry, &blob.url, created_at)
            .upsert(&self.pool)
            .await?;
        Ok(entry)
    }

    pub async fn manifest(&self) -> Result<Vec<CatalogEntry>, ApiError> {
        Ok(Modpack::list(&self.pool)
            .await?
            .into_iter()
            .map(|x| x.into())
            .collect())
    }

    pub async fn delete(&self, filename: &str) -> Result<(), ApiError> {
        let id = ModpackId::from_filename(filename);
        let modpack = Modpack::get_optional(&id, &self.pool)
            .await?
            .ok_or(ApiError::NotFound)?;
        self.blob.delete(&modpack.blob_url).await?;
        Modpack::delete(&id, &self.pool).await?;
        Ok(())
    }

    pub async fn download(&self, filename: &str) -> Result<Response, ApiError> {
        let id = ModpackId::from_filename(filename);
        let modpack = Modpack::get_optional(&id, &self.pool)
            .await?
            .ok_or(ApiError::NotFound)?;
        Ok(Redirect::temporary(&modpack.download_url).into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blobs_live_under_modpacks_prefix() {
        assert_eq!(blob_pathname("My Pack.zip"), "modpacks/My Pack.zip");
    }
}
