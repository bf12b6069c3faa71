use std::{io::ErrorKind, path::PathBuf};

use axum::{
    body::Bytes,
    extract::Request,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use packhost_core::{
    api::CatalogEntry,
    metadata::{self, ArchiveDescriptor},
};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::debug;

use super::is_archive;
use crate::server::error::ApiError;

/// Packs stored as plain files in one directory. The manifest is rebuilt from
/// the directory contents on every request.
#[derive(Clone, Debug)]
pub struct DiskStorage {
    root: PathBuf,
    public_url: String,
}

impl DiskStorage {
    pub fn new(root: PathBuf, public_url: &str) -> Self {
        Self {
            root,
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    fn download_url(&self, filename: &str) -> String {
        format!(
            "{}/modpacks/{}",
            self.public_url,
            urlencoding::encode(filename)
        )
    }

    pub async fn put(
        &self,
        filename: &str,
        data: Bytes,
        descriptor: ArchiveDescriptor,
    ) -> Result<CatalogEntry, ApiError> {
        let path = self.root.join(filename);
        debug!(path = %path.display(), "Writing modpack");
        tokio::fs::write(&path, &data).await?;
        Ok(CatalogEntry::new(
            descriptor,
            filename,
            self.download_url(filename),
            Some(Utc::now()),
        ))
    }

    pub async fn manifest(&self) -> Result<Vec<CatalogEntry>, ApiError> {
        let storage = self.clone();
        Ok(tokio::task::spawn_blocking(move || storage.scan()).await??)
    }

    fn scan(&self) -> Result<Vec<CatalogEntry>, std::io::Error> {
        let mut entries = Vec::new();
        for dir_entry in std::fs::read_dir(&self.root)? {
            let dir_entry = dir_entry?;
            let path = dir_entry.path();
            if !is_archive(&path) {
                continue;
            }
            let file_meta = dir_entry.metadata()?;
            if !file_meta.is_file() {
                continue;
            }
            let Some(filename) = path.file_name().and_then(|x| x.to_str()) else {
                continue;
            };
            let modified = file_meta.modified().ok().map(DateTime::<Utc>::from);
            entries.push(CatalogEntry::new(
                metadata::extract_file(&path, filename),
                filename,
                self.download_url(filename),
                modified,
            ));
        }
        entries.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.filename.cmp(&b.filename))
        });
        Ok(entries)
    }

    pub async fn delete(&self, filename: &str) -> Result<(), ApiError> {
        match tokio::fs::remove_file(self.root.join(filename)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(ApiError::NotFound),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn download(&self, filename: &str, req: Request) -> Result<Response, ApiError> {
        let path = self.root.join(filename);
        if !tokio::fs::try_exists(&path).await? {
            return Err(ApiError::NotFound);
        }
        Ok(ServeFile::new(path).oneshot(req).await.into_response())
    }
}
