use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Type;

use crate::metadata::ArchiveDescriptor;

/// Every hosted pack is published as this version.
pub const PACK_VERSION: &str = "1.0.0";

/// Catalog key, derived from the uploaded filename.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Hash, Eq, PartialOrd, Ord, Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct ModpackId(pub String);

impl ModpackId {
    /// Strips a trailing `.zip`/`.mrpack` and turns each whitespace run into `-`.
    ///
    /// Distinct filenames can map to the same id; the later upload wins.
    pub fn from_filename(filename: &str) -> Self {
        let base = filename
            .strip_suffix(".zip")
            .or_else(|| filename.strip_suffix(".mrpack"))
            .unwrap_or(filename);

        let mut id = String::with_capacity(base.len());
        let mut in_whitespace = false;
        for c in base.chars() {
            if c.is_whitespace() {
                if !in_whitespace {
                    id.push('-');
                }
                in_whitespace = true;
            } else {
                id.push(c);
                in_whitespace = false;
            }
        }
        ModpackId(id)
    }
}

impl std::fmt::Display for ModpackId {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "{}", self.0)
    }
}

/// One manifest record, as served to launchers.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: ModpackId,
    pub name: String,
    pub version: String,
    pub minecraft_version: String,
    pub filename: String,
    pub description: String,
    pub download_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl CatalogEntry {
    pub fn new(
        descriptor: ArchiveDescriptor,
        filename: &str,
        download_url: String,
        created_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: ModpackId::from_filename(filename),
            description: format!("Hosted modpack: {}", descriptor.name),
            name: descriptor.name,
            version: PACK_VERSION.to_string(),
            minecraft_version: descriptor.platform_version,
            filename: filename.to_string(),
            download_url,
            created_at,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct ManifestResponse {
    pub modpacks: Vec<CatalogEntry>,
}

// Upload
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub message: String,
    pub filename: String,
    pub download_url: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct DeleteResponse {
    pub success: bool,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
