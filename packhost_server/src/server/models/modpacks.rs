use chrono::{DateTime, Utc};
use packhost_core::api::{CatalogEntry, ModpackId};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, sqlx::FromRow, Debug, Clone)]
pub struct Modpack {
    pub id: ModpackId,
    pub name: String,
    pub version: String,
    pub minecraft_version: String,
    pub filename: String,
    pub description: String,
    pub download_url: String,
    pub blob_url: String,
    pub created_at: DateTime<Utc>,
}

impl Modpack {
    pub fn new(entry: &CatalogEntry, blob_url: &str, created_at: DateTime<Utc>) -> Self {
        Modpack {
            id: entry.id.clone(),
            name: entry.name.clone(),
            version: entry.version.clone(),
            minecraft_version: entry.minecraft_version.clone(),
            filename: entry.filename.clone(),
            description: entry.description.clone(),
            download_url: entry.download_url.clone(),
            blob_url: blob_url.to_string(),
            created_at,
        }
    }

    pub async fn get_optional<'a, E>(id: &ModpackId, exec: E) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'a>,
    {
        sqlx::query_as::<_, Modpack>(
            "SELECT id, name, version, minecraft_version, filename, description, download_url, blob_url, created_at
            FROM modpacks WHERE id = $1 LIMIT 1",
        )
        .bind(&id.0)
        .fetch_optional(exec)
        .await
    }

    /// Newest first.
    pub async fn list<'a, E>(exec: E) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'a>,
    {
        sqlx::query_as::<_, Modpack>(
            "SELECT id, name, version, minecraft_version, filename, description, download_url, blob_url, created_at
            FROM modpacks ORDER BY created_at DESC",
        )
        .fetch_all(exec)
        .await
    }

    /// Inserts the row, replacing every column of an existing row with the same id.
    pub async fn upsert<'a, E>(&self, exec: E) -> Result<(), sqlx::Error>
    where
        E: sqlx::PgExecutor<'a>,
    {
        sqlx::query(
            "INSERT INTO modpacks
            (id, name, version, minecraft_version, filename, description, download_url, blob_url, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                version = EXCLUDED.version,
                minecraft_version = EXCLUDED.minecraft_version,
                filename = EXCLUDED.filename,
                description = EXCLUDED.description,
                download_url = EXCLUDED.download_url,
                blob_url = EXCLUDED.blob_url,
                created_at = EXCLUDED.created_at",
        )
        .bind(&self.id.0)
        .bind(&self.name)
        .bind(&self.version)
        .bind(&self.minecraft_version)
        .bind(&self.filename)
        .bind(&self.description)
        .bind(&self.download_url)
        .bind(&self.blob_url)
        .bind(self.created_at)
        .execute(exec)
        .await?;
        Ok(())
    }

    pub async fn delete<'a, E>(id: &ModpackId, exec: E) -> Result<(), sqlx::Error>
    where
        E: sqlx::PgExecutor<'a>,
    {
        sqlx::query("DELETE FROM modpacks WHERE id = $1")
            .bind(&id.0)
            .execute(exec)
            .await?;
        Ok(())
    }
}

impl From<Modpack> for CatalogEntry {
    fn from(x: Modpack) -> Self {
        Self {
            id: x.id,
            name: x.name,
            version: x.version,
            minecraft_version: x.minecraft_version,
            filename: x.filename,
            description: x.description,
            download_url: x.download_url,
            created_at: Some(x.created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use packhost_core::{metadata::ArchiveDescriptor, PackFormat};

    use super::*;

    #[test]
    fn row_round_trips_through_catalog_entry() {
        let created_at = Utc::now();
        let entry = CatalogEntry::new(
            ArchiveDescriptor {
                name: "Skyblock".to_string(),
                platform_version: "1.20.1".to_string(),
                format: PackFormat::CurseForge,
            },
            "Sky Block.zip",
            "https://store.blob.example.com/modpacks/Sky%20Block.zip".to_string(),
            Some(created_at),
        );
        let row = Modpack::new(&entry, &entry.download_url, created_at);
        assert_eq!(row.id.0, "Sky-Block");
        assert_eq!(row.blob_url, entry.download_url);

        let back: CatalogEntry = row.into();
        assert_eq!(back, entry);
    }
}
