use std::{path::PathBuf, time::Duration};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BLOB_API_URL: &str = "https://blob.vercel-storage.com";
const DEFAULT_MAX_UPLOAD_MB: u64 = 250;
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// `packhost.server.toml`; every key is optional.
#[derive(Serialize, Deserialize, Default, Debug)]
pub struct ServerConfigFile {
    pub port: Option<u16>,
    pub public_directory: Option<String>,
    pub public_url: Option<String>,
    pub storage: Option<String>,
    pub storage_directory: Option<String>,
    pub database_url: Option<String>,
    pub blob_api_url: Option<String>,
    pub blob_token: Option<String>,
    pub master_key: Option<String>,
    pub max_upload_mb: Option<u64>,
    pub timeout_secs: Option<u64>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    pub public_directory: PathBuf,
    /// Base used to build download URLs for disk-backed storage.
    pub public_url: String,
    pub master_key: Option<String>,
    pub max_upload_bytes: usize,
    pub timeout: Duration,
    pub storage: StorageConfig,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StorageConfig {
    Local { directory: PathBuf },
    Scratch { directory: PathBuf },
    Remote { database_url: String, blob: BlobConfig },
}

#[derive(Clone, Debug, PartialEq)]
pub struct BlobConfig {
    pub api_url: String,
    pub token: String,
}

impl std::fmt::Display for StorageConfig {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Local { directory } => write!(fmt, "local ({})", directory.display()),
            Self::Scratch { directory } => write!(fmt, "scratch ({})", directory.display()),
            Self::Remote { blob, .. } => write!(fmt, "remote (blob store {})", blob.api_url),
        }
    }
}

impl ServerConfig {
    /// Environment wins over the config file, the config file over defaults.
    pub fn resolve<F>(file: Option<ServerConfigFile>, env: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = file.unwrap_or_default();

        let port = match env("PORT").or_else(|| env("PACKHOST_PORT")) {
            Some(port) => port
                .parse()
                .with_context(|| format!("Invalid port {port:?}"))?,
            None => file.port.unwrap_or(DEFAULT_PORT),
        };
        let public_url = env("PACKHOST_PUBLIC_URL")
            .or(file.public_url)
            .unwrap_or(format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_string();
        let max_upload_mb = match env("PACKHOST_MAX_UPLOAD_MB") {
            Some(value) => value
                .parse()
                .with_context(|| format!("Invalid upload limit {value:?}"))?,
            None => file.max_upload_mb.unwrap_or(DEFAULT_MAX_UPLOAD_MB),
        };
        let timeout_secs = match env("PACKHOST_TIMEOUT_SECS") {
            Some(value) => value
                .parse()
                .with_context(|| format!("Invalid timeout {value:?}"))?,
            None => file.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
        };

        let storage_directory = env("PACKHOST_STORAGE_DIRECTORY")
            .or(file.storage_directory)
            .map(PathBuf::from);
        let database_url = env("DATABASE_URL").or(file.database_url);
        let blob_token = env("BLOB_READ_WRITE_TOKEN").or(file.blob_token);
        let blob_api_url = env("BLOB_API_URL")
            .or(file.blob_api_url)
            .unwrap_or(DEFAULT_BLOB_API_URL.to_string());

        let local = || StorageConfig::Local {
            directory: storage_directory.clone().unwrap_or_else(default_local_directory),
        };
        let scratch = || StorageConfig::Scratch {
            directory: storage_directory
                .clone()
                .unwrap_or_else(|| std::env::temp_dir().join("modpacks")),
        };
        let remote = || -> anyhow::Result<StorageConfig> {
            Ok(StorageConfig::Remote {
                database_url: database_url
                    .clone()
                    .context("Remote storage needs DATABASE_URL")?,
                blob: BlobConfig {
                    api_url: blob_api_url.trim_end_matches('/').to_string(),
                    token: blob_token
                        .clone()
                        .context("Remote storage needs BLOB_READ_WRITE_TOKEN")?,
                },
            })
        };

        let storage = match env("PACKHOST_STORAGE").or(file.storage).as_deref() {
            Some("local") => local(),
            Some("scratch") => scratch(),
            Some("remote") => remote()?,
            Some(other) => {
                bail!("Unknown storage backend {other:?}, expected local, scratch or remote")
            }
            None if database_url.is_some() && blob_token.is_some() => remote()?,
            None if env("VERCEL").is_some() => scratch(),
            None => local(),
        };

        Ok(ServerConfig {
            port,
            public_directory: env("PACKHOST_PUBLIC_DIRECTORY")
                .or(file.public_directory)
                .unwrap_or("public".to_string())
                .into(),
            public_url,
            master_key: env("PACKHOST_MASTER_KEY")
                .or(file.master_key)
                .filter(|key| !key.is_empty()),
            max_upload_bytes: max_upload_mb
                .checked_mul(1024 * 1024)
                .and_then(|bytes| usize::try_from(bytes).ok())
                .context("Upload limit too large")?,
            timeout: Duration::from_secs(timeout_secs),
            storage,
        })
    }
}

fn default_local_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join("modpack-server")
        .join("modpacks")
}
