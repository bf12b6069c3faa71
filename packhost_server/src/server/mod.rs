use std::{env::var, io::ErrorKind, path::PathBuf, sync::Arc};

use anyhow::Context;
use axum::{
    async_trait,
    extract::{DefaultBodyLimit, FromRef, FromRequestParts, Multipart, Path, Request, State},
    http::request::Parts,
    response::Response,
    routing::{get, post},
    Json, RequestPartsExt, Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use clap::Parser;
use config::{ServerConfig, ServerConfigFile};
use error::ApiError;
use packhost_core::{
    api::{DeleteResponse, ManifestResponse, UploadResponse},
    metadata,
};
use storage::Storage;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::{info, warn};

pub mod config;
mod error;
mod models;
pub mod storage;
#[cfg(test)]
mod tests;

/// Multipart field carrying the uploaded archive.
pub const UPLOAD_FIELD: &str = "modpack";

/// Packhost server
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct ServeCommand {
    /// Server config file; missing file means environment and defaults only
    #[arg(long, env = "PACKHOST_CONFIG_PATH", default_value = "packhost.server.toml")]
    config: PathBuf,
}

pub struct AppState {
    pub config: ServerConfig,
    pub storage: Storage,
}

impl ServeCommand {
    pub async fn run(&self) -> anyhow::Result<()> {
        info!("Packhost Server v{}", env!("CARGO_PKG_VERSION"));

        let server_config_file = match std::fs::read_to_string(&self.config) {
            Ok(text) => Some(
                toml::from_str::<ServerConfigFile>(&text)
                    .with_context(|| format!("Invalid config file {}", self.config.display()))?,
            ),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => return Err(err.into()),
        };
        let config = ServerConfig::resolve(server_config_file, |key| var(key).ok())?;

        info!("Storage backend: {}", config.storage);
        if config.master_key.is_none() {
            warn!("No master key set, anyone can upload and delete modpacks");
        }
        let storage = Storage::connect(&config.storage, &config.public_url).await?;

        let state = Arc::new(AppState {
            config: config.clone(),
            storage,
        });

        let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
        info!("Serving on 0.0.0.0:{}", config.port);
        axum::serve(listener, router(state)).await?;

        Ok(())
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let public_directory = state.config.public_directory.clone();
    let max_upload_bytes = state.config.max_upload_bytes;
    let timeout = state.config.timeout;

    Router::new()
        .route(
            "/",
            get(|| async { concat!("Packhost server v", env!("CARGO_PKG_VERSION")) }),
        )
        .route("/upload", post(upload))
        .route(
            "/manifest",
            get(manifest).layer(CompressionLayer::new()),
        )
        .route(
            "/modpacks.json",
            get(manifest).layer(CompressionLayer::new()),
        )
        .route(
            "/modpacks/:filename",
            get(modpack_download).delete(modpack_delete),
        )
        .fallback_service(ServeDir::new(public_directory))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn upload(
    State(state): State<Arc<AppState>>,
    _: AuthenticatedKey,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        // Plain form fields carry no filename and do not count as an upload
        let Some(raw_filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let filename = checked_filename(upload_basename(&raw_filename))?.to_string();
        if !storage::is_archive(&filename) {
            return Err(ApiError::InvalidFilename);
        }
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await?;

        let descriptor = {
            let data = data.clone();
            let filename = filename.clone();
            tokio::task::spawn_blocking(move || metadata::extract(&data, &filename)).await?
        };
        let entry = state
            .storage
            .put(&filename, content_type.as_deref(), data, descriptor)
            .await?;
        info!(
            id = %entry.id,
            "Stored {} ({}, Minecraft {})",
            filename,
            entry.name,
            entry.minecraft_version
        );

        return Ok(Json(UploadResponse {
            message: "Uploaded!".to_string(),
            filename,
            download_url: Some(entry.download_url),
        }));
    }
    Err(ApiError::NoFile)
}

async fn manifest(State(state): State<Arc<AppState>>) -> Result<Json<ManifestResponse>, ApiError> {
    Ok(Json(ManifestResponse {
        modpacks: state.storage.manifest().await?,
    }))
}

async fn modpack_download(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
    req: Request,
) -> Result<Response, ApiError> {
    let filename = checked_filename(&filename)?;
    state.storage.download(filename, req).await
}

async fn modpack_delete(
    State(state): State<Arc<AppState>>,
    _: AuthenticatedKey,
    Path(filename): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let filename = checked_filename(&filename)?;
    state.storage.delete(filename).await?;
    info!("Deleted {filename}");
    Ok(Json(DeleteResponse { success: true }))
}

/// Browsers on Windows may send the full client-side path.
fn upload_basename(raw: &str) -> &str {
    raw.rsplit(['/', '\\']).next().unwrap_or(raw)
}

/// A stored filename is a single, non-special path component.
fn checked_filename(name: &str) -> Result<&str, ApiError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(ApiError::InvalidFilename);
    }
    Ok(name)
}

/// Present on routes that change the catalog. Without a configured master key
/// every request passes.
pub struct AuthenticatedKey;

type AxumAppState = Arc<AppState>;
#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedKey
where
    AxumAppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AxumAppState::from_ref(state);
        let Some(master_key) = state.config.master_key.as_deref() else {
            return Ok(AuthenticatedKey);
        };
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| ApiError::Unauthorized)?;
        if master_key != bearer.token() {
            return Err(ApiError::Unauthorized);
        }
        Ok(AuthenticatedKey)
    }
}
