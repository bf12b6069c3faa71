use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::Args;
use colored::Colorize;
use log::info;
use packhost_core::{
    api::{DeleteResponse, ManifestResponse, ModpackId, UploadResponse},
    metadata,
};
use sha2::{Digest, Sha256};

use crate::connection::{check, ServerArgs};

/// Upload a modpack archive
#[derive(Args, Debug)]
pub struct UploadCommand {
    /// The .zip or .mrpack file to upload
    file: PathBuf,
}

/// List hosted modpacks
#[derive(Args, Debug)]
pub struct ListCommand {}

/// Delete a hosted modpack by its filename
#[derive(Args, Debug)]
pub struct DeleteCommand {
    filename: String,
}

/// Show what the server would extract from an archive, without uploading it
#[derive(Args, Debug)]
pub struct InspectCommand {
    file: PathBuf,
}

impl UploadCommand {
    pub async fn run(&self, server: &ServerArgs) -> anyhow::Result<()> {
        let connection = server.connect()?;
        let filename = file_name(&self.file)?;
        let data = tokio::fs::read(&self.file)
            .await
            .with_context(|| format!("Cannot read {}", self.file.display()))?;

        info!("[{}] Uploading {} ({} bytes)...", "@".purple(), filename.purple(), data.len());
        let part = reqwest::multipart::Part::bytes(data)
            .file_name(filename.clone())
            .mime_str("application/zip")?;
        let form = reqwest::multipart::Form::new().part("modpack", part);
        let response: UploadResponse = check(
            connection
                .client
                .post(connection.url("/upload"))
                .multipart(form)
                .send()
                .await?,
        )
        .await?
        .json()
        .await?;

        info!(
            "{} {} is available at {}",
            "SUCCESS!".green(),
            response.filename,
            response.download_url.unwrap_or_default().cyan()
        );
        Ok(())
    }
}

impl ListCommand {
    pub async fn run(&self, server: &ServerArgs) -> anyhow::Result<()> {
        let connection = server.connect()?;
        let manifest: ManifestResponse = check(
            connection
                .client
                .get(connection.url("/manifest"))
                .send()
                .await?,
        )
        .await?
        .json()
        .await?;

        if manifest.modpacks.is_empty() {
            info!("No modpacks hosted on {}", connection.server_url);
            return Ok(());
        }
        for entry in manifest.modpacks {
            let uploaded = entry
                .created_at
                .map(|x| x.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            info!(
                "{} {} [Minecraft {}] {} {}",
                entry.id.to_string().cyan(),
                entry.name.bold(),
                entry.minecraft_version.yellow(),
                entry.filename,
                uploaded.dimmed()
            );
        }
        Ok(())
    }
}

impl DeleteCommand {
    pub async fn run(&self, server: &ServerArgs) -> anyhow::Result<()> {
        let connection = server.connect()?;
        let path = format!("/modpacks/{}", urlencoding::encode(&self.filename));
        let _response: DeleteResponse = check(
            connection
                .client
                .delete(connection.url(&path))
                .send()
                .await?,
        )
        .await?
        .json()
        .await?;
        info!("[{}] {} deleted.", "-".red(), self.filename.red());
        Ok(())
    }
}

impl InspectCommand {
    pub async fn run(&self) -> anyhow::Result<()> {
        let filename = file_name(&self.file)?;
        let path = self.file.clone();
        let (descriptor, hash) = {
            let filename = filename.clone();
            tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
                let descriptor = metadata::extract_file(&path, &filename);
                let mut file = std::fs::File::open(&path)?;
                let mut hasher = Sha256::new();
                std::io::copy(&mut file, &mut hasher)?;
                let hash = hasher
                    .finalize()
                    .iter()
                    .map(|x| format!("{:02x}", x))
                    .collect::<Vec<String>>()
                    .join("");
                Ok((descriptor, hash))
            })
            .await??
        };

        info!("File:      {}", filename);
        info!("Id:        {}", ModpackId::from_filename(&filename).to_string().cyan());
        info!("Name:      {}", descriptor.name.bold());
        info!("Minecraft: {}", descriptor.platform_version.yellow());
        info!("Format:    {}", descriptor.format);
        info!("SHA-256:   {}", hash.dimmed());
        Ok(())
    }
}

fn file_name(path: &std::path::Path) -> anyhow::Result<String> {
    path.file_name()
        .and_then(|x| x.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("{} has no usable filename", path.display()))
}
