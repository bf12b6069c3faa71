use std::path::{Path, PathBuf};

use clap::Parser;
use colored::Colorize;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use packhost_core::{
    api::{CatalogEntry, ManifestResponse},
    metadata,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

/// Download modpacks from a packhost server
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Server base URL
    #[arg(long, env = "PACKHOST_SERVER")]
    server: Option<String>,

    /// Directory downloaded packs are saved to
    #[arg(short = 'd', long, default_value = "modpacks")]
    dir: PathBuf,

    /// Id or filename of the pack to download; lists packs when omitted
    pack: Option<String>,
}

/// Shares `packhost.toml` with the admin CLI; only the server is read here.
#[derive(Serialize, Deserialize, Default)]
pub struct Config {
    pub server_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    pretty_env_logger::init();

    if let Err(err) = run(Args::parse()).await {
        error!("{} {}", "Error:".bright_red(), err);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = match tokio::fs::read_to_string("packhost.toml").await {
        Ok(text) => toml::from_str::<Config>(&text)?,
        Err(_) => Config::default(),
    };
    let server_url = args
        .server
        .or(config.server_url)
        .ok_or_else(|| anyhow::anyhow!("No server set, pass --server or add server_url to packhost.toml"))?;
    let server_url = server_url.trim_end_matches('/');

    let client = Client::new();
    let manifest: ManifestResponse = client
        .get(format!("{}/manifest", server_url))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let Some(query) = args.pack else {
        info!("{}", format!("{} modpacks on {}", manifest.modpacks.len(), server_url).italic());
        for entry in &manifest.modpacks {
            info!(
                "{} {} [Minecraft {}]",
                entry.id.to_string().cyan(),
                entry.name,
                entry.minecraft_version.yellow()
            );
        }
        return Ok(());
    };

    let entry = find_modpack(&manifest.modpacks, &query)
        .ok_or_else(|| anyhow::anyhow!("No modpack {query:?} on {server_url}"))?;
    let target = destination(&args.dir, entry);

    info!("[{}] Downloading {}...", "+".green(), entry.name.green());
    download_file(&client, &entry.download_url, &target).await?;

    let descriptor = {
        let path = target.clone();
        let filename = entry.filename.clone();
        tokio::task::spawn_blocking(move || metadata::extract_file(&path, &filename)).await?
    };
    if descriptor.platform_version != entry.minecraft_version {
        warn!(
            "Archive targets Minecraft {} but the server lists {}",
            descriptor.platform_version, entry.minecraft_version
        );
    }
    info!(
        "{} {} for Minecraft {} saved to {}",
        "Done!".green(),
        descriptor.name,
        descriptor.platform_version,
        target.display()
    );

    Ok(())
}

/// Matches on id first, then on the exact filename.
fn find_modpack<'a>(modpacks: &'a [CatalogEntry], query: &str) -> Option<&'a CatalogEntry> {
    modpacks
        .iter()
        .find(|x| x.id.0 == query)
        .or_else(|| modpacks.iter().find(|x| x.filename == query))
}

fn destination(dir: &Path, entry: &CatalogEntry) -> PathBuf {
    let extension = Path::new(&entry.filename)
        .extension()
        .and_then(|x| x.to_str())
        .unwrap_or("zip");
    dir.join(format!("{}.{}", entry.id, extension))
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

pub async fn download_file(client: &Client, url: &str, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let response = client.get(url).send().await?.error_for_status()?;
    let total_size = response.content_length();

    let bar = if let Some(size) = total_size {
        let bar = ProgressBar::new(size);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:.cyan/blue}] {bytes}/{total_bytes}")?
                .progress_chars("#>-")
        );
        bar
    } else {
        ProgressBar::new_spinner()
    };

    // Streamed into a sibling .part file, renamed once complete
    let partial = part_path(path);
    let mut file = tokio::fs::File::create(&partial).await?;
    let mut file_stream = response.bytes_stream();
    while let Some(chunk) = file_stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        bar.inc(chunk.len() as u64);
    }
    file.flush().await?;
    drop(file);
    tokio::fs::rename(&partial, path).await?;

    bar.finish();

    Ok(())
}
