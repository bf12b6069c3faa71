use std::path::Path;

use anyhow::{anyhow, Context};
use clap::Args;
use packhost_core::api::ErrorResponse;
use reqwest::{header, Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "packhost.toml";

#[derive(Args, Debug)]
pub struct ServerArgs {
    /// Server base URL, e.g. https://packs.example.com
    #[arg(long, env = "PACKHOST_SERVER", global = true)]
    server: Option<String>,

    /// Master key for uploads and deletes
    #[arg(long, env = "PACKHOST_KEY", global = true, hide_env_values = true)]
    key: Option<String>,
}

/// `packhost.toml` in the working directory
#[derive(Serialize, Deserialize, Default)]
pub struct CliConfig {
    pub server_url: Option<String>,
    pub api_key: Option<String>,
}

pub struct Connection {
    pub client: Client,
    pub server_url: String,
}

impl ServerArgs {
    pub fn connect(&self) -> anyhow::Result<Connection> {
        let config = read_config(Path::new(CONFIG_FILE))?;
        let server_url = self
            .server
            .clone()
            .or(config.server_url)
            .ok_or_else(|| anyhow!("No server set, pass --server or add server_url to {CONFIG_FILE}"))?;
        let api_key = self.key.clone().or(config.api_key);

        let mut default_headers = header::HeaderMap::new();
        if let Some(api_key) = api_key {
            let mut auth_value = header::HeaderValue::from_str(&format!("Bearer {}", api_key))?;
            auth_value.set_sensitive(true);
            default_headers.append(header::AUTHORIZATION, auth_value);
        }
        let client = Client::builder()
            .default_headers(default_headers)
            .build()?;

        Ok(Connection {
            client,
            server_url: server_url.trim_end_matches('/').to_string(),
        })
    }
}

impl Connection {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.server_url, path)
    }
}

pub fn read_config(path: &Path) -> anyhow::Result<CliConfig> {
    match std::fs::read_to_string(path) {
        Ok(text) => toml::from_str(&text).with_context(|| format!("Invalid {}", path.display())),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(CliConfig::default()),
        Err(err) => Err(err.into()),
    }
}

/// Turns a non-2xx response into an error carrying the server's message.
pub async fn check(response: Response) -> anyhow::Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(anyhow!("Invalid API key"));
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|x| x.message)
        .unwrap_or(body);
    Err(anyhow!("Server answered {}: {}", status, message))
}
