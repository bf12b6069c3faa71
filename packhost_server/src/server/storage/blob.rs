//! Minimal client for an HTTP blob store speaking the Vercel Blob protocol.

use axum::body::Bytes;
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::server::config::BlobConfig;

const BLOB_API_VERSION: &str = "7";

#[derive(thiserror::Error, Debug)]
pub enum BlobError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("blob store answered {status}: {body}")]
    Rejected { status: StatusCode, body: String },
    #[error("invalid blob token")]
    InvalidToken(#[from] header::InvalidHeaderValue),
}

#[derive(Serialize, Deserialize, Debug)]
pub struct PutBlobResponse {
    /// Public URL of the stored blob
    pub url: String,
}

#[derive(Serialize)]
struct DeleteBlobBody<'a> {
    urls: [&'a str; 1],
}

#[derive(Clone)]
pub struct BlobClient {
    client: Client,
    api_url: String,
}

impl BlobClient {
    pub fn new(config: &BlobConfig) -> Result<Self, BlobError> {
        let mut auth_value = header::HeaderValue::from_str(&format!("Bearer {}", config.token))?;
        auth_value.set_sensitive(true);
        let mut default_headers = header::HeaderMap::new();
        default_headers.append(header::AUTHORIZATION, auth_value);
        default_headers.append(
            "x-api-version",
            header::HeaderValue::from_static(BLOB_API_VERSION),
        );
        let client = Client::builder().default_headers(default_headers).build()?;
        Ok(Self {
            client,
            api_url: config.api_url.clone(),
        })
    }

    /// URL a blob named `pathname` is written to. Each segment is percent-encoded.
    pub fn object_url(&self, pathname: &str) -> String {
        let encoded = pathname
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<String>>()
            .join("/");
        format!("{}/{}", self.api_url, encoded)
    }

    /// Stores `data` publicly under `pathname`, replacing any blob already there.
    pub async fn put(
        &self,
        pathname: &str,
        content_type: Option<&str>,
        data: Bytes,
    ) -> Result<PutBlobResponse, BlobError> {
        let mut request = self
            .client
            .put(self.object_url(pathname))
            .header("x-add-random-suffix", "0")
            .header("x-allow-overwrite", "1");
        if let Some(content_type) = content_type {
            request = request.header("x-content-type", content_type);
        }
        let response = request.body(data).send().await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn delete(&self, url: &str) -> Result<(), BlobError> {
        let response = self
            .client
            .post(format!("{}/delete", self.api_url))
            .json(&DeleteBlobBody { urls: [url] })
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, BlobError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BlobError::Rejected { status, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_url_encodes_segments() {
        let client = BlobClient::new(&BlobConfig {
            api_url: "https://blob.example.com".to_string(),
            token: "token".to_string(),
        })
        .unwrap();
        assert_eq!(
            client.object_url("modpacks/My Pack.zip"),
            "https://blob.example.com/modpacks/My%20Pack.zip"
        );
    }

    #[test]
    fn rejects_token_with_newline() {
        let result = BlobClient::new(&BlobConfig {
            api_url: "https://blob.example.com".to_string(),
            token: "bad\ntoken".to_string(),
        });
        assert!(matches!(result, Err(BlobError::InvalidToken(_))));
    }

    #[test]
    fn parses_put_response() {
        let response: PutBlobResponse = serde_json::from_str(
            r#"{"url":"https://store.public.blob.example.com/modpacks/a.zip","pathname":"modpacks/a.zip","contentType":"application/zip"}"#,
        )
        .unwrap();
        assert_eq!(response.url, "https://store.public.blob.example.com/modpacks/a.zip");
    }
}
