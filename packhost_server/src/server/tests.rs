//! Router tests against a disk-backed store in a temporary directory.
//!
//! Requests go through `tower::ServiceExt::oneshot()`, so no socket is opened.

use std::{io::Write, path::PathBuf, sync::Arc, time::Duration};

use axum::{
    body::{Body, Bytes},
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use zip::{write::SimpleFileOptions, ZipWriter};

use super::{
    config::{ServerConfig, StorageConfig},
    router,
    storage::{disk::DiskStorage, Storage},
    AppState,
};

const PUBLIC_URL: &str = "http://packs.test";
const BOUNDARY: &str = "packhost-test-boundary";

struct TestApp {
    router: Router,
    storage_dir: TempDir,
    public_dir: TempDir,
}

fn make_app(master_key: Option<&str>) -> TestApp {
    let storage_dir = tempfile::tempdir().unwrap();
    let public_dir = tempfile::tempdir().unwrap();
    let config = ServerConfig {
        port: 0,
        public_directory: public_dir.path().to_path_buf(),
        public_url: PUBLIC_URL.to_string(),
        master_key: master_key.map(str::to_string),
        max_upload_bytes: 1024 * 1024,
        timeout: Duration::from_secs(10),
        storage: StorageConfig::Local {
            directory: storage_dir.path().to_path_buf(),
        },
    };
    let storage = Storage::Disk(DiskStorage::new(storage_dir.path().to_path_buf(), PUBLIC_URL));
    let router = router(Arc::new(AppState { config, storage }));
    TestApp {
        router,
        storage_dir,
        public_dir,
    }
}

impl TestApp {
    async fn send(&self, req: Request<Body>) -> (StatusCode, Bytes) {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, body)
    }

    fn stored(&self, filename: &str) -> PathBuf {
        self.storage_dir.path().join(filename)
    }
}

fn archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, data) in entries {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(data.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn curseforge_pack(name: &str, version: &str) -> Vec<u8> {
    let manifest = format!(r#"{{"name":"{name}","minecraft":{{"version":"{version}"}}}}"#);
    archive(&[("manifest.json", manifest.as_str())])
}

fn multipart_req(field: &str, filename: &str, data: &[u8], bearer: Option<&str>) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/zip\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body)).unwrap()
}

fn empty_req(method: Method, uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn json_body(body: &[u8]) -> Value {
    serde_json::from_slice(body).expect("response is not valid JSON")
}

async fn manifest_entries(app: &TestApp, uri: &str) -> Vec<Value> {
    let (status, body) = app.send(empty_req(Method::GET, uri, None)).await;
    assert_eq!(status, StatusCode::OK);
    json_body(&body)["modpacks"]
        .as_array()
        .expect("modpacks is an array")
        .clone()
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

#[tokio::test]
async fn upload_then_manifest_lists_entry_once() {
    let app = make_app(None);
    let (status, body) = app
        .send(multipart_req("modpack", "My Pack.zip", &curseforge_pack("My Pack", "1.19.2"), None))
        .await;
    assert_eq!(status, StatusCode::OK);
    let j = json_body(&body);
    assert_eq!(j["message"], "Uploaded!");
    assert_eq!(j["filename"], "My Pack.zip");
    assert_eq!(j["downloadUrl"], "http://packs.test/modpacks/My%20Pack.zip");
    assert!(app.stored("My Pack.zip").is_file());

    for uri in ["/manifest", "/modpacks.json"] {
        let entries = manifest_entries(&app, uri).await;
        let matching: Vec<&Value> = entries
            .iter()
            .filter(|x| x["filename"] == "My Pack.zip")
            .collect();
        assert_eq!(matching.len(), 1);
        let entry = matching[0];
        assert_eq!(entry["id"], "My-Pack");
        assert_eq!(entry["name"], "My Pack");
        assert_eq!(entry["version"], "1.0.0");
        assert_eq!(entry["minecraftVersion"], "1.19.2");
        assert_eq!(entry["description"], "Hosted modpack: My Pack");
        assert_eq!(entry["downloadUrl"], "http://packs.test/modpacks/My%20Pack.zip");
    }
}

#[tokio::test]
async fn reupload_replaces_entry() {
    let app = make_app(None);
    app.send(multipart_req("modpack", "pack.zip", &curseforge_pack("First", "1.18.2"), None))
        .await;
    let (status, _) = app
        .send(multipart_req("modpack", "pack.zip", &curseforge_pack("Second", "1.20.4"), None))
        .await;
    assert_eq!(status, StatusCode::OK);

    let entries = manifest_entries(&app, "/manifest").await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["name"], "Second");
    assert_eq!(entries[0]["minecraftVersion"], "1.20.4");
}

#[tokio::test]
async fn upload_of_unreadable_archive_uses_defaults() {
    let app = make_app(None);
    let (status, _) = app
        .send(multipart_req("modpack", "Weird Pack.mrpack", b"garbage", None))
        .await;
    assert_eq!(status, StatusCode::OK);

    let entries = manifest_entries(&app, "/manifest").await;
    assert_eq!(entries[0]["name"], "Weird Pack");
    assert_eq!(entries[0]["minecraftVersion"], "1.20.1");
    assert_eq!(entries[0]["id"], "Weird-Pack");
}

#[tokio::test]
async fn upload_without_file_is_bad_request() {
    let app = make_app(None);
    let (status, body) = app
        .send(multipart_req("attachment", "pack.zip", b"data", None))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&body)["error"], "NO_FILE");

    let req = Request::builder()
        .method(Method::POST)
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(format!("--{BOUNDARY}--\r\n")))
        .unwrap();
    let (status, _) = app.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_keeps_only_final_path_component() {
    let app = make_app(None);
    let (status, body) = app
        .send(multipart_req("modpack", "../../evil.zip", b"data", None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["filename"], "evil.zip");
    assert!(app.stored("evil.zip").is_file());

    let (status, _) = app
        .send(multipart_req("modpack", "uploads/..", b"data", None))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_extension_matches_manifest_listing() {
    let app = make_app(None);
    let (status, body) = app
        .send(multipart_req("modpack", "PACK.ZIP", &curseforge_pack("Loud", "1.20.4"), None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["filename"], "PACK.ZIP");

    let entries = manifest_entries(&app, "/manifest").await;
    let listed: Vec<&Value> = entries.iter().filter(|x| x["filename"] == "PACK.ZIP").collect();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["name"], "Loud");

    for name in ["pack.7z", ".zip", "noext"] {
        let (status, body) = app.send(multipart_req("modpack", name, b"data", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{name}");
        assert_eq!(json_body(&body)["error"], "INVALID_FILENAME");
        assert!(!app.stored(name).exists());
    }
    assert_eq!(manifest_entries(&app, "/manifest").await.len(), 1);
}

// ---------------------------------------------------------------------------
// Manifest, download, delete
// ---------------------------------------------------------------------------

#[tokio::test]
async fn manifest_ignores_other_files() {
    let app = make_app(None);
    std::fs::write(app.stored("readme.txt"), "hello").unwrap();
    std::fs::write(app.stored("loose.mrpack"), b"x").unwrap();

    let entries = manifest_entries(&app, "/manifest").await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["filename"], "loose.mrpack");
}

#[tokio::test]
async fn download_serves_stored_file() {
    let app = make_app(None);
    let data = curseforge_pack("Served", "1.20.1");
    app.send(multipart_req("modpack", "served.zip", &data, None))
        .await;

    let (status, body) = app
        .send(empty_req(Method::GET, "/modpacks/served.zip", None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], data.as_slice());

    let (status, _) = app
        .send(empty_req(Method::GET, "/modpacks/missing.zip", None))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_removes_entry_then_404s() {
    let app = make_app(None);
    app.send(multipart_req("modpack", "My Pack.zip", &curseforge_pack("My Pack", "1.19.2"), None))
        .await;

    let (status, body) = app
        .send(empty_req(Method::DELETE, "/modpacks/My%20Pack.zip", None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["success"], true);
    assert!(!app.stored("My Pack.zip").exists());
    assert!(manifest_entries(&app, "/manifest").await.is_empty());

    let (status, body) = app
        .send(empty_req(Method::DELETE, "/modpacks/My%20Pack.zip", None))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json_body(&body)["error"], "NOT_FOUND");
}

#[tokio::test]
async fn delete_rejects_traversal() {
    let app = make_app(None);
    let (status, _) = app
        .send(empty_req(Method::DELETE, "/modpacks/..%2Fsecret.zip", None))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Master key
// ---------------------------------------------------------------------------

#[tokio::test]
async fn master_key_guards_upload_and_delete() {
    let app = make_app(Some("hunter2"));
    let data = curseforge_pack("Locked", "1.20.1");

    let (status, _) = app.send(multipart_req("modpack", "locked.zip", &data, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .send(multipart_req("modpack", "locked.zip", &data, Some("wrong")))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .send(multipart_req("modpack", "locked.zip", &data, Some("hunter2")))
        .await;
    assert_eq!(status, StatusCode::OK);

    // Listing stays public
    assert_eq!(manifest_entries(&app, "/manifest").await.len(), 1);

    let (status, _) = app
        .send(empty_req(Method::DELETE, "/modpacks/locked.zip", None))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .send(empty_req(Method::DELETE, "/modpacks/locked.zip", Some("hunter2")))
        .await;
    assert_eq!(status, StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Static files
// ---------------------------------------------------------------------------

#[tokio::test]
async fn serves_public_directory() {
    let app = make_app(None);
    std::fs::write(app.public_dir.path().join("index.html"), "<h1>packs</h1>").unwrap();

    let (status, body) = app
        .send(empty_req(Method::GET, "/index.html", None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"<h1>packs</h1>");

    let (status, body) = app.send(empty_req(Method::GET, "/", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8_lossy(&body).starts_with("Packhost server v"));
}
