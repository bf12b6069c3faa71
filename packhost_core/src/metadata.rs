//! Best-effort metadata extraction from modpack archives.
//!
//! A modpack is a zip archive that may carry a Modrinth `modrinth.index.json`
//! or a CurseForge `manifest.json` at its root. Only the descriptor entry is
//! decompressed; the rest of the archive is never read.

use std::{
    fs::File,
    io::{BufReader, Cursor, Read, Seek},
    path::Path,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use zip::{result::ZipError, ZipArchive};

use crate::PackFormat;

pub const DEFAULT_PLATFORM_VERSION: &str = "1.20.1";

pub const MODRINTH_INDEX_FILE: &str = "modrinth.index.json";
pub const CURSEFORGE_MANIFEST_FILE: &str = "manifest.json";

/// Descriptors decompressing past this are treated as malformed.
pub const MAX_DESCRIPTOR_BYTES: u64 = 4 * 1024 * 1024;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ArchiveDescriptor {
    pub name: String,
    pub platform_version: String,
    pub format: PackFormat,
}

impl ArchiveDescriptor {
    /// Descriptor used when the archive tells us nothing.
    pub fn fallback(filename: &str) -> Self {
        Self {
            name: file_stem(filename),
            platform_version: DEFAULT_PLATFORM_VERSION.to_string(),
            format: PackFormat::Unknown,
        }
    }

    fn from_json(data: &Value, version_pointer: &str, format: PackFormat, filename: &str) -> Self {
        Self {
            name: non_empty_str(data.get("name")).unwrap_or_else(|| file_stem(filename)),
            platform_version: non_empty_str(data.pointer(version_pointer))
                .unwrap_or_else(|| DEFAULT_PLATFORM_VERSION.to_string()),
            format,
        }
    }
}

#[derive(thiserror::Error, Debug)]
enum ExtractError {
    #[error("zip error: {0}")]
    Zip(#[from] ZipError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid descriptor json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{entry} exceeds {} bytes", MAX_DESCRIPTOR_BYTES)]
    TooLarge { entry: String },
}

/// Extracts the descriptor from an in-memory archive. Never fails.
pub fn extract(bytes: &[u8], filename: &str) -> ArchiveDescriptor {
    read_descriptor(Cursor::new(bytes), filename)
}

/// Extracts the descriptor from an archive on disk. Never fails.
pub fn extract_file(path: &Path, filename: &str) -> ArchiveDescriptor {
    match File::open(path) {
        Ok(file) => read_descriptor(BufReader::new(file), filename),
        Err(err) => {
            warn!(path = %path.display(), "Cannot open archive: {err}");
            ArchiveDescriptor::fallback(filename)
        }
    }
}

fn read_descriptor<R: Read + Seek>(reader: R, filename: &str) -> ArchiveDescriptor {
    match try_read_descriptor(reader, filename) {
        Ok(Some(descriptor)) => {
            debug!(filename, format = %descriptor.format, "Read modpack descriptor");
            descriptor
        }
        Ok(None) => {
            debug!(filename, "No descriptor in archive, using defaults");
            ArchiveDescriptor::fallback(filename)
        }
        Err(err) => {
            warn!(filename, "Error reading zip metadata: {err}");
            ArchiveDescriptor::fallback(filename)
        }
    }
}

fn try_read_descriptor<R: Read + Seek>(
    reader: R,
    filename: &str,
) -> Result<Option<ArchiveDescriptor>, ExtractError> {
    let mut archive = ZipArchive::new(reader)?;

    // Modrinth wins when both descriptors are present.
    if let Some(data) = read_json_entry(&mut archive, MODRINTH_INDEX_FILE)? {
        return Ok(Some(ArchiveDescriptor::from_json(
            &data,
            "/dependencies/minecraft",
            PackFormat::Modrinth,
            filename,
        )));
    }
    if let Some(data) = read_json_entry(&mut archive, CURSEFORGE_MANIFEST_FILE)? {
        return Ok(Some(ArchiveDescriptor::from_json(
            &data,
            "/minecraft/version",
            PackFormat::CurseForge,
            filename,
        )));
    }
    Ok(None)
}

fn read_json_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    entry_name: &str,
) -> Result<Option<Value>, ExtractError> {
    let mut entry = match archive.by_name(entry_name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let mut raw = Vec::new();
    (&mut entry)
        .take(MAX_DESCRIPTOR_BYTES + 1)
        .read_to_end(&mut raw)?;
    if raw.len() as u64 > MAX_DESCRIPTOR_BYTES {
        return Err(ExtractError::TooLarge {
            entry: entry_name.to_string(),
        });
    }
    let decoded = String::from_utf8_lossy(&raw);
    // Some exporters write a BOM
    let text = decoded.strip_prefix('\u{feff}').unwrap_or(&decoded);
    Ok(Some(serde_json::from_str(text)?))
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Final path component of `filename` with its last extension removed.
pub fn file_stem(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
