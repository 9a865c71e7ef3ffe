//! Durable model artifacts
//!
//! An artifact is a bincode envelope holding a magic tag, a format version,
//! the SHA256 checksum of the payload and the payload itself. Writes go to a
//! temporary file that is synced and renamed over the target, so readers
//! never observe a half-written artifact.

use crate::error::{EstimationError, Result};
use bincode::Options;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Tag identifying an estimation model artifact
const ARTIFACT_MAGIC: [u8; 5] = *b"PMEST";

/// Current envelope layout
pub const FORMAT_VERSION: u32 = 1;

/// Largest artifact accepted on load (64MB)
pub const MAX_ARTIFACT_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Debug, Serialize, Deserialize)]
struct ArtifactEnvelope {
    magic: [u8; 5],
    format_version: u32,
    checksum: String,
    payload: Vec<u8>,
}

/// Details of a written artifact
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactInfo {
    pub path: PathBuf,
    pub checksum: String,
    pub size_bytes: usize,
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new().with_limit(MAX_ARTIFACT_BYTES)
}

fn persistence_error(context: &str, path: &Path, err: impl std::fmt::Display) -> EstimationError {
    EstimationError::Persistence(format!("{} {:?}: {}", context, path, err))
}

/// Serialize `value` and write it to `path` atomically
pub fn write_artifact<T: Serialize>(path: &Path, value: &T) -> Result<ArtifactInfo> {
    let payload = codec()
        .serialize(value)
        .map_err(|e| persistence_error("Failed to encode model for", path, e))?;
    let checksum = compute_checksum(&payload);

    let envelope = ArtifactEnvelope {
        magic: ARTIFACT_MAGIC,
        format_version: FORMAT_VERSION,
        checksum: checksum.clone(),
        payload,
    };
    let bytes = codec()
        .serialize(&envelope)
        .map_err(|e| persistence_error("Failed to encode artifact for", path, e))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| persistence_error("Failed to create model directory for", path, e))?;
    }

    let temp_path = path.with_extension("tmp");
    if let Err(e) = write_and_replace(&temp_path, path, &bytes) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    debug!(path = %path.display(), size_bytes = bytes.len(), "Artifact written");

    Ok(ArtifactInfo {
        path: path.to_path_buf(),
        checksum,
        size_bytes: bytes.len(),
    })
}

fn write_and_replace(temp_path: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(temp_path)
        .map_err(|e| persistence_error("Failed to create temp model file", temp_path, e))?;
    file.write_all(bytes)
        .map_err(|e| persistence_error("Failed to write model file", temp_path, e))?;
    file.sync_all()
        .map_err(|e| persistence_error("Failed to sync model file", temp_path, e))?;
    fs::rename(temp_path, path)
        .map_err(|e| persistence_error("Failed to move model file into place", path, e))
}

/// Read and verify an artifact written by `write_artifact`
pub fn read_artifact<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(EstimationError::Persistence(format!(
            "Model artifact not found: {:?}",
            path
        )));
    }

    let size = fs::metadata(path)
        .map_err(|e| persistence_error("Failed to stat model file", path, e))?
        .len();
    if size > MAX_ARTIFACT_BYTES {
        return Err(EstimationError::Persistence(format!(
            "Model artifact {:?} is {} bytes, exceeds maximum {}",
            path, size, MAX_ARTIFACT_BYTES
        )));
    }

    let bytes = fs::read(path).map_err(|e| persistence_error("Failed to read model file", path, e))?;
    let envelope: ArtifactEnvelope = codec()
        .deserialize(&bytes)
        .map_err(|e| persistence_error("Corrupt model artifact", path, e))?;

    if envelope.magic != ARTIFACT_MAGIC {
        return Err(EstimationError::Persistence(format!(
            "{:?} is not an estimation model artifact",
            path
        )));
    }
    if envelope.format_version != FORMAT_VERSION {
        return Err(EstimationError::Persistence(format!(
            "Unsupported artifact version {} in {:?}, expected {}",
            envelope.format_version, path, FORMAT_VERSION
        )));
    }

    let computed = compute_checksum(&envelope.payload);
    if computed != envelope.checksum {
        return Err(EstimationError::Persistence(format!(
            "Checksum mismatch in {:?}: expected {}, got {}",
            path, envelope.checksum, computed
        )));
    }

    codec()
        .deserialize(&envelope.payload)
        .map_err(|e| persistence_error("Incompatible model payload in", path, e))
}

/// Compute SHA256 checksum of data
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
