//! Filesystem adapter: Implementation of ArtifactStore.
//!
//! Each saved artifact pair gets its own version directory under the store root:
//!
//! ```text
//! <root>/
//!   CURRENT            name of the active version directory
//!   v000001/
//!     encoders.json    field name -> categories in code order
//!     model.json       serialized classifier with its feature schema
//!     manifest.json    SHA-256 of both files, serial, timestamp
//! ```
//!
//! # Atomicity
//!
//! A version is written into a staging directory and renamed into place only
//! once all three files are complete; `CURRENT` is then replaced with an atomic
//! rename. A failure at any point leaves the previously active pair untouched.
//!
//! # Integrity
//!
//! On load, both files are hashed and compared against the manifest before
//! being parsed, so an encoder file from one training run can never be paired
//! with a model from another.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::EncoderSet;
use crate::ports::{ArtifactError, ArtifactInfo, ArtifactStore, PersistedClassifier, StoredArtifact};

/// Manifest format understood by this store.
const MANIFEST_FORMAT_VERSION: u32 = 1;

const CURRENT_FILE: &str = "CURRENT";
const MANIFEST_FILE: &str = "manifest.json";
const MODEL_FILE: &str = "model.json";
const ENCODERS_FILE: &str = "encoders.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ArtifactManifest {
    format_version: u32,
    version: String,
    serial: u64,
    created_at: DateTime<Utc>,
    files: BTreeMap<String, String>,
}

impl ArtifactManifest {
    fn info(&self) -> ArtifactInfo {
        ArtifactInfo {
            version: self.version.clone(),
            serial: self.serial,
            created_at: self.created_at,
        }
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Constant-time string comparison for digests.
fn constant_time_eq_str(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn version_name(serial: u64) -> String {
    format!("v{serial:06}")
}

fn parse_version_name(name: &str) -> Option<u64> {
    name.strip_prefix('v')?.parse().ok()
}

/// Artifact store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    root: PathBuf,
}

impl FileArtifactStore {
    /// Create a store rooted at `root`. The directory is created on first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Highest serial among existing version directories (complete or not).
    fn last_serial(&self) -> Result<u64, ArtifactError> {
        if !self.root.exists() {
            return Ok(0);
        }
        let mut last = 0;
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(serial) = entry.file_name().to_str().and_then(parse_version_name) {
                last = last.max(serial);
            }
        }
        Ok(last)
    }

    fn current_version(&self) -> Result<Option<String>, ArtifactError> {
        let path = self.root.join(CURRENT_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let version = fs::read_to_string(&path)?.trim().to_string();
        if parse_version_name(&version).is_none() {
            return Err(ArtifactError::Integrity(format!(
                "{CURRENT_FILE} names an invalid version '{version}'"
            )));
        }
        Ok(Some(version))
    }

    fn read_manifest(&self, version: &str) -> Result<ArtifactManifest, ArtifactError> {
        let path = self.root.join(version).join(MANIFEST_FILE);
        let bytes = fs::read(&path).map_err(|e| {
            ArtifactError::Integrity(format!("cannot read manifest {}: {e}", path.display()))
        })?;
        let manifest: ArtifactManifest = serde_json::from_slice(&bytes)?;

        if manifest.format_version != MANIFEST_FORMAT_VERSION {
            return Err(ArtifactError::Integrity(format!(
                "unsupported manifest format version {}",
                manifest.format_version
            )));
        }
        if manifest.version != version {
            return Err(ArtifactError::Integrity(format!(
                "manifest describes version '{}' but lives in '{version}'",
                manifest.version
            )));
        }
        Ok(manifest)
    }

    /// Read a file bound by the manifest and verify its digest.
    fn read_verified(
        &self,
        manifest: &ArtifactManifest,
        name: &str,
    ) -> Result<Vec<u8>, ArtifactError> {
        let expected = manifest.files.get(name).ok_or_else(|| {
            ArtifactError::Integrity(format!("manifest does not bind {name}"))
        })?;
        let path = self.root.join(&manifest.version).join(name);
        let bytes = fs::read(&path).map_err(|e| {
            ArtifactError::Integrity(format!("missing artifact file {}: {e}", path.display()))
        })?;
        if !constant_time_eq_str(&sha256_hex(&bytes), expected) {
            return Err(ArtifactError::Integrity(format!("hash mismatch for {name}")));
        }
        Ok(bytes)
    }

    fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> Result<(), ArtifactError> {
        let mut file = fs::File::create(dir.join(name))?;
        file.write_all(bytes)?;
        file.sync_all()?;
        Ok(())
    }
}

impl ArtifactStore for FileArtifactStore {
    fn save<M: PersistedClassifier>(
        &self,
        encoders: &EncoderSet,
        model: &M,
    ) -> Result<ArtifactInfo, ArtifactError> {
        fs::create_dir_all(&self.root)?;

        let encoders_bytes = serde_json::to_vec_pretty(encoders)?;
        let model_bytes = serde_json::to_vec(model)?;

        let serial = self.last_serial()? + 1;
        let version = version_name(serial);
        let manifest = ArtifactManifest {
            format_version: MANIFEST_FORMAT_VERSION,
            version: version.clone(),
            serial,
            created_at: Utc::now(),
            files: BTreeMap::from([
                (ENCODERS_FILE.to_string(), sha256_hex(&encoders_bytes)),
                (MODEL_FILE.to_string(), sha256_hex(&model_bytes)),
            ]),
        };

        // Staging directory is removed on drop if anything below fails
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.root)?;
        Self::write_file(staging.path(), ENCODERS_FILE, &encoders_bytes)?;
        Self::write_file(staging.path(), MODEL_FILE, &model_bytes)?;
        Self::write_file(
            staging.path(),
            MANIFEST_FILE,
            &serde_json::to_vec_pretty(&manifest)?,
        )?;

        let final_dir = self.root.join(&version);
        fs::rename(staging.path(), &final_dir)?;

        let mut pointer = tempfile::NamedTempFile::new_in(&self.root)?;
        pointer.write_all(version.as_bytes())?;
        pointer.as_file().sync_all()?;
        pointer
            .persist(self.root.join(CURRENT_FILE))
            .map_err(|e| ArtifactError::Io(e.error))?;

        tracing::info!(
            "Saved artifact {} ({} vocabularies, model {} bytes)",
            version,
            encoders.len(),
            model_bytes.len()
        );
        Ok(manifest.info())
    }

    fn load<M: PersistedClassifier>(&self) -> Result<StoredArtifact<M>, ArtifactError> {
        let version = self.current_version()?.ok_or_else(|| {
            ArtifactError::NotFound(format!("no active artifact in {}", self.root.display()))
        })?;
        let manifest = self.read_manifest(&version)?;

        let encoders_bytes = self.read_verified(&manifest, ENCODERS_FILE)?;
        let model_bytes = self.read_verified(&manifest, MODEL_FILE)?;

        let encoders: EncoderSet = serde_json::from_slice(&encoders_bytes)?;
        let model: M = serde_json::from_slice(&model_bytes)?;

        tracing::info!(
            "Loaded artifact {} (serial {}, created {})",
            manifest.version,
            manifest.serial,
            manifest.created_at
        );
        Ok(StoredArtifact {
            encoders,
            model,
            info: manifest.info(),
        })
    }

    fn active(&self) -> Result<Option<ArtifactInfo>, ArtifactError> {
        match self.current_version()? {
            Some(version) => Ok(Some(self.read_manifest(&version)?.info())),
            None => Ok(None),
        }
    }
}
