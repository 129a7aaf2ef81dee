use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::constants::{INPUT_DIR, OTHER_DIR, OUTPUT_DIR};
use crate::error::{EtlError, Result};

/// What a storage location is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageRole {
    Input,
    Output,
    Other,
}

impl StorageRole {
    pub const ALL: [StorageRole; 3] = [StorageRole::Input, StorageRole::Output, StorageRole::Other];

    pub fn dir_name(&self) -> &'static str {
        match self {
            StorageRole::Input => INPUT_DIR,
            StorageRole::Output => OUTPUT_DIR,
            StorageRole::Other => OTHER_DIR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageLocation {
    pub role: StorageRole,
    pub path: PathBuf,
}

/// The working volume and the durable workspace tree, each with
/// `input/`, `output/` and `other/` below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    pub volume_root: PathBuf,
    pub workspace_root: PathBuf,
}

impl StorageLayout {
    pub fn new(volume_root: impl Into<PathBuf>, workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            volume_root: volume_root.into(),
            workspace_root: workspace_root.into(),
        }
    }

    pub fn volume(&self, role: StorageRole) -> PathBuf {
        self.volume_root.join(role.dir_name())
    }

    pub fn workspace(&self, role: StorageRole) -> PathBuf {
        self.workspace_root.join(role.dir_name())
    }

    /// Volume locations the preparer must create.
    pub fn locations(&self) -> Vec<StorageLocation> {
        StorageRole::ALL
            .iter()
            .map(|role| StorageLocation {
                role: *role,
                path: self.volume(*role),
            })
            .collect()
    }
}

pub struct StoragePreparer;

impl StoragePreparer {
    /// Creates every location (and missing parents). Existing directories are left
    /// untouched, so running it twice is harmless.
    pub fn prepare(locations: &[StorageLocation]) -> Result<Vec<PathBuf>> {
        let mut prepared = Vec::with_capacity(locations.len());
        for location in locations {
            let path = &location.path;
            if path.exists() && !path.is_dir() {
                return Err(EtlError::Setup {
                    path: path.clone(),
                    source: io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        "path exists and is not a directory",
                    ),
                });
            }
            fs::create_dir_all(path).map_err(|source| EtlError::Setup {
                path: path.clone(),
                source,
            })?;
            debug!("📁 {:?} location ready at {}", location.role, path.display());
            prepared.push(path.clone());
        }
        Ok(prepared)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyReceipt {
    pub source: PathBuf,
    pub target: PathBuf,
    pub bytes: u64,
    pub sha256: String,
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Copies one file, creating the target's parent, and checks the written bytes
/// hash to the same SHA-256 as the source.
pub fn copy_verified(source: &Path, target: &Path) -> Result<CopyReceipt> {
    if !source.exists() {
        return Err(EtlError::SourceMissing(source.to_path_buf()));
    }
    if !source.is_file() {
        return Err(EtlError::extract(source, "source is not a regular file"));
    }
    let content = fs::read(source)?;
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| EtlError::extract(target, e))?;
    }
    fs::write(target, &content).map_err(|e| EtlError::extract(target, e))?;

    let expected = sha256_hex(&content);
    let written = sha256_hex(&fs::read(target)?);
    if expected != written {
        return Err(EtlError::extract(
            target,
            format!("checksum mismatch: source {} but target {}", expected, written),
        ));
    }
    Ok(CopyReceipt {
        source: source.to_path_buf(),
        target: target.to_path_buf(),
        bytes: content.len() as u64,
        sha256: expected,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Synced { files: usize, bytes: u64 },
    SourceMissing,
}

/// Replaces `dest` with a copy of the `source` tree.
///
/// The copy is staged in a hidden sibling of `dest` and renamed into place once
/// complete, so a failed copy leaves the previous `dest` intact and stale files
/// never survive alongside new ones. A missing source is reported, not an error.
pub fn sync_tree(source: &Path, dest: &Path) -> Result<SyncOutcome> {
    if !source.is_dir() {
        warn!("❌ Source folder not found: {}", source.display());
        return Ok(SyncOutcome::SourceMissing);
    }
    if overlaps(source, dest) {
        return Err(EtlError::config(format!(
            "cannot sync '{}' into '{}': one contains the other",
            source.display(),
            dest.display()
        )));
    }
    let dest_name = dest
        .file_name()
        .ok_or_else(|| EtlError::config(format!("sync destination '{}' has no name", dest.display())))?
        .to_string_lossy()
        .into_owned();
    let parent = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| EtlError::load(parent, e))?;

    let staging = parent.join(format!(".{}.staging-{}", dest_name, Uuid::new_v4().simple()));
    let (files, bytes) = match copy_tree(source, &staging) {
        Ok(copied) => copied,
        Err(e) => {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }
    };

    if dest.is_dir() {
        fs::remove_dir_all(dest).map_err(|e| EtlError::load(dest, e))?;
    } else if dest.exists() {
        fs::remove_file(dest).map_err(|e| EtlError::load(dest, e))?;
    }
    fs::rename(&staging, dest).map_err(|e| EtlError::load(dest, e))?;

    info!(
        "🎉 Synced {} files ({} bytes) from {} to {}",
        files,
        bytes,
        source.display(),
        dest.display()
    );
    Ok(SyncOutcome::Synced { files, bytes })
}

/// True when either path lies inside the other, comparing resolved paths where
/// they exist.
fn overlaps(source: &Path, dest: &Path) -> bool {
    if dest.starts_with(source) || source.starts_with(dest) {
        return true;
    }
    let Ok(source) = source.canonicalize() else {
        return false;
    };
    let resolved_dest = dest.canonicalize().ok().or_else(|| {
        let name = dest.file_name()?;
        Some(dest.parent()?.canonicalize().ok()?.join(name))
    });
    resolved_dest.is_some_and(|dest| dest.starts_with(&source) || source.starts_with(&dest))
}

fn copy_tree(source: &Path, dest: &Path) -> Result<(usize, u64)> {
    fs::create_dir_all(dest).map_err(|e| EtlError::load(dest, e))?;
    let mut files = 0;
    let mut bytes = 0;
    for entry in WalkDir::new(source).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| EtlError::load(entry.path(), e))?;
        let target = dest.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| EtlError::load(&target, e))?;
        } else if entry.file_type().is_file() {
            bytes += fs::copy(entry.path(), &target).map_err(|e| EtlError::load(&target, e))?;
            files += 1;
        }
    }
    Ok((files, bytes))
}
