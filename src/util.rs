use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub fn display_path(path: &Path, base: Option<&Path>) -> String {
    if let Some(base) = base {
        if let Ok(relative) = path.strip_prefix(base) {
            return relative.display().to_string();
        }
    }
    path.display().to_string()
}

/// Run stamp used in output file names.
pub fn run_stamp(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d_%H%M%S").to_string()
}

/// Hash the relative names and contents of input files, order-independent.
pub fn hash_files(root: &Path, paths: &[PathBuf]) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut sorted = paths.to_vec();
    sorted.sort();
    sorted.dedup();
    for path in sorted {
        let rel = path.strip_prefix(root).unwrap_or(&path);
        hasher.update(b"file:");
        hasher.update(rel.to_string_lossy().as_bytes());
        let bytes = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
        hasher.update(&bytes);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Write bytes next to `dest` and atomically rename them into place.
pub fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<()> {
    let parent = dest
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("create temp file in {}", parent.display()))?;
    tmp.write_all(bytes)
        .with_context(|| format!("write {}", dest.display()))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("sync {}", dest.display()))?;
    tmp.persist(dest)
        .map_err(|err| anyhow!(err.error))
        .with_context(|| format!("publish {}", dest.display()))?;
    Ok(())
}
