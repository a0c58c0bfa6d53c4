//! Staged, transactional publishing of report outputs.
//!
//! Outputs are written under `<output>/.txns/<stamp>/staged` first and only
//! moved into the output directory once every file rendered successfully.
use crate::util::write_atomic;
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// One run's staging area.
#[derive(Debug)]
pub struct Staging {
    txn_root: PathBuf,
    staged_root: PathBuf,
    files: Vec<String>,
}

impl Staging {
    /// Create (or reset) the staging directory for a transaction.
    pub fn begin(txn_root: PathBuf) -> Result<Self> {
        if txn_root.exists() {
            fs::remove_dir_all(&txn_root)
                .with_context(|| format!("reset {}", txn_root.display()))?;
        }
        let staged_root = txn_root.join("staged");
        fs::create_dir_all(&staged_root)
            .with_context(|| format!("create {}", staged_root.display()))?;
        Ok(Self {
            txn_root,
            staged_root,
            files: Vec::new(),
        })
    }

    pub fn write_bytes(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.staged_root.join(name);
        fs::write(&path, bytes).with_context(|| format!("write {}", path.display()))?;
        self.files.push(name.to_string());
        Ok(())
    }

    pub fn write_json<T: serde::Serialize>(&mut self, name: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value).context("serialize staged JSON")?;
        self.write_bytes(name, &bytes)
    }

    /// Move staged files into `dest_root`, restoring any replaced files when a
    /// publish step fails. The transaction directory is removed on success.
    pub fn publish(self, dest_root: &Path) -> Result<Vec<PathBuf>> {
        let backup_root = self.txn_root.join("backup");
        let mut published: Vec<PathBuf> = Vec::new();
        let mut backups: Vec<(PathBuf, PathBuf)> = Vec::new();
        for name in &self.files {
            let dest = dest_root.join(name);
            let outcome = self.publish_one(name, &dest, &backup_root, &mut backups);
            if let Err(err) = outcome {
                rollback(&published, &backups);
                return Err(err);
            }
            published.push(dest);
        }
        fs::remove_dir_all(&self.txn_root)
            .with_context(|| format!("remove {}", self.txn_root.display()))?;
        if let Some(txns) = self.txn_root.parent() {
            let empty = fs::read_dir(txns)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(false);
            if empty {
                let _ = fs::remove_dir(txns);
            }
        }
        Ok(published)
    }

    fn publish_one(
        &self,
        name: &str,
        dest: &Path,
        backup_root: &Path,
        backups: &mut Vec<(PathBuf, PathBuf)>,
    ) -> Result<()> {
        if dest.exists() {
            fs::create_dir_all(backup_root)
                .with_context(|| format!("create {}", backup_root.display()))?;
            let backup = backup_root.join(name);
            fs::copy(dest, &backup).with_context(|| format!("backup {}", dest.display()))?;
            backups.push((dest.to_path_buf(), backup));
        }
        let staged = self.staged_root.join(name);
        let bytes = fs::read(&staged).with_context(|| format!("read {}", staged.display()))?;
        write_atomic(dest, &bytes)
    }

    #[cfg(test)]
    pub fn staged_root(&self) -> &Path {
        &self.staged_root
    }
}

fn rollback(published: &[PathBuf], backups: &[(PathBuf, PathBuf)]) {
    for path in published {
        let restored = backups.iter().find(|(dest, _)| dest == path);
        let outcome = match restored {
            Some((dest, backup)) => fs::copy(backup, dest).map(|_| ()),
            None => fs::remove_file(path),
        };
        if let Err(err) = outcome {
            tracing::warn!(path = %path.display(), error = %err, "rollback failed");
        }
    }
}

/// Fail early when the output root cannot hold a staging directory.
pub fn ensure_output_root(root: &Path) -> Result<()> {
    if root.exists() && !root.is_dir() {
        return Err(anyhow!("output path {} is not a directory", root.display()));
    }
    fs::create_dir_all(root).with_context(|| format!("create {}", root.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_moves_files_and_removes_transaction() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let out = dir.path().join("reports");
        ensure_output_root(&out).expect("output root");
        fs::write(out.join("a.csv"), "old").expect("seed existing");
        let txn = out.join(".txns").join("20240501_000000");
        let mut staging = Staging::begin(txn.clone()).expect("begin");
        staging.write_bytes("a.csv", b"new").expect("stage a");
        staging
            .write_json("b.json", &serde_json::json!({"ok": true}))
            .expect("stage b");
        let published = staging.publish(&out).expect("publish");
        assert_eq!(published.len(), 2);
        assert_eq!(fs::read_to_string(out.join("a.csv")).expect("read a"), "new");
        assert!(out.join("b.json").is_file());
        assert!(!txn.exists());
        assert!(!out.join(".txns").exists());
    }

    #[test]
    fn unpublished_staging_leaves_outputs_untouched() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let out = dir.path().join("reports");
        let mut staging = Staging::begin(out.join(".txns").join("s")).expect("begin");
        staging.write_bytes("a.csv", b"data").expect("stage");
        assert!(staging.staged_root().join("a.csv").is_file());
        drop(staging);
        assert!(!out.join("a.csv").exists());
    }

    #[test]
    fn failed_publish_rolls_back_earlier_files() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let out = dir.path().join("reports");
        ensure_output_root(&out).expect("output root");
        fs::write(out.join("a.csv"), "old").expect("seed existing");
        // A directory in place of the second output makes its publish fail.
        fs::create_dir_all(out.join("b.json").join("blocker")).expect("blocker");
        let mut staging = Staging::begin(out.join(".txns").join("s")).expect("begin");
        staging.write_bytes("a.csv", b"new").expect("stage a");
        staging.write_bytes("b.json", b"{}").expect("stage b");
        assert!(staging.publish(&out).is_err());
        assert_eq!(fs::read_to_string(out.join("a.csv")).expect("read a"), "old");
    }

    #[test]
    fn output_root_must_be_a_directory() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let file = dir.path().join("reports");
        fs::write(&file, "").expect("write file");
        assert!(ensure_output_root(&file).is_err());
    }
}
