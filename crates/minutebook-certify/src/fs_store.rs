// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Filesystem artifact store: `<root>/<namespace>/<path>`.
//
// First-time writes use create-new so two racing certifications of the same
// entry cannot both succeed. Overwrites go through a temp file and a rename,
// so a reader never sees a half-written artifact.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use minutebook_core::error::{MinutebookError, Result};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::ports::{ArtifactStore, WriteOutcome};

pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `namespace/path` under the root, refusing anything that could
    /// escape it.
    fn resolve(&self, namespace: &str, path: &str) -> Result<PathBuf> {
        let mut resolved = self.root.clone();
        for part in [namespace, path] {
            let relative = Path::new(part);
            if part.is_empty()
                || !relative
                    .components()
                    .all(|component| matches!(component, Component::Normal(_)))
            {
                return Err(MinutebookError::Upload(format!(
                    "refusing unsafe artifact location {namespace:?}/{path:?}"
                )));
            }
            resolved.push(relative);
        }
        Ok(resolved)
    }
}

fn upload_err(target: &Path, err: std::io::Error) -> MinutebookError {
    MinutebookError::Upload(format!("{}: {}", target.display(), err))
}

async fn write_new(target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
        .await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

async fn replace(target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let file_name = target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = target.with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4().simple()));

    let written = async {
        write_new(&temp, bytes).await?;
        fs::rename(&temp, target).await
    }
    .await;
    if written.is_err() {
        let _ = fs::remove_file(&temp).await;
    }
    written
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    fn backend_tag(&self) -> &'static str {
        "localfs"
    }

    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    async fn write(
        &self,
        namespace: &str,
        path: &str,
        bytes: &[u8],
        overwrite: bool,
    ) -> Result<WriteOutcome> {
        let target = self.resolve(namespace, path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| upload_err(parent, err))?;
        }

        if overwrite {
            replace(&target, bytes)
                .await
                .map_err(|err| upload_err(&target, err))?;
        } else {
            match write_new(&target, bytes).await {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    debug!(target = %target.display(), "artifact already present");
                    return Ok(WriteOutcome::Conflict);
                }
                Err(err) => {
                    // Do not leave a truncated artifact behind.
                    let _ = fs::remove_file(&target).await;
                    return Err(upload_err(&target, err));
                }
            }
        }

        debug!(target = %target.display(), "artifact written");
        Ok(WriteOutcome::Written)
    }

    async fn exists(&self, namespace: &str, path: &str) -> Result<bool> {
        let target = self.resolve(namespace, path)?;
        Ok(fs::try_exists(&target).await?)
    }

    async fn read(&self, namespace: &str, path: &str) -> Result<Option<Vec<u8>>> {
        let target = self.resolve(namespace, path)?;
        match fs::read(&target).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(MinutebookError::Io(err)),
        }
    }

    #[instrument(skip(self))]
    async fn delete(&self, namespace: &str, path: &str) -> Result<bool> {
        let target = self.resolve(namespace, path)?;
        match fs::remove_file(&target).await {
            Ok(()) => {
                debug!(target = %target.display(), "artifact removed");
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(upload_err(&target, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_new_detects_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());

        let first = store
            .write("governance_certified", "minute-book/e1-abc.pdf", b"first", false)
            .await
            .unwrap();
        let second = store
            .write("governance_certified", "minute-book/e1-abc.pdf", b"second", false)
            .await
            .unwrap();

        assert_eq!(first, WriteOutcome::Written);
        assert_eq!(second, WriteOutcome::Conflict);
        let stored = store
            .read("governance_certified", "minute-book/e1-abc.pdf")
            .await
            .unwrap();
        assert_eq!(stored.as_deref(), Some(&b"first"[..]));
    }

    #[tokio::test]
    async fn overwrite_replaces_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());

        store.write("ns", "a/b.pdf", b"old", false).await.unwrap();
        let outcome = store.write("ns", "a/b.pdf", b"new", true).await.unwrap();
        assert_eq!(outcome, WriteOutcome::Written);
        assert_eq!(store.read("ns", "a/b.pdf").await.unwrap().unwrap(), b"new");

        let entries = std::fs::read_dir(dir.path().join("ns/a")).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[tokio::test]
    async fn missing_artifacts_read_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());

        assert!(!store.exists("ns", "nope.pdf").await.unwrap());
        assert!(store.read("ns", "nope.pdf").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_removes_only_what_exists() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());

        store.write("ns", "a/b.pdf", b"x", false).await.unwrap();
        assert!(store.delete("ns", "a/b.pdf").await.unwrap());
        assert!(!store.exists("ns", "a/b.pdf").await.unwrap());
        assert!(!store.delete("ns", "a/b.pdf").await.unwrap());
        assert!(store.delete("ns", "../b.pdf").await.is_err());
    }

    #[tokio::test]
    async fn paths_cannot_escape_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());

        for (namespace, path) in [("ns", "../escape.pdf"), ("..", "x.pdf"), ("ns", "/etc/passwd"), ("", "x.pdf")] {
            let err = store.write(namespace, path, b"x", true).await.unwrap_err();
            assert_eq!(err.code(), "UPLOAD_FAILED");
        }
    }
}
