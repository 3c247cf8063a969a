// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Filesystem source repository.
//
// Each entry is described by `<root>/<entry_id>.json`:
//
//   {
//     "path": "2026/board-0302.pdf",     -- relative to <root>
//     "entity_label": "Northwind Trading Inc.",
//     "document_class": "Minutes of the Board",
//     "sha256": "9f86d0..."              -- optional, verified on download
//   }

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use minutebook_core::error::{MinutebookError, Result};
use minutebook_core::types::ContentDigest;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, instrument};

use crate::ports::{SourcePointer, SourceRepository};

/// Namespace reported in pointers from this repository.
pub const SOURCE_NAMESPACE: &str = "sources";

/// On-disk manifest for one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceManifest {
    pub path: String,
    pub entity_label: String,
    pub document_class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

pub struct FsSourceRepository {
    root: PathBuf,
}

impl FsSourceRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn manifest_path(&self, entry_id: &str) -> Option<PathBuf> {
        is_plain_relative(entry_id).then(|| self.root.join(format!("{entry_id}.json")))
    }
}

fn is_plain_relative(path: &str) -> bool {
    !path.is_empty()
        && Path::new(path)
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
}

#[async_trait]
impl SourceRepository for FsSourceRepository {
    fn backend_tag(&self) -> &'static str {
        "localfs"
    }

    #[instrument(skip(self))]
    async fn locate(&self, entry_id: &str) -> Result<Option<SourcePointer>> {
        let Some(manifest_path) = self.manifest_path(entry_id) else {
            return Ok(None);
        };
        let data = match fs::read(&manifest_path).await {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(manifest = %manifest_path.display(), "no manifest");
                return Ok(None);
            }
            Err(err) => {
                return Err(MinutebookError::Download(format!(
                    "{}: {}",
                    manifest_path.display(),
                    err
                )));
            }
        };

        let manifest: SourceManifest = serde_json::from_slice(&data).map_err(|err| {
            MinutebookError::Download(format!("malformed manifest for {entry_id}: {err}"))
        })?;
        if !is_plain_relative(&manifest.path) {
            return Err(MinutebookError::Download(format!(
                "manifest for {entry_id} points outside the source root: {:?}",
                manifest.path
            )));
        }
        let known_hash = manifest
            .sha256
            .as_deref()
            .map(ContentDigest::from_hex)
            .transpose()
            .map_err(|err| {
                MinutebookError::Download(format!("manifest for {entry_id} has a bad sha256: {err}"))
            })?;

        Ok(Some(SourcePointer {
            entry_id: entry_id.to_string(),
            namespace: SOURCE_NAMESPACE.to_string(),
            path: manifest.path,
            known_hash,
            entity_label: manifest.entity_label,
            document_class: manifest.document_class,
        }))
    }

    #[instrument(skip(self, pointer), fields(path = %pointer.path))]
    async fn fetch(&self, pointer: &SourcePointer) -> Result<Vec<u8>> {
        if !is_plain_relative(&pointer.path) {
            return Err(MinutebookError::Download(format!(
                "refusing source path {:?}",
                pointer.path
            )));
        }
        let path = self.root.join(&pointer.path);
        let bytes = fs::read(&path)
            .await
            .map_err(|err| MinutebookError::Download(format!("{}: {}", path.display(), err)))?;
        debug!(len = bytes.len(), "source downloaded");
        Ok(bytes)
    }
}
