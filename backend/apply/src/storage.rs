//! Private document storage.
//!
//! Contracts and packet files are opaque bytes keyed by a relative path
//! such as `projects/7/contracts/3-signed.pdf`.

use std::path::{Component, Path, PathBuf};
use std::pin::Pin;

use async_trait::async_trait;
use grant_workflow::types::ProjectId;
use tokio::io::AsyncRead;

use crate::errors::{AppError, Result};

pub type DocumentReader = Pin<Box<dyn AsyncRead + Send>>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn save(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// `None` when nothing is stored under `key`.
    async fn open(&self, key: &str) -> Result<Option<DocumentReader>>;

    /// Returns `false` when the key was already gone.
    async fn delete(&self, key: &str) -> Result<bool>;
}

/// Storage key of an uploaded contract.
pub fn contract_key(project: ProjectId, contract: i64, filename: &str) -> String {
    format!("projects/{project}/contracts/{contract}-{}", clean_filename(filename))
}

/// Storage key of a packet file.
pub fn document_key(project: ProjectId, file: i64, filename: &str) -> String {
    format!("projects/{project}/documents/{file}-{}", clean_filename(filename))
}

/// Keep the name readable but strip anything path-like.
fn clean_filename(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    match cleaned.trim_start_matches('.') {
        "" => "file".to_string(),
        rest => rest.to_string(),
    }
}

/// Documents on the local filesystem under `root`.
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(AppError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid storage key: {key}"),
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn save(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }

    async fn open(&self, key: &str) -> Result<Option<DocumentReader>> {
        match tokio::fs::File::open(self.path(key)?).await {
            Ok(file) => Ok(Some(Box::pin(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        match tokio::fs::remove_file(self.path(key)?).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
