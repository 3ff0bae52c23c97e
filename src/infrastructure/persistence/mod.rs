// src/infrastructure/persistence/mod.rs
// Whole-document JSON stores

pub mod ledger;
pub mod token_cache;

pub use ledger::OpenTradeLedger;
pub use token_cache::InstrumentTokenCache;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::domain::errors::{PersistenceError, PersistenceResult};

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PersistenceError + '_ {
    move |source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Reads a JSON document. A missing or empty file yields `None`.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> PersistenceResult<Option<T>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_error(path)(e)),
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| PersistenceError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
}

/// Replaces the document at `path` so readers see either the old or the new
/// content, never a partial write.
///
/// The data goes to a sibling temp file first, is synced, then renamed over
/// the target.
pub async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> PersistenceResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(io_error(parent))?;
        }
    }

    let json = serde_json::to_vec_pretty(value).map_err(|source| PersistenceError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;

    let temp = temp_path(path);
    let mut file = tokio::fs::File::create(&temp)
        .await
        .map_err(io_error(&temp))?;
    file.write_all(&json).await.map_err(io_error(&temp))?;
    file.sync_all().await.map_err(io_error(&temp))?;
    drop(file);

    tokio::fs::rename(&temp, path)
        .await
        .map_err(io_error(path))?;

    Ok(())
}
