//! Startup scan of the doodle directory.

use std::path::Path;
use std::time::UNIX_EPOCH;

use doodlewall_core::store::{DoodleStore, ScannedFile};

/// List the regular files in `dir` with their modification times.
pub async fn scan_doodle_dir(dir: &Path) -> std::io::Result<Vec<ScannedFile>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let metadata = match entry.metadata().await {
            Ok(m) if m.is_file() => m,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(path = %entry.path().display(), error = %e, "Skipping unreadable entry");
                continue;
            }
        };

        let modified_millis = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .and_then(|d| i64::try_from(d.as_millis()).ok());

        files.push(ScannedFile {
            name: entry.file_name().to_string_lossy().into_owned(),
            modified_millis,
        });
    }

    Ok(files)
}

/// Scan `dir` and seed `store` with what is found.
///
/// A failed scan is logged and treated as an empty history so the hub
/// still starts. Returns the number of doodles loaded.
pub async fn bootstrap_store(store: &DoodleStore, dir: &Path) -> usize {
    let listing = match scan_doodle_dir(dir).await {
        Ok(listing) => listing,
        Err(e) => {
            tracing::error!(
                dir = %dir.display(),
                error = %e,
                "Failed to scan doodle directory, starting with empty history"
            );
            return 0;
        }
    };

    match store.bootstrap(listing).await {
        Ok(count) => count,
        Err(e) => {
            tracing::error!(error = %e, "Failed to bootstrap doodle history");
            0
        }
    }
}
