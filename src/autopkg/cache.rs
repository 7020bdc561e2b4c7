//! Recipe cache removal
//!
//! This only removes what it's told to; deciding *when* a cache is stale is
//! left to whoever schedules the cleanup step.

use crate::autopkg::CommandError;
use crate::core::options::CleanupOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Remove recipe caches below `options.cache_dir`
///
/// With `remove_recipe_cache` every per-recipe directory is removed; with
/// only `remove_downloads` each recipe's `downloads` directory is removed.
/// A missing cache directory is not an error.
pub async fn clean_cache_dir(options: &CleanupOptions) -> Result<String, CommandError> {
    let cache_dir = &options.cache_dir;
    let mut entries = match tokio::fs::read_dir(cache_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Cache directory {} does not exist", cache_dir.display());
            return Ok(format!("cache directory {} does not exist", cache_dir.display()));
        }
        Err(source) => return Err(cache_error(cache_dir, source)),
    };

    let mut removed: Vec<PathBuf> = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|source| cache_error(cache_dir, source))?
    {
        let path = entry.path();
        let file_type = entry
            .file_type()
            .await
            .map_err(|source| cache_error(&path, source))?;
        if !file_type.is_dir() {
            continue;
        }

        let target = if options.remove_recipe_cache {
            path
        } else if options.remove_downloads {
            path.join("downloads")
        } else {
            continue;
        };

        match tokio::fs::remove_dir_all(&target).await {
            Ok(()) => {
                debug!("Removed {}", target.display());
                removed.push(target);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(source) => return Err(cache_error(&target, source)),
        }
    }

    info!(removed = removed.len(), "Cleaned cache at {}", cache_dir.display());
    Ok(format!(
        "removed {} cache entries from {}",
        removed.len(),
        cache_dir.display()
    ))
}

fn cache_error(path: &Path, source: std::io::Error) -> CommandError {
    CommandError::Cache {
        path: path.to_path_buf(),
        source,
    }
}
