use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Root data directory: the override when given, else the platform's local
/// data dir (`linknook`, or `linknook-dev` for debug builds). Created on demand.
pub fn resolve_data_dir(override_dir: Option<&Path>) -> Result<PathBuf> {
    let app_dir = match override_dir {
        Some(dir) => dir.to_path_buf(),
        None => {
            let local = dirs::data_local_dir()
                .ok_or_else(|| anyhow!("Could not determine the local data directory"))?;
            if cfg!(debug_assertions) {
                local.join("linknook-dev")
            } else {
                local.join("linknook")
            }
        }
    };

    if !app_dir.exists() {
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("Failed to create {}", app_dir.display()))?;
    }

    Ok(app_dir)
}

/// Directory holding one JSON file per channel's stored links
pub fn links_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("links")
}

pub fn settings_path(data_dir: &Path) -> PathBuf {
    data_dir.join("settings.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_is_created() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("data");
        let resolved = resolve_data_dir(Some(dir.as_path())).unwrap();
        assert_eq!(resolved, dir);
        assert!(dir.is_dir());
        assert_eq!(settings_path(&dir), dir.join("settings.json"));
        assert_eq!(links_dir(&dir), dir.join("links"));
    }
}
