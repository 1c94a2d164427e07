use crate::core::error::{Error, Result};
use ignore::WalkBuilder;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::warn;

/// A file found under an index root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub size: u64,
}

/// Recursively enumerate every file under `root`, depth first.
///
/// Hidden files are included and no ignore rules apply; symlinks are not
/// followed, so link cycles cannot recurse. An unreadable directory is logged
/// and only that subtree is skipped.
pub fn discover_files(root: &Path) -> Result<Vec<DiscoveredFile>> {
    if !root.exists() {
        return Err(Error::Config(format!(
            "Directory does not exist: {}",
            root.display()
        )));
    }

    if !root.is_dir() {
        return Err(Error::Config(format!(
            "Path is not a directory: {}",
            root.display()
        )));
    }

    let mut files = Vec::new();

    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    for result in walker {
        match result {
            Ok(entry) => {
                let is_file = entry.file_type().map(|ft| ft.is_file()).unwrap_or(false);
                if !is_file {
                    continue;
                }

                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                files.push(DiscoveredFile {
                    path: entry.into_path(),
                    size,
                });
            }
            Err(err) => {
                warn!("Skipping unreadable entry under {}: {}", root.display(), err);
            }
        }
    }

    Ok(files)
}

/// Expand a list of roots into the files to index.
///
/// Directories are walked, plain files become single entries, and roots that
/// cannot be read are logged and skipped. Paths reached through overlapping
/// roots are only returned once.
pub fn discover_roots(roots: &[PathBuf]) -> Vec<DiscoveredFile> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for root in roots {
        let found = if root.is_dir() {
            match discover_files(root) {
                Ok(found) => found,
                Err(e) => {
                    warn!("Skipping root {}: {}", root.display(), e);
                    continue;
                }
            }
        } else {
            match std::fs::metadata(root) {
                Ok(metadata) if metadata.is_file() => vec![DiscoveredFile {
                    path: root.clone(),
                    size: metadata.len(),
                }],
                Ok(_) => {
                    warn!("Skipping root {}: not a regular file", root.display());
                    continue;
                }
                Err(e) => {
                    warn!("Skipping root {}: {}", root.display(), e);
                    continue;
                }
            }
        };

        for file in found {
            if seen.insert(file.path.clone()) {
                files.push(file);
            }
        }
    }

    files
}


