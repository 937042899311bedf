use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::classify::WatchRoot;

/// Collect every interesting file below `dir` (which must lie inside `root`).
///
/// Unlike a source-tree walk, nothing is skipped on account of being hidden or
/// gitignored: the classifier alone decides. `.git` directories are pruned
/// since nothing under them can be interesting.
///
/// Each entry is visited once; order is whatever the walker yields.
pub fn interesting_files(root: &WatchRoot, dir: &Path) -> Vec<PathBuf> {
    let walker = ignore::WalkBuilder::new(dir)
        .standard_filters(false)
        .follow_links(false)
        .filter_entry(|entry| entry.file_name() != ".git")
        .build();

    let mut files = Vec::new();
    for result in walker {
        let entry = match result {
            Ok(e) => e,
            Err(err) => {
                warn!("scan: {err}");
                continue;
            }
        };

        if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }

        let path = entry.path();
        if root.interesting(path) {
            debug!("scan: found {}", path.display());
            files.push(path.to_path_buf());
        }
    }

    files
}
