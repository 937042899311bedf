use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use crate::error::{HostError, Result};

/// Extension (without the dot) that marks a style sheet.
const STYLE_EXTENSION: &str = "css";

/// Directory name whose contents are never reported.
const GIT_DIR: &str = ".git";

/// The watched directory. Fixed for the lifetime of the process and the
/// reference point for every classification and logical name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchRoot {
    path: PathBuf,
}

impl WatchRoot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location: `<data dir>/userstyles`, e.g. `~/.local/share/userstyles`.
    pub fn default_location() -> Option<PathBuf> {
        directories::BaseDirs::new().map(|dirs| dirs.data_dir().join("userstyles"))
    }

    /// Create the directory if needed and pin it to its canonical form, so that
    /// paths reported by the OS watcher share its prefix.
    pub fn prepare(path: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(path)?;
        Ok(Self::new(std::fs::canonicalize(path)?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when `path` is a style sheet the extension should know about:
    /// - it is strictly inside the root,
    /// - its file name does not start with `.` (editor temp files),
    /// - its extension is exactly `css`,
    /// - no directory between the root and the file is named `.git`.
    ///
    /// Pure string inspection; the filesystem is never touched.
    pub fn interesting(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.path) else {
            return false;
        };
        let Some(file_name) = relative.file_name().and_then(OsStr::to_str) else {
            return false;
        };
        if file_name.starts_with('.') {
            return false;
        }
        if relative.extension() != Some(OsStr::new(STYLE_EXTENSION)) {
            return false;
        }
        !relative
            .components()
            .any(|c| matches!(c, Component::Normal(s) if s == GIT_DIR))
    }

    pub fn boring(&self, path: &Path) -> bool {
        !self.interesting(path)
    }

    /// Logical name of `path`: relative to the root, final extension removed,
    /// `/`-separated. `root/a/b.css` becomes `a/b`.
    pub fn name(&self, path: &Path) -> Result<String> {
        let relative = self.relative(path)?;
        Ok(join_components(&relative.with_extension("")))
    }

    /// Relative path rendered like a name but with the extension kept. Used as a
    /// directory prefix when everything below a path has to be matched.
    pub fn relative_name(&self, path: &Path) -> Result<String> {
        Ok(join_components(self.relative(path)?))
    }

    fn relative<'a>(&self, path: &'a Path) -> Result<&'a Path> {
        path.strip_prefix(&self.path)
            .map_err(|_| HostError::InvalidPath {
                path: path.to_path_buf(),
            })
    }
}

fn join_components(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
