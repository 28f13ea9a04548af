//! # Manifest File Discovery

use crate::constants::MANIFEST_EXTENSION;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Every regular `.yaml` file below `root`, in lexical walk order
///
/// Directories are visited depth-first with entries sorted by file name, so the
/// order is stable across runs and platforms. The extension match is exact and
/// case-sensitive. The walk is lazy: a traversal error (including a missing `root`)
/// surfaces at the point in the order where it occurs.
pub fn manifest_files(
    root: impl AsRef<Path>,
) -> impl Iterator<Item = Result<PathBuf, walkdir::Error>> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) if entry.file_type().is_file() && is_manifest(entry.path()) => {
                Some(Ok(entry.into_path()))
            }
            Ok(_) => None,
            Err(e) => Some(Err(e)),
        })
}

fn is_manifest(path: &Path) -> bool {
    path.extension() == Some(OsStr::new(MANIFEST_EXTENSION))
}
