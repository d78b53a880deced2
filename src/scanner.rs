use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::has_extension;
use crate::error::Result;

/// List the audio files directly inside `dir` whose extension matches
/// `format`, sorted by file name so batch order is reproducible.
pub fn scan_directory(dir: &Path, format: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|e| {
            e.into_io_error()
                .unwrap_or_else(|| std::io::Error::other("directory walk failed"))
        })?;
        let path = entry.path();
        if path.is_file() && has_extension(path, &[format]) {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}
