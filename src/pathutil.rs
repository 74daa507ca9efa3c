// SPDX-License-Identifier: MPL-2.0
//! Destination filename helpers for exports.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Returns a path in `dir` based on `filename` that does not collide with
/// any existing entry, appending ` (n)` to the stem as needed:
/// `photo.jpg`, `photo (1).jpg`, `photo (2).jpg`, ...
///
/// Matching is case-insensitive on the full filename, so `Photo.JPG` blocks
/// `photo.jpg`. The check reflects directory contents at call time only;
/// another writer can still claim the name between this call and the write.
pub fn increment_filename(dir: &Path, filename: &str) -> Result<PathBuf> {
    let taken = lowercase_names(dir)?;
    let (stem, ext) = split_name(filename);
    let mut candidate = filename.to_string();
    let mut counter = 0u32;
    while taken.contains(&candidate.to_lowercase()) {
        counter += 1;
        candidate = match ext {
            Some(ext) => format!("{} ({}).{}", stem, counter, ext),
            None => format!("{} ({})", stem, counter),
        };
    }
    Ok(dir.join(candidate))
}

fn lowercase_names(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        names.push(entry.file_name().to_string_lossy().to_lowercase());
    }
    Ok(names)
}

fn split_name(filename: &str) -> (&str, Option<&str>) {
    let path = Path::new(filename);
    let stem = path
        .file_stem()
        .and_then(OsStr::to_str)
        .unwrap_or(filename);
    let ext = path.extension().and_then(OsStr::to_str);
    (stem, ext)
}
