use crate::types::FileEntry;
use log::warn;
use std::path::Path;
use walkdir::WalkDir;

/// Finder's per-directory view settings; never worth sweeping.
const IGNORED_NAMES: &[&str] = &[".DS_Store"];

/// Lists regular files directly inside `input_dir`, sorted by name.
///
/// Anything that is `output_dir` or contains it is skipped, so the rug is
/// never swept into itself.
#[must_use]
pub fn list_files(input_dir: &Path, output_dir: &Path) -> Vec<FileEntry> {
    WalkDir::new(input_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {e}", input_dir.display());
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter(|e| !output_dir.starts_with(e.path()))
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().to_string();
            if IGNORED_NAMES.contains(&name.as_str()) {
                return None;
            }

            let size = match e.metadata() {
                Ok(m) => m.len(),
                Err(err) => {
                    warn!("Cannot read metadata for {}: {err}", e.path().display());
                    0
                }
            };

            Some(FileEntry {
                path: e.into_path(),
                name,
                size,
            })
        })
        .collect()
}
