use crate::error::SweepError;
use crate::types::{ConflictPolicy, Direction};
use std::fs;
use std::path::{Component, Path, PathBuf};

pub const DEFAULT_RUG_NAME: &str = "rug";

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub cutoff_days: i64,
    pub direction: Direction,
    pub verbose: bool,
    pub dry_run: bool,
    pub conflict_policy: ConflictPolicy,
    pub jobs: usize,
}

/// Resolves the input and output directories to absolute, symlink-free paths
/// and rejects the run if both name the same directory.
///
/// The output directory may not exist yet; its nearest existing ancestor is
/// canonicalized and the remaining components appended.
pub fn resolve_dirs(input: &Path, output: Option<&Path>) -> Result<(PathBuf, PathBuf), SweepError> {
    let input_dir = fs::canonicalize(input).map_err(|e| SweepError::io(input, e))?;
    if !input_dir.is_dir() {
        return Err(SweepError::NotADirectory { path: input_dir });
    }

    let output_dir = match output {
        Some(dir) => resolve_path(dir).map_err(|source| SweepError::OutputPath {
            path: dir.to_path_buf(),
            source,
        })?,
        None => input_dir.join(DEFAULT_RUG_NAME),
    };

    if output_dir == input_dir || is_same_dir(&input_dir, &output_dir) {
        return Err(SweepError::SameDirectory { path: input_dir });
    }

    Ok((input_dir, output_dir))
}

fn resolve_path(path: &Path) -> std::io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;

    // Longest prefix the OS can resolve, `..` after symlinks included
    let mut existing = PathBuf::new();
    let mut components = absolute.components();
    let mut missing = Vec::new();
    for component in components.by_ref() {
        let candidate = existing.join(component.as_os_str());
        if candidate.exists() {
            existing = candidate;
        } else {
            missing.push(component);
            break;
        }
    }
    missing.extend(components);

    let mut resolved = fs::canonicalize(&existing)?;
    for component in missing {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other.as_os_str()),
        }
    }
    Ok(resolved)
}

#[cfg(unix)]
fn is_same_dir(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (fs::metadata(a), fs::metadata(b)) {
        (Ok(ma), Ok(mb)) => ma.dev() == mb.dev() && ma.ino() == mb.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn is_same_dir(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(ca), Ok(cb)) => ca == cb,
        _ => false,
    }
}
