use crate::classify::SweepPlan;
use crate::error::MoveError;
use crate::types::ConflictPolicy;
use log::{debug, warn};
use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    pub src: PathBuf,
    pub dst: PathBuf,
    pub size: u64,
}

impl PlannedMove {
    #[must_use]
    pub fn conflicts(&self) -> bool {
        self.dst.symlink_metadata().is_ok()
    }
}

#[derive(Debug, Default)]
pub struct MoveReport {
    pub moved: Vec<PlannedMove>,
    pub failed: Vec<MoveError>,
}

impl MoveReport {
    #[must_use]
    pub fn bytes_moved(&self) -> u64 {
        self.moved.iter().map(|m| m.size).sum()
    }
}

/// Destination for every selected file: the rug plus the file's own name.
///
/// With [`ConflictPolicy::Rename`] a taken destination is replaced by the
/// first free `name (N).ext`.
#[must_use]
pub fn plan_moves(plan: &SweepPlan, output_dir: &Path, policy: ConflictPolicy) -> Vec<PlannedMove> {
    plan.selected()
        .map(|entry| {
            let file_name = entry.path.file_name().unwrap_or(entry.name.as_ref());
            let mut dst = output_dir.join(file_name);
            if policy == ConflictPolicy::Rename && dst.symlink_metadata().is_ok() {
                dst = auto_rename_path(&dst);
            }
            PlannedMove {
                src: entry.path.clone(),
                dst,
                size: entry.size,
            }
        })
        .collect()
}

/// Performs the moves in order. A failure is recorded and the next file is
/// still attempted; existing destinations are never overwritten.
pub fn execute(moves: &[PlannedMove]) -> MoveReport {
    let mut report = MoveReport::default();

    for planned in moves {
        match move_file(&planned.src, &planned.dst) {
            Ok(()) => {
                debug!("Moved {} -> {}", planned.src.display(), planned.dst.display());
                report.moved.push(planned.clone());
            }
            Err(e) => {
                warn!("{e}");
                report.failed.push(e);
            }
        }
    }

    report
}

/// Links `dst` to `src` and then unlinks `src`. Linking refuses an existing
/// destination, unlike `rename` which silently replaces it.
fn move_file(src: &Path, dst: &Path) -> Result<(), MoveError> {
    let io_err = |source: std::io::Error| MoveError::Io {
        src: src.to_path_buf(),
        dst: dst.to_path_buf(),
        source,
    };

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    match fs::hard_link(src, dst) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            return Err(MoveError::DestinationExists {
                path: dst.to_path_buf(),
            });
        }
        Err(e)
            if matches!(
                e.kind(),
                ErrorKind::CrossesDevices | ErrorKind::Unsupported | ErrorKind::PermissionDenied
            ) =>
        {
            debug!("Cannot link {} ({e}), copying", dst.display());
            return copy_then_remove(src, dst);
        }
        Err(e) => return Err(io_err(e)),
    }

    if let Err(e) = fs::remove_file(src) {
        let _ = fs::remove_file(dst);
        return Err(io_err(e));
    }
    Ok(())
}

fn copy_then_remove(src: &Path, dst: &Path) -> Result<(), MoveError> {
    let io_err = |source: std::io::Error| MoveError::Io {
        src: src.to_path_buf(),
        dst: dst.to_path_buf(),
        source,
    };

    let mut reader = fs::File::open(src).map_err(io_err)?;
    let mut writer = match OpenOptions::new().write(true).create_new(true).open(dst) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            return Err(MoveError::DestinationExists {
                path: dst.to_path_buf(),
            });
        }
        Err(e) => return Err(io_err(e)),
    };

    let copied = io::copy(&mut reader, &mut writer)
        .and_then(|_| writer.sync_all())
        .and_then(|()| fs::set_permissions(dst, reader.metadata()?.permissions()));
    if let Err(e) = copied {
        let _ = fs::remove_file(dst);
        return Err(io_err(e));
    }

    fs::remove_file(src).map_err(io_err)
}

fn auto_rename_path(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or(Path::new(""));
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let extension = path.extension().map(|e| e.to_string_lossy().to_string());

    let candidate = |suffix: String| {
        let name = match &extension {
            Some(ext) => format!("{stem} ({suffix}).{ext}"),
            None => format!("{stem} ({suffix})"),
        };
        parent.join(name)
    };

    for i in 1..1000 {
        let new_path = candidate(i.to_string());
        if new_path.symlink_metadata().is_err() {
            return new_path;
        }
    }

    candidate(chrono::Utc::now().format("%Y%m%d%H%M%S").to_string())
}
