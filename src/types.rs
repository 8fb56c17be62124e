use chrono::{DateTime, FixedOffset};
use std::path::PathBuf;

/// A regular file directly inside the input directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
}

pub type LastUsed = Option<DateTime<FixedOffset>>;

/// Age of a file in whole days since it was last used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Age {
    Days(i64),
    /// No last-used date could be found; treated as infinitely old.
    Never,
}

impl std::fmt::Display for Age {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Age::Days(days) => write!(f, "{days} days"),
            Age::Never => write!(f, "Never"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    OlderThan,
    NewerThan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    #[default]
    Fail,
    Rename,
}
