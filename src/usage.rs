//! Last-used dates from file metadata.
//!
//! On macOS the date lives in Spotlight's `kMDItemLastUsedDate` attribute and
//! is read by running `mdls -name kMDItemLastUsedDate <file>`, which prints a
//! single line such as:
//!
//! ```text
//! kMDItemLastUsedDate = 2024-03-01 18:21:51 +0000
//! ```
//!
//! Files that were never opened report `(null)`. Every kind of failure is
//! folded into "unknown" so a single bad file cannot stop a sweep.

use crate::types::{FileEntry, LastUsed};
use chrono::{DateTime, FixedOffset};
use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

pub const DEFAULT_TOOL: &str = "mdls";
pub const DEFAULT_FIELD: &str = "kMDItemLastUsedDate";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub trait UsageMetadataProvider: Send + Sync {
    /// When `path` was last used, or `None` if that cannot be determined.
    fn last_used_at(&self, path: &Path) -> LastUsed;
}

/// Queries an `mdls`-compatible tool as a subprocess.
#[derive(Debug, Clone)]
pub struct MdlsProvider {
    pub tool: String,
    pub field: String,
    pub timeout: Duration,
}

impl Default for MdlsProvider {
    fn default() -> Self {
        Self {
            tool: DEFAULT_TOOL.to_string(),
            field: DEFAULT_FIELD.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Error)]
enum QueryError {
    #[error("failed to run query tool: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("query tool timed out after {0:?}")]
    Timeout(Duration),
    #[error("query tool exited with {0}")]
    Status(ExitStatus),
    #[error("no parsable date in output {0:?}")]
    Unparsable(String),
}

impl MdlsProvider {
    fn query(&self, path: &Path) -> Result<LastUsed, QueryError> {
        let child = Command::new(&self.tool)
            .arg("-name")
            .arg(&self.field)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(QueryError::Spawn)?;

        let (status, stdout) = wait_with_timeout(child, self.timeout)?;
        if !status.success() {
            return Err(QueryError::Status(status));
        }

        let stdout = String::from_utf8_lossy(&stdout);
        match parse_query_output(&stdout, &self.field) {
            Some(Value::Null) => Ok(None),
            Some(Value::Date(date)) => Ok(Some(date)),
            None => Err(QueryError::Unparsable(stdout.trim().to_string())),
        }
    }
}

impl UsageMetadataProvider for MdlsProvider {
    fn last_used_at(&self, path: &Path) -> LastUsed {
        match self.query(path) {
            Ok(last_used) => last_used,
            Err(e) => {
                debug!("No last-used date for {}: {e}", path.display());
                None
            }
        }
    }
}

fn wait_with_timeout(
    mut child: Child,
    timeout: Duration,
) -> Result<(ExitStatus, Vec<u8>), QueryError> {
    let start = Instant::now();
    loop {
        match child.try_wait().map_err(QueryError::Spawn)? {
            Some(status) => {
                let mut buf = Vec::new();
                if let Some(mut stdout) = child.stdout.take() {
                    stdout.read_to_end(&mut buf).map_err(QueryError::Spawn)?;
                }
                return Ok((status, buf));
            }
            None => {
                if start.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(QueryError::Timeout(timeout));
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
    }
}

#[derive(Debug, PartialEq)]
enum Value {
    Null,
    Date(DateTime<FixedOffset>),
}

/// Parses `field = value` output. `None` means the output was not understood.
fn parse_query_output(stdout: &str, field: &str) -> Option<Value> {
    let line = stdout.lines().find(|l| !l.trim().is_empty())?;
    let (key, value) = line.split_once('=')?;
    if key.trim() != field {
        return None;
    }

    let value = value.trim().trim_matches('"');
    if value == "(null)" {
        return Some(Value::Null);
    }
    parse_date(value).map(Value::Date)
}

fn parse_date(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S %z")
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .or_else(|_| DateTime::parse_from_rfc2822(value))
        .ok()
}

/// Last-used dates for one run, keyed by file path.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UsageRecord {
    entries: BTreeMap<PathBuf, LastUsed>,
    /// Lookups that crashed; these files must not be swept.
    skipped: BTreeSet<PathBuf>,
}

impl UsageRecord {
    #[must_use]
    pub fn is_skipped(&self, path: &Path) -> bool {
        self.skipped.contains(path)
    }

    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// Unknown for paths that were never looked up.
    #[must_use]
    pub fn last_used(&self, path: &Path) -> LastUsed {
        self.entries.get(path).copied().flatten()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn unknown_count(&self) -> usize {
        self.entries.values().filter(|v| v.is_none()).count()
    }
}

impl FromIterator<(PathBuf, LastUsed)> for UsageRecord {
    fn from_iter<I: IntoIterator<Item = (PathBuf, LastUsed)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
            skipped: BTreeSet::new(),
        }
    }
}

/// Looks up every file, running at most `jobs` queries at once.
///
/// Returns only after all lookups have finished. A lookup that panics is
/// logged and its file marked skipped rather than unknown.
pub fn resolve_all(
    provider: &dyn UsageMetadataProvider,
    files: &[FileEntry],
    jobs: usize,
) -> UsageRecord {
    let workers = jobs.clamp(1, files.len().max(1));
    let next = AtomicUsize::new(0);

    let found: Vec<(PathBuf, Option<LastUsed>)> = thread::scope(|s| {
        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            handles.push(s.spawn(|| {
                let mut found = Vec::new();
                loop {
                    let i = next.fetch_add(1, Ordering::Relaxed);
                    let Some(file) = files.get(i) else {
                        break;
                    };
                    let lookup =
                        panic::catch_unwind(AssertUnwindSafe(|| provider.last_used_at(&file.path)));
                    if lookup.is_err() {
                        warn!("Last-used lookup crashed for {}, leaving it in place", file.path.display());
                    }
                    found.push((file.path.clone(), lookup.ok()));
                }
                found
            }));
        }

        handles
            .into_iter()
            .flat_map(|h| {
                h.join().unwrap_or_else(|_| {
                    warn!("A last-used lookup worker crashed");
                    Vec::new()
                })
            })
            .collect()
    });

    let mut record = UsageRecord::default();
    for (path, lookup) in found {
        match lookup {
            Some(last_used) => {
                record.entries.insert(path, last_used);
            }
            None => {
                record.skipped.insert(path);
            }
        }
    }
    for file in files {
        if !record.entries.contains_key(&file.path) {
            record.skipped.insert(file.path.clone());
        }
    }
    record
}
