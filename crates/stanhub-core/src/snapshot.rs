//! Polling change detection: a snapshot maps every matching file to its
//! modification time, and two snapshots differ when any entry does.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    files: BTreeMap<PathBuf, i128>,
}

impl Snapshot {
    /// Walks `roots` recursively and records every file whose name matches
    /// `filter`. Roots that are files are recorded as-is; missing roots
    /// contribute nothing.
    pub fn capture(roots: &[PathBuf], filter: &NameFilter) -> Self {
        let mut files = BTreeMap::new();

        for root in roots {
            if root.is_file() {
                if let Some(mtime) = modified_nanos(root) {
                    files.insert(absolute(root), mtime);
                }
                continue;
            }
            if !root.is_dir() {
                continue;
            }

            for entry in WalkDir::new(root)
                .follow_links(false)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                if !entry.file_type().is_file() || !filter.matches(entry.path()) {
                    continue;
                }
                if let Some(mtime) = modified_nanos(entry.path()) {
                    files.insert(absolute(entry.path()), mtime);
                }
            }
        }

        Self { files }
    }

    /// True when cardinality differs, a path was added or removed, or a
    /// shared path carries a different timestamp.
    pub fn differs_from(&self, other: &Snapshot) -> bool {
        if self.files.len() != other.files.len() {
            return true;
        }
        self.files
            .iter()
            .any(|(path, mtime)| other.files.get(path) != Some(mtime))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, path: &Path) -> Option<i128> {
        self.files.get(path).copied()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }
}

impl FromIterator<(PathBuf, i128)> for Snapshot {
    fn from_iter<T: IntoIterator<Item = (PathBuf, i128)>>(iter: T) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

/// Shell-style patterns matched against a file's name. An empty filter
/// accepts every file.
#[derive(Debug, Clone)]
pub struct NameFilter {
    set: Option<GlobSet>,
}

impl NameFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        if patterns.is_empty() {
            return Ok(Self { set: None });
        }
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(Glob::new(pattern.as_ref())?);
        }
        Ok(Self {
            set: Some(builder.build()?),
        })
    }

    pub fn matches(&self, path: &Path) -> bool {
        match (&self.set, path.file_name()) {
            (None, _) => true,
            (Some(set), Some(name)) => set.is_match(name),
            (Some(_), None) => false,
        }
    }
}

/// Remembers the last snapshot of a fixed set of roots and reports whether
/// the file system moved since the previous check.
#[derive(Debug, Clone)]
pub struct ChangeSnapshotter {
    roots: Vec<PathBuf>,
    filter: NameFilter,
    previous: Snapshot,
}

impl ChangeSnapshotter {
    /// Takes the baseline snapshot immediately.
    pub fn new<S: AsRef<str>>(roots: Vec<PathBuf>, patterns: &[S]) -> Result<Self> {
        let filter = NameFilter::new(patterns)?;
        let previous = Snapshot::capture(&roots, &filter);
        Ok(Self {
            roots,
            filter,
            previous,
        })
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Switches to a new set of roots and re-baselines against them.
    pub fn set_roots(&mut self, roots: Vec<PathBuf>) {
        self.roots = roots;
        self.previous = self.snapshot();
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.roots, &self.filter)
    }

    /// Compares a fresh snapshot with the retained one, then replaces the
    /// retained snapshot whatever the outcome. A change is reported once.
    pub fn has_changed(&mut self) -> bool {
        let current = self.snapshot();
        let changed = current.differs_from(&self.previous);
        self.previous = current;
        changed
    }
}

fn modified_nanos(path: &Path) -> Option<i128> {
    let modified = path.metadata().ok()?.modified().ok()?;
    Some(match modified.duration_since(UNIX_EPOCH) {
        Ok(after) => after.as_nanos() as i128,
        Err(before) => -(before.duration().as_nanos() as i128),
    })
}

fn absolute(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Sets a file's mtime to `base + offset_secs`, for deterministic tests.
#[cfg(test)]
pub(crate) fn touch_at(path: &Path, offset_secs: u64) {
    let when = UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000 + offset_secs);
    let file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
    file.set_modified(when).unwrap();
}
