use jwalk::WalkDir;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Directory names never descended into unless configured otherwise.
pub const DEFAULT_SKIPPED_DIRS: [&str; 3] = [".git", "target", "node_modules"];

#[derive(Debug, Clone)]
pub struct FileNode {
    pub path: PathBuf,
    pub is_dir: bool,
}

#[derive(Debug, Default)]
pub struct ScanStats {
    pub total_files: u64,
    pub total_dirs: u64,
    pub skipped_errors: u64,
    pub duration_ms: u128,
}

/// Sorted, parallel directory walker feeding [`FileTree::from_scan`](crate::tree::FileTree::from_scan).
pub struct FileCrawler {
    skipped_dirs: Vec<String>,
    max_depth: Option<usize>,
}

impl FileCrawler {
    pub fn new() -> Self {
        Self {
            skipped_dirs: DEFAULT_SKIPPED_DIRS.iter().map(|s| s.to_string()).collect(),
            max_depth: None,
        }
    }

    pub fn with_skipped_dirs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skipped_dirs = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Walk `root` and return every entry below it (the root itself excluded),
    /// parents always before their children.
    pub fn scan<P: AsRef<Path>>(&self, root: P) -> (Vec<FileNode>, ScanStats) {
        let start = Instant::now();
        let root = root.as_ref();
        let skipped = self.skipped_dirs.clone();

        let mut walker = WalkDir::new(root)
            .sort(true)
            .skip_hidden(false)
            .process_read_dir(move |_, _, _, children| {
                children.retain(|entry| {
                    entry
                        .as_ref()
                        .map(|dir_entry| !Self::should_skip(&skipped, &dir_entry.path(), dir_entry.file_type().is_dir()))
                        .unwrap_or(true)
                });
            });
        if let Some(depth) = self.max_depth {
            walker = walker.max_depth(depth);
        }

        let mut stats = ScanStats::default();
        let mut nodes = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("skipping unreadable entry: {err}");
                    stats.skipped_errors += 1;
                    continue;
                }
            };
            if entry.depth == 0 {
                continue;
            }
            let is_dir = entry.file_type().is_dir();
            if is_dir {
                stats.total_dirs += 1;
            } else {
                stats.total_files += 1;
            }
            nodes.push(FileNode {
                path: entry.path(),
                is_dir,
            });
        }

        stats.duration_ms = start.elapsed().as_millis();
        debug!(
            "scanned {} files and {} dirs below {} in {}ms",
            stats.total_files,
            stats.total_dirs,
            root.display(),
            stats.duration_ms
        );
        (nodes, stats)
    }

    fn should_skip(skipped: &[String], path: &Path, is_dir: bool) -> bool {
        if !is_dir {
            return false;
        }
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| skipped.iter().any(|s| s == name))
    }
}

impl Default for FileCrawler {
    fn default() -> Self {
        Self::new()
    }
}
