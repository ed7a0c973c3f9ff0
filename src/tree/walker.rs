//! Tree walker that seeds the checksum store

use crate::error::ChecksumError;
use crate::store::ChecksumStore;
use crate::tree::hasher::DigestFunction;
use crate::tree::path::normalize_name;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info, instrument, trace};
use walkdir::WalkDir;

/// Registers directories with a filesystem change notification mechanism
pub trait DirectoryWatch {
    /// Start delivering events for the direct entries of `dir`
    fn watch_directory(&mut self, dir: &Path) -> Result<(), ChecksumError>;
}

/// Outcome of a walk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkReport {
    pub files: usize,
    pub directories: usize,
    /// The stop flag was raised before the walk finished
    pub cancelled: bool,
}

enum Step {
    /// Directory to enter: filesystem path and store key
    Enter(PathBuf, PathBuf),
    /// Directory whose children are all stored
    Leave(PathBuf),
}

/// Depth-first walker that hashes files on the way down and directories on the
/// way back up
///
/// Each directory is handed to the [`DirectoryWatch`] (if any) before its entries
/// are listed, so entries created after registration arrive as events and entries
/// created before it are listed. Seeing an entry both ways is harmless because
/// store writes are upserts.
///
/// Symbolic links below the root are not followed and not recorded.
pub struct TreeWalker<'a> {
    root: PathBuf,
    digests: DigestFunction,
    stop: Option<&'a AtomicBool>,
    watch: Option<&'a mut dyn DirectoryWatch>,
}

impl<'a> TreeWalker<'a> {
    /// Create a walker for a normalized root directory
    pub fn new(root: PathBuf, digests: DigestFunction) -> Self {
        Self {
            root,
            digests,
            stop: None,
            watch: None,
        }
    }

    /// Check this flag before every directory and file; stop early when it is set
    pub fn with_stop_flag(mut self, stop: &'a AtomicBool) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Register every visited directory with a watch mechanism
    pub fn with_watch(mut self, watch: &'a mut dyn DirectoryWatch) -> Self {
        self.watch = Some(watch);
        self
    }

    /// Walk the root and write every digest into `store`
    ///
    /// Any failure to list a directory or read a file aborts the walk.
    #[instrument(skip(self, store), fields(root = %self.root.display()))]
    pub fn walk_into(&mut self, store: &ChecksumStore) -> Result<WalkReport, ChecksumError> {
        let start = Instant::now();
        debug!("Starting tree walk");

        let mut report = WalkReport::default();
        let mut steps = vec![Step::Enter(self.root.clone(), self.root.clone())];

        while let Some(step) = steps.pop() {
            match step {
                Step::Enter(dir, key) => {
                    if self.stopped() {
                        report.cancelled = true;
                        break;
                    }
                    if let Some(watch) = self.watch.as_mut() {
                        watch.watch_directory(&dir).map_err(|e| walk_error(&dir, e))?;
                    }
                    steps.push(Step::Leave(key.clone()));

                    let mut subdirs = Vec::new();
                    for entry in WalkDir::new(&dir)
                        .min_depth(1)
                        .max_depth(1)
                        .follow_links(false)
                        .sort_by_file_name()
                    {
                        if self.stopped() {
                            report.cancelled = true;
                            break;
                        }
                        let entry = entry.map_err(|e| {
                            let path = e.path().unwrap_or(dir.as_path()).to_path_buf();
                            walk_error(
                                &path,
                                ChecksumError::Checksum {
                                    path: path.clone(),
                                    source: e.into(),
                                },
                            )
                        })?;
                        let child_key = child_key(&key, entry.file_name());
                        let file_type = entry.file_type();
                        if file_type.is_dir() {
                            subdirs.push(Step::Enter(entry.into_path(), child_key));
                        } else if file_type.is_file() {
                            let digest = self
                                .digests
                                .file_digest(entry.path())
                                .map_err(|e| walk_error(entry.path(), e))?;
                            trace!(path = %child_key.display(), digest = %digest, "Hashed file");
                            store.put(child_key, digest);
                            report.files += 1;
                        }
                    }
                    if report.cancelled {
                        break;
                    }
                    steps.extend(subdirs.into_iter().rev());
                }
                Step::Leave(key) => {
                    let digest = self.digests.directory_digest(&key, store);
                    trace!(path = %key.display(), digest = %digest, "Hashed directory");
                    store.put(key, digest);
                    report.directories += 1;
                }
            }
        }

        if report.cancelled {
            info!(
                files = report.files,
                directories = report.directories,
                "Tree walk cancelled"
            );
        } else {
            info!(
                files = report.files,
                directories = report.directories,
                duration_ms = start.elapsed().as_millis() as u64,
                "Tree walk completed"
            );
        }
        Ok(report)
    }

    fn stopped(&self) -> bool {
        self.stop.map(|s| s.load(Ordering::SeqCst)).unwrap_or(false)
    }
}

/// Store key of a directory entry: the normalized parent key joined with the name
fn child_key(parent_key: &Path, name: &std::ffi::OsStr) -> PathBuf {
    parent_key.join(normalize_name(name))
}

fn walk_error(path: &Path, source: ChecksumError) -> ChecksumError {
    ChecksumError::Walk {
        path: path.to_path_buf(),
        source: Box::new(source),
    }
}
