//! Ifile generation: walking a tree under gitignore-style rules and
//! projecting the result into an include file for a backup tool.
//!
//! An [`Ifile`] accumulates projection passes ([`Ifile::walk`]) into an
//! in-memory buffer and replaces the on-disk file in one atomic step
//! ([`Ifile::write`]). Long-running regeneration is the job of
//! [`WatchJob`].

pub mod error;
mod ignore;
mod walk;
mod watch;

pub use error::{Error, HookKind};
pub use ignore::{GITIGNORE, KOPYATIGNORE};
pub use watch::{Hook, IfileWalker, Status, WatchJob, WatchJobInfo, Walker};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;
use tracing::debug;

/// How walker matches are interpreted and what shape the ifile takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Emit every path the ignore rules do *not* match, pruning matched
    /// subtrees. The resulting ifile is fed to restic via `--files-from`.
    Restic,
    /// Emit only matched paths, trimmed to the scan root and prefixed with
    /// `/`, the form Syncthing's ignore machinery consumes.
    Syncthing,
}

/// One walker observation: a serialisable path plus its directory flag.
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    path: String,
    is_dir: bool,
}

impl Entry {
    pub(crate) fn new(path: String, is_dir: bool) -> Self {
        Self { path, is_dir }
    }

    /// Serialised length, line terminator included.
    fn len(&self) -> usize {
        self.path.len() + 1
    }
}

struct IfileBuf {
    buf: String,
    seen: HashSet<String>,
}

/// A generated include file: target path, projection mode and the buffered
/// lines awaiting writeout.
pub struct Ifile {
    path: PathBuf,
    mode: Mode,
    state: Mutex<IfileBuf>,
}

impl Ifile {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, mode: Mode) -> Self {
        Self {
            path: path.into(),
            mode,
            state: Mutex::new(IfileBuf {
                buf: String::new(),
                seen: HashSet::new(),
            }),
        }
    }

    /// The file this ifile is written to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Appends a batch of walker output to the buffer.
    ///
    /// Directory entries with at least one emitted descendant are dropped:
    /// they are implied by their children. Lines already present in the
    /// buffer (from this or an earlier walk) are suppressed.
    fn project(&self, entries: &[Entry]) {
        let mut state = self.state.lock().expect("ifile buffer lock poisoned");
        state.buf.reserve(entries.iter().map(Entry::len).sum());

        'outer: for entry in entries {
            if entry.is_dir {
                let mut prefix = entry.path.clone();
                prefix.push('/');
                for other in entries {
                    if other.path.starts_with(&prefix) {
                        continue 'outer;
                    }
                }
            }
            if !state.seen.insert(entry.path.clone()) {
                continue;
            }
            state.buf.push_str(&entry.path);
            state.buf.push('\n');
        }
        debug!(
            ifile = %self.path.display(),
            entries = entries.len(),
            "projection pass buffered"
        );
    }

    /// Replaces the target file with the buffered contents.
    ///
    /// The new contents are staged in a temporary file next to the target
    /// and moved into place, so concurrent readers observe either the old or
    /// the new ifile, never a partial write.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be created, written or
    /// renamed over the target.
    pub fn write(&self) -> Result<(), Error> {
        let state = self.state.lock().expect("ifile buffer lock poisoned");
        let dir = self.path.parent().filter(|p| !p.as_os_str().is_empty());
        let mut tmp = match dir {
            Some(dir) => NamedTempFile::new_in(dir)?,
            None => NamedTempFile::new_in(".")?,
        };
        tmp.write_all(state.buf.as_bytes())?;
        tmp.persist(&self.path).map_err(|err| Error::Io(err.error))?;
        debug!(ifile = %self.path.display(), bytes = state.buf.len(), "ifile replaced");
        Ok(())
    }

    /// Walks `root` and immediately writes the result out.
    ///
    /// # Errors
    ///
    /// Propagates walk and writeout failures.
    pub fn generate(&self, root: &Path) -> Result<(), Error> {
        self.walk(root)?;
        self.write()
    }
}
