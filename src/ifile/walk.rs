//! Depth-first traversal with a stack of scoped ignore files.
//!
//! Ignore files are loaded as directories are entered and stay on the stack
//! for the rest of the walk; scoping is enforced by a prefix check on each
//! frame's directory, which is robust against non-linear visit orders. The
//! scan is innermost-first, so a nested ignore file overrides its ancestors.

use crate::ifile::ignore::{self, IgnoreFile, Verdict};
use crate::ifile::{Entry, Error, Ifile, Mode};
use crate::utils;
use std::io;
use std::path::Path;
use tracing::{debug, trace};
use walkdir::WalkDir;

impl Ifile {
    /// Walks `root` and buffers the projection of everything found under it.
    ///
    /// `root` itself is never emitted. Entries are visited depth-first in
    /// lexical order, so repeated walks over an unchanged tree buffer
    /// byte-identical output. Permission errors on individual entries are
    /// skipped; any other I/O error aborts the walk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadPattern`] if an encountered ignore file fails to
    /// compile and [`Error::Io`] for non-permission filesystem errors.
    pub fn walk(&self, root: &Path) -> Result<(), Error> {
        let mut stack: Vec<IgnoreFile> = Vec::with_capacity(16);
        ignore::load_into(&mut stack, root)?;

        let mut entries: Vec<Entry> = Vec::with_capacity(1024);
        let mut walker = WalkDir::new(root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        while let Some(item) = walker.next() {
            let entry = match item {
                Ok(entry) => entry,
                Err(err) => {
                    let denied = err
                        .io_error()
                        .is_some_and(|e| e.kind() == io::ErrorKind::PermissionDenied);
                    if denied {
                        trace!(?err, "skipping entry: permission denied");
                        continue;
                    }
                    return Err(Error::Io(io::Error::from(err)));
                }
            };

            let path = entry.path();
            let is_dir = entry.file_type().is_dir();
            if is_dir {
                ignore::load_into(&mut stack, path)?;
            }

            // Innermost ignore file first; the first decisive verdict wins.
            let mut verdict = Verdict::None;
            for frame in stack.iter().rev() {
                if frame.dir() == path {
                    continue;
                }
                if let Ok(rel) = path.strip_prefix(frame.dir()) {
                    match frame.verdict(rel, is_dir) {
                        Verdict::None => {}
                        decisive => {
                            verdict = decisive;
                            break;
                        }
                    }
                }
            }
            let ignored = verdict == Verdict::Ignore;

            match self.mode() {
                Mode::Restic => {
                    if ignored {
                        if is_dir {
                            walker.skip_current_dir();
                        }
                        continue;
                    }
                    let line = utils::to_slash(path.to_string_lossy().into_owned());
                    entries.push(Entry::new(line, is_dir));
                }
                Mode::Syncthing => {
                    if !ignored {
                        continue;
                    }
                    let rel = path.strip_prefix(root).unwrap_or(path);
                    let mut line = format!("/{}", rel.to_string_lossy());
                    if cfg!(windows) {
                        line = utils::strip_drive_letter(&line).to_string();
                    }
                    entries.push(Entry::new(utils::to_slash(line), is_dir));
                }
            }
        }

        debug!(
            root = %root.display(),
            entries = entries.len(),
            ignore_files = stack.len(),
            "walk complete"
        );
        self.project(&entries);
        Ok(())
    }
}
