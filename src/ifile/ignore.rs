//! Compiled ignore files and the verdicts they hand to the walker.
//!
//! An [`IgnoreFile`] couples a compiled gitignore-syntax matcher with the
//! directory it was loaded from. The walker keeps a stack of these and asks
//! each one, innermost first, for a verdict on the path at hand.

use crate::ifile::Error;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Standard gitignore file name recognised during walks.
pub const GITIGNORE: &str = ".gitignore";
/// Kopyat's own ignore file, same grammar as `.gitignore`.
pub const KOPYATIGNORE: &str = ".kopyatignore";

/// What a single ignore file has to say about a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    /// The last matching rule ignores the path.
    Ignore,
    /// The last matching rule is a `!` negation: the path is re-included.
    Whitelist,
    /// No rule matched; outer ignore files get to decide.
    None,
}

/// A compiled ignore file plus the directory it governs.
///
/// The matcher is pure: evaluating the same path twice yields the same
/// verdict.
pub(crate) struct IgnoreFile {
    dir: PathBuf,
    matcher: Gitignore,
}

impl IgnoreFile {
    /// Compiles the ignore file at `dir/name`.
    fn compile(dir: &Path, name: &str) -> Result<Self, Error> {
        let path = dir.join(name);
        let mut builder = GitignoreBuilder::new(dir);
        if let Some(err) = builder.add(&path) {
            return Err(Error::BadPattern { path, source: err });
        }
        let matcher = builder.build().map_err(|err| Error::BadPattern {
            path: path.clone(),
            source: err,
        })?;
        debug!(path = %path.display(), "compiled ignore file");
        Ok(Self {
            dir: dir.to_path_buf(),
            matcher,
        })
    }

    /// The directory this ignore file was loaded from. Its rules only apply
    /// to paths below it.
    pub(crate) fn dir(&self) -> &Path {
        &self.dir
    }

    /// Evaluates `rel` (relative to [`dir`](Self::dir)) against the compiled
    /// rules. Rules matching any parent directory of `rel` apply to it as
    /// well, mirroring gitignore's "ignored directory contents" behaviour.
    pub(crate) fn verdict(&self, rel: &Path, is_dir: bool) -> Verdict {
        match self.matcher.matched_path_or_any_parents(rel, is_dir) {
            m if m.is_ignore() => Verdict::Ignore,
            m if m.is_whitelist() => Verdict::Whitelist,
            _ => Verdict::None,
        }
    }
}

/// Pushes onto `stack` any ignore files present in `dir`.
///
/// `.gitignore` is loaded before `.kopyatignore`, so for paths both govern
/// the kopyat file sits closer to the top of the stack and wins.
pub(crate) fn load_into(stack: &mut Vec<IgnoreFile>, dir: &Path) -> Result<(), Error> {
    for name in [GITIGNORE, KOPYATIGNORE] {
        if dir.join(name).is_file() {
            stack.push(IgnoreFile::compile(dir, name)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_verdict_anchored_and_unanchored() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".gitignore"), "3\n/5\n/4/6\n").unwrap();

        let mut stack = Vec::new();
        load_into(&mut stack, temp.path()).unwrap();
        assert_eq!(stack.len(), 1);
        let ig = &stack[0];

        // Unanchored "3" matches at any depth.
        assert_eq!(ig.verdict(Path::new("3"), false), Verdict::Ignore);
        assert_eq!(ig.verdict(Path::new("4/3"), false), Verdict::Ignore);

        // Anchored "/5" matches only at the top level.
        assert_eq!(ig.verdict(Path::new("5"), false), Verdict::Ignore);
        assert_eq!(ig.verdict(Path::new("4/5"), false), Verdict::None);

        // "/4/6" is anchored by its inner slash.
        assert_eq!(ig.verdict(Path::new("4/6"), false), Verdict::Ignore);
        assert_eq!(ig.verdict(Path::new("6"), false), Verdict::None);
    }

    #[test]
    fn test_verdict_negation() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".gitignore"), "*.log\n!keep.log\n").unwrap();

        let mut stack = Vec::new();
        load_into(&mut stack, temp.path()).unwrap();
        let ig = &stack[0];

        assert_eq!(ig.verdict(Path::new("debug.log"), false), Verdict::Ignore);
        assert_eq!(ig.verdict(Path::new("keep.log"), false), Verdict::Whitelist);
        assert_eq!(ig.verdict(Path::new("notes.txt"), false), Verdict::None);
    }

    #[test]
    fn test_verdict_directory_only() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".gitignore"), "build/\n").unwrap();

        let mut stack = Vec::new();
        load_into(&mut stack, temp.path()).unwrap();
        let ig = &stack[0];

        assert_eq!(ig.verdict(Path::new("build"), true), Verdict::Ignore);
        assert_eq!(ig.verdict(Path::new("build"), false), Verdict::None);
        // Contents of an ignored directory are ignored too.
        assert_eq!(ig.verdict(Path::new("build/out.o"), false), Verdict::Ignore);
    }

    #[test]
    fn test_verdict_double_star() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".gitignore"), "a/**/z\n").unwrap();

        let mut stack = Vec::new();
        load_into(&mut stack, temp.path()).unwrap();
        let ig = &stack[0];

        assert_eq!(ig.verdict(Path::new("a/z"), false), Verdict::Ignore);
        assert_eq!(ig.verdict(Path::new("a/b/c/z"), false), Verdict::Ignore);
        assert_eq!(ig.verdict(Path::new("b/z"), false), Verdict::None);
    }

    #[test]
    fn test_blank_lines_and_comments_skipped() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".gitignore"), "#1\n#2\n\n3\n\n").unwrap();

        let mut stack = Vec::new();
        load_into(&mut stack, temp.path()).unwrap();
        let ig = &stack[0];

        assert_eq!(ig.verdict(Path::new("3"), false), Verdict::Ignore);
        assert_eq!(ig.verdict(Path::new("#1"), false), Verdict::None);
    }

    #[test]
    fn test_kopyatignore_recognised() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(KOPYATIGNORE), "secret\n").unwrap();

        let mut stack = Vec::new();
        load_into(&mut stack, temp.path()).unwrap();
        assert_eq!(stack.len(), 1);
        assert_eq!(
            stack[0].verdict(Path::new("secret"), false),
            Verdict::Ignore
        );
    }

    #[test]
    fn test_both_files_stack_in_order() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(GITIGNORE), "a\n").unwrap();
        fs::write(temp.path().join(KOPYATIGNORE), "b\n").unwrap();

        let mut stack = Vec::new();
        load_into(&mut stack, temp.path()).unwrap();
        assert_eq!(stack.len(), 2);
        // .kopyatignore is pushed last, so a reverse scan sees it first.
        assert_eq!(stack[1].verdict(Path::new("b"), false), Verdict::Ignore);
    }

    #[test]
    fn test_bad_pattern_is_surfaced() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".gitignore"), "a[\n").unwrap();

        let mut stack = Vec::new();
        let err = load_into(&mut stack, temp.path()).unwrap_err();
        assert!(matches!(err, Error::BadPattern { .. }));
    }

    #[test]
    fn test_missing_files_load_nothing() {
        let temp = TempDir::new().unwrap();
        let mut stack = Vec::new();
        load_into(&mut stack, temp.path()).unwrap();
        assert!(stack.is_empty());
    }
}
