#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

/// Create a file (and its parent directories) with the given content.
pub fn create_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("failed to create parent directories");
    }
    fs::write(path, content).expect("failed to create file");
}

/// Create a directory and all of its parents.
pub fn create_dir(path: &Path) {
    fs::create_dir_all(path).expect("failed to create directory");
}

/// Read an ifile into its lines, tolerating a missing file.
pub fn ifile_lines(path: &Path) -> Vec<String> {
    match fs::read_to_string(path) {
        Ok(content) => content.lines().map(str::to_string).collect(),
        Err(_) => Vec::new(),
    }
}

/// Poll `cond` until it holds or a 10 second deadline passes.
///
/// # Panics
///
/// Panics with `what` in the message on timeout.
pub fn wait_for(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if cond() {
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
    panic!("timed out waiting for {what}");
}
