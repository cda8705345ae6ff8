mod common;

use common::{create_dir, create_file, ifile_lines, wait_for};
use kopyat::ifile::{Error, IfileWalker, Mode, Status, Walker, WatchJob};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Delegates to the real walker and counts the passes.
struct CountingWalker {
    inner: IfileWalker,
    count: Arc<AtomicUsize>,
}

impl Walker for CountingWalker {
    fn walk(&self) -> Result<(), Error> {
        let result = self.inner.walk();
        self.count.fetch_add(1, Ordering::SeqCst);
        result
    }
}

/// Succeeds on the first call, fails on every subsequent one.
struct FlakyWalker {
    count: Arc<AtomicUsize>,
}

impl Walker for FlakyWalker {
    fn walk(&self) -> Result<(), Error> {
        if self.count.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok(())
        } else {
            Err(Error::Io(io::Error::other("test walk error")))
        }
    }
}

struct FailingWalker {
    count: Arc<AtomicUsize>,
}

impl Walker for FailingWalker {
    fn walk(&self) -> Result<(), Error> {
        self.count.fetch_add(1, Ordering::SeqCst);
        Err(Error::Io(io::Error::other("test walk error")))
    }
}

fn counting_job(
    ifile: &std::path::Path,
    scan: &std::path::Path,
) -> (Arc<WatchJob>, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let walker = CountingWalker {
        inner: IfileWalker::new(ifile, scan, Mode::Syncthing),
        count: Arc::clone(&count),
    };
    let job = WatchJob::with_walker(ifile, scan, Mode::Syncthing, Box::new(walker))
        .debounce(Duration::from_millis(250));
    (Arc::new(job), count)
}

#[test]
fn test_watch_detects_new_ignore_rule() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    create_dir(&root.join("ifile"));
    let ifile = root.join("kopyat_ifile");

    let (job, walks) = counting_job(&ifile, root);
    let runner = Arc::clone(&job);
    let handle = thread::spawn(move || runner.run());

    wait_for("job to start running", || job.status() == Status::Running);

    // Neither existed at startup; both ride the recursive subscription.
    create_file(&root.join("ifile/.gitignore"), "test_txtfile");
    create_file(&root.join("ifile/test_txtfile"), "");

    wait_for("ifile to pick up the new rule", || {
        ifile_lines(&ifile).contains(&"/ifile/test_txtfile".to_string())
    });
    // One initial walk plus one debounced follow-up for the burst.
    assert!(
        walks.load(Ordering::SeqCst) <= 2,
        "burst should debounce into a single follow-up walk"
    );

    job.shutdown();
    handle.join().unwrap().unwrap();
    assert_eq!(job.status(), Status::Stopped);
}

#[test]
fn test_watch_detects_file_in_new_directory() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    create_dir(&root.join("ifile"));
    let ifile = root.join("kopyat_ifile");

    let (job, walks) = counting_job(&ifile, root);
    let runner = Arc::clone(&job);
    let handle = thread::spawn(move || runner.run());

    wait_for("job to start running", || job.status() == Status::Running);

    create_dir(&root.join("ifile/testdir"));
    create_file(&root.join("ifile/.gitignore"), "/testdir/test_txtfile");
    create_file(&root.join("ifile/testdir/test_txtfile"), "");

    wait_for("ifile to list the nested file", || {
        ifile_lines(&ifile).contains(&"/ifile/testdir/test_txtfile".to_string())
    });
    assert!(
        walks.load(Ordering::SeqCst) <= 4,
        "three-event burst should coalesce into a handful of walks"
    );

    job.shutdown();
    handle.join().unwrap().unwrap();
    assert_eq!(job.status(), Status::Stopped);
}

#[test]
fn test_failure_budget() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let ifile = root.join("kopyat_ifile");

    let count = Arc::new(AtomicUsize::new(0));
    let walker = FlakyWalker {
        count: Arc::clone(&count),
    };
    let job = Arc::new(
        WatchJob::with_walker(&ifile, root, Mode::Syncthing, Box::new(walker))
            .debounce(Duration::from_millis(50))
            .fail_after(Duration::from_secs(4)),
    );
    let runner = Arc::clone(&job);
    let handle = thread::spawn(move || runner.run());

    wait_for("job to start running", || job.status() == Status::Running);

    // Trigger a walk that fails.
    create_file(&root.join("trigger_1"), "");
    wait_for("first failed walk", || count.load(Ordering::SeqCst) >= 2);

    // Inside the window the job keeps running, errors recorded.
    let info = job.info();
    assert_eq!(info.status, Status::Running);
    assert!(!info.errors.is_empty());

    // Let the budget lapse, then trigger one more failing walk.
    thread::sleep(Duration::from_millis(4050));
    create_file(&root.join("trigger_2"), "");

    wait_for("job to fail", || job.status() == Status::Failed);
    let result = handle.join().unwrap();
    assert!(matches!(result, Err(Error::JobFailed(_))));
    assert!(!job.info().errors.is_empty());
}

#[test]
fn test_initial_walk_failure_is_fatal() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let ifile = root.join("kopyat_ifile");

    let count = Arc::new(AtomicUsize::new(0));
    let walker = FailingWalker {
        count: Arc::clone(&count),
    };
    let job = WatchJob::with_walker(&ifile, root, Mode::Syncthing, Box::new(walker));

    let result = job.run();
    assert!(result.is_err());
    assert_eq!(job.status(), Status::Failed);
    // Exactly the initial walk ran; no events were ever consumed.
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(job.ifile(), ifile.as_path());
    assert_eq!(job.scan_path(), root);
}

#[test]
fn test_failing_pre_hook_aborts_initial_walk() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let ifile = root.join("kopyat_ifile");

    let count = Arc::new(AtomicUsize::new(0));
    let walker = CountingWalker {
        inner: IfileWalker::new(&ifile, root, Mode::Syncthing),
        count: Arc::clone(&count),
    };
    let job = WatchJob::with_walker(&ifile, root, Mode::Syncthing, Box::new(walker))
        .pre_hook(Box::new(|| anyhow::bail!("nothing")));

    let result = job.run();
    assert!(matches!(result, Err(Error::Hook { .. })));
    assert_eq!(job.status(), Status::Failed);
    // The hook failed before the walk could start.
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn test_failing_post_hook_is_recorded_not_fatal() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let ifile = root.join("kopyat_ifile");

    let job = Arc::new(
        WatchJob::new(&ifile, root, Mode::Syncthing)
            .debounce(Duration::from_millis(50))
            .post_hook(Box::new(|| anyhow::bail!("nothing"))),
    );
    let runner = Arc::clone(&job);
    let handle = thread::spawn(move || runner.run());

    wait_for("job to start running", || job.status() == Status::Running);
    let info = job.info();
    assert_eq!(info.status, Status::Running);
    assert!(info.errors.iter().any(|e| e.contains("post-walk")));
    // The ifile was still emitted.
    assert!(ifile.exists());

    job.shutdown();
    handle.join().unwrap().unwrap();
    assert_eq!(job.status(), Status::Stopped);
}

#[test]
fn test_shutdown_returns_promptly() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    create_file(&root.join("some_file"), "");
    let ifile = root.join("kopyat_ifile");

    let job = Arc::new(WatchJob::new(&ifile, root, Mode::Syncthing));
    let runner = Arc::clone(&job);
    let handle = thread::spawn(move || runner.run());

    wait_for("job to start running", || job.status() == Status::Running);

    let start = Instant::now();
    job.shutdown();
    job.shutdown(); // idempotent
    handle.join().unwrap().unwrap();
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(job.status(), Status::Stopped);

    // Late events after shutdown are discarded without effect.
    create_file(&root.join("late_file"), "");
    thread::sleep(Duration::from_millis(200));
    assert_eq!(job.status(), Status::Stopped);
}
