//! Named pipe between the row writer and the builder.

use super::BuildError;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Fixed name of the pipe inside the working directory.
pub const PIPE_FILE: &str = "pipe_file";

const RELEASE_POLL: Duration = Duration::from_millis(10);

/// Create the FIFO at `path`.
///
/// A failing `mkfifo` is tolerated when the path exists afterwards.
#[cfg(unix)]
pub fn create(path: &Path) -> Result<(), BuildError> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| BuildError::Setup {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidInput, "path contains a NUL byte"),
    })?;
    // SAFETY: c_path is a valid NUL-terminated string for the duration of the call.
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o644) };
    if rc != 0 {
        let err = io::Error::last_os_error();
        if !path.exists() {
            return Err(BuildError::Setup {
                path: path.to_path_buf(),
                source: err,
            });
        }
        warn!(path = %path.display(), error = %err, "mkfifo failed but path exists, reusing it");
    }
    debug!(path = %path.display(), "pipe created");
    Ok(())
}

#[cfg(not(unix))]
pub fn create(path: &Path) -> Result<(), BuildError> {
    Err(BuildError::Setup {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::Unsupported, "named pipes require unix"),
    })
}

/// Open the pipe for writing. Blocks until a reader attaches.
pub fn open_writer(path: &Path) -> io::Result<File> {
    OpenOptions::new().write(true).open(path)
}

/// Unblock a writer stuck on a pipe nobody reads any more.
///
/// Repeatedly attaches a short-lived non-blocking reader until `done`
/// reports the writer has returned. The writer then either completes its
/// `open` or sees a broken pipe on its next write.
pub fn release_writer(path: &Path, done: impl Fn() -> bool) {
    let mut attempts = 0u32;
    while !done() {
        if let Ok(reader) = open_nonblocking(path, false) {
            thread::sleep(RELEASE_POLL);
            drop(reader);
        }
        // The writer only notices the missing reader while none is attached.
        thread::sleep(RELEASE_POLL);
        attempts += 1;
    }
    if attempts > 0 {
        debug!(attempts, "released blocked row writer");
    }
}

/// Unblock a reader waiting for a writer that will never come.
///
/// Used when the row writer could not be started: the builder sees an empty
/// input instead of blocking forever in `open`.
pub fn release_reader(path: &Path, done: impl Fn() -> bool) {
    while !done() {
        if let Ok(writer) = open_nonblocking(path, true) {
            drop(writer);
        }
        thread::sleep(RELEASE_POLL);
    }
}

#[cfg(unix)]
fn open_nonblocking(path: &Path, write: bool) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    OpenOptions::new()
        .read(!write)
        .write(write)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
}

#[cfg(not(unix))]
fn open_nonblocking(path: &Path, write: bool) -> io::Result<File> {
    OpenOptions::new().read(!write).write(write).open(path)
}
