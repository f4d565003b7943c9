//! Build orchestration: pipe, builder process and row writer.
//!
//! One partition is built as follows:
//!
//! 1. Create `pipe_file` in the working directory.
//! 2. Write the build instructions to `build.sql`.
//! 3. The `builder-watcher` thread launches `<shell> <binary_dir>/build.sh`
//!    and reports the launch through a one-shot start channel.
//! 4. Once launched, the `row-writer` thread streams encoded rows into the
//!    pipe while the watcher forwards builder output and waits for exit.
//! 5. Both threads are joined. A builder failure wins over a write failure.
//!    A builder that exits without ever opening the pipe fails the write,
//!    even when the rows fit into the pipe buffer.

pub mod pipe;
pub mod process;

use crate::encode::{EncodeError, RowEncoder};
use pl_common::{FailureKind, Row};
use pl_config::BuilderConfig;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

pub use pipe::PIPE_FILE;
pub use process::BUILD_SCRIPT;

/// Fixed name of the instruction file inside the working directory.
pub const BUILD_SQL_FILE: &str = "build.sql";

/// Errors from building one partition.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to prepare {}: {source}", .path.display())]
    Setup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("build script not found: {}", .0.display())]
    MissingScript(PathBuf),

    #[error("failed to launch `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to start {name} thread: {source}")]
    Thread {
        name: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("builder exited with {}", .code.map_or_else(|| "a signal".to_string(), |c| format!("status {}", c)))]
    Execution { code: Option<i32> },

    #[error("failed waiting for builder: {0}")]
    Wait(#[source] io::Error),

    #[error("{0} thread panicked")]
    Panicked(&'static str),

    #[error("writing rows to the builder failed: {0}")]
    Write(#[source] EncodeError),

    #[error("builder did not finish within {}s", .after.as_secs())]
    Timeout { after: Duration },
}

impl BuildError {
    pub fn kind(&self) -> FailureKind {
        match self {
            BuildError::Setup { .. } | BuildError::Thread { .. } => FailureKind::Setup,
            BuildError::MissingScript(_) | BuildError::Launch { .. } => FailureKind::Launch,
            BuildError::Execution { .. } | BuildError::Wait(_) | BuildError::Panicked(_) => {
                FailureKind::Execution
            }
            BuildError::Write(_) => FailureKind::Write,
            BuildError::Timeout { .. } => FailureKind::Timeout,
        }
    }
}

/// Result of a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    pub rows_written: u64,
    pub elapsed: Duration,
}

/// Drives the external builder for one partition at a time.
#[derive(Debug, Clone)]
pub struct BuildOrchestrator {
    binary_dir: PathBuf,
    shell: String,
    timeout: Option<Duration>,
}

impl BuildOrchestrator {
    pub fn new(binary_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary_dir: binary_dir.into(),
            shell: "sh".to_string(),
            timeout: None,
        }
    }

    pub fn from_config(config: &BuilderConfig) -> Self {
        Self {
            binary_dir: config.binary_dir.clone(),
            shell: config.shell.clone(),
            timeout: config.timeout(),
        }
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn script(&self) -> PathBuf {
        self.binary_dir.join(BUILD_SCRIPT)
    }

    /// Build one partition inside `workdir`.
    ///
    /// `workdir` must exist and be exclusive to this call. Rows are consumed
    /// by the writer thread only after the builder has been launched.
    pub fn run<I>(
        &self,
        workdir: &Path,
        build_sql: &str,
        encoder: &RowEncoder,
        rows: I,
    ) -> Result<BuildOutcome, BuildError>
    where
        I: IntoIterator<Item = Row>,
        I::IntoIter: Send,
    {
        let started = Instant::now();
        let pipe_path = workdir.join(PIPE_FILE);
        pipe::create(&pipe_path)?;

        let sql_path = workdir.join(BUILD_SQL_FILE);
        fs::write(&sql_path, build_sql).map_err(|source| BuildError::Setup {
            path: sql_path.clone(),
            source,
        })?;
        debug!(path = %sql_path.display(), "build instructions written");

        let script = self.script();
        let rows = rows.into_iter();
        let opened = AtomicBool::new(false);

        let rows_written = thread::scope(|s| {
            let (start_tx, start_rx) = mpsc::sync_channel::<Result<(), BuildError>>(1);

            let watcher = thread::Builder::new()
                .name("builder-watcher".to_string())
                .spawn_scoped(s, || {
                    let child = match process::launch(&self.shell, &script, workdir) {
                        Ok(child) => {
                            let _ = start_tx.send(Ok(()));
                            child
                        }
                        Err(e) => {
                            let _ = start_tx.send(Err(e));
                            return Ok(());
                        }
                    };
                    drop(start_tx);
                    process::watch(child, self.timeout)
                })
                .map_err(|source| BuildError::Thread {
                    name: "builder-watcher",
                    source,
                })?;

            match start_rx.recv() {
                Ok(Ok(())) => {}
                Ok(Err(launch_error)) => {
                    let _ = watcher.join();
                    return Err(launch_error);
                }
                Err(_) => {
                    let _ = watcher.join();
                    return Err(BuildError::Panicked("builder-watcher"));
                }
            }

            let writer = thread::Builder::new()
                .name("row-writer".to_string())
                .spawn_scoped(s, || -> Result<u64, BuildError> {
                    let out = pipe::open_writer(&pipe_path)
                        .map_err(|source| BuildError::Write(EncodeError::Io { rows: 0, source }))?;
                    opened.store(true, Ordering::SeqCst);
                    encoder.write_rows(rows, out).map_err(BuildError::Write)
                });
            let writer = match writer {
                Ok(handle) => handle,
                Err(source) => {
                    pipe::release_reader(&pipe_path, || watcher.is_finished());
                    let _ = watcher.join();
                    return Err(BuildError::Thread {
                        name: "row-writer",
                        source,
                    });
                }
            };

            let process = watcher
                .join()
                .unwrap_or(Err(BuildError::Panicked("builder-watcher")));
            // Read before release_writer, which may complete the open itself.
            let opened_by_builder = opened.load(Ordering::SeqCst);
            pipe::release_writer(&pipe_path, || writer.is_finished());
            let written = writer
                .join()
                .unwrap_or(Err(BuildError::Panicked("row-writer")));

            process?;
            let rows = written?;
            if !opened_by_builder {
                return Err(BuildError::Write(EncodeError::Io {
                    rows,
                    source: io::Error::new(
                        io::ErrorKind::BrokenPipe,
                        "builder exited without opening the input pipe",
                    ),
                }));
            }
            Ok(rows)
        })?;

        let elapsed = started.elapsed();
        info!(
            rows = rows_written,
            elapsed_ms = elapsed.as_millis() as u64,
            "partition built"
        );
        Ok(BuildOutcome {
            rows_written,
            elapsed,
        })
    }
}
