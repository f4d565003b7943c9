//! Launching and watching the external builder.

use super::BuildError;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, Scope};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Name of the builder entry point inside its installation directory.
pub const BUILD_SCRIPT: &str = "build.sh";

const WAIT_POLL: Duration = Duration::from_millis(10);

/// Start `<shell> <script>` in `workdir`.
///
/// The builder runs in its own process group so a timeout can take down
/// everything it spawned.
pub fn launch(shell: &str, script: &Path, workdir: &Path) -> Result<Child, BuildError> {
    if !script.is_file() {
        return Err(BuildError::MissingScript(script.to_path_buf()));
    }
    let mut command = Command::new(shell);
    command
        .arg(script)
        .current_dir(workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    let child = command.spawn().map_err(|source| BuildError::Launch {
        command: format!("{} {}", shell, script.display()),
        source,
    })?;
    info!(pid = child.id(), script = %script.display(), "builder started");
    Ok(child)
}

/// Forward the builder's output to the log and wait for it to exit.
///
/// Returns only after both output streams hit end-of-file and the process
/// has been reaped.
pub fn watch(mut child: Child, timeout: Option<Duration>) -> Result<(), BuildError> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let status = thread::scope(|s| {
        if let Some(out) = stdout {
            forward(s, out, "stdout");
        }
        if let Some(err) = stderr {
            forward(s, err, "stderr");
        }
        wait(&mut child, timeout)
    })?;

    if status.success() {
        info!("builder finished");
        Ok(())
    } else {
        Err(BuildError::Execution {
            code: status.code(),
        })
    }
}

fn forward<'scope, R>(s: &'scope Scope<'scope, '_>, stream: R, name: &'static str)
where
    R: Read + Send + 'scope,
{
    let spawned = thread::Builder::new()
        .name(format!("builder-{}", name))
        .spawn_scoped(s, move || forward_lines(stream, name));
    if let Err(e) = spawned {
        warn!(stream = name, error = %e, "cannot forward builder output");
    }
}

fn forward_lines<R: Read>(stream: R, name: &'static str) {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                info!(stream = name, "{}", line.trim_end_matches(['\n', '\r']));
            }
            Err(e) => {
                warn!(stream = name, error = %e, "reading builder output failed");
                break;
            }
        }
    }
}

fn wait(child: &mut Child, timeout: Option<Duration>) -> Result<ExitStatus, BuildError> {
    let Some(limit) = timeout else {
        return child.wait().map_err(BuildError::Wait);
    };
    let started = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {
                if started.elapsed() > limit {
                    kill_group(child);
                    let _ = child.wait();
                    warn!(timeout_ms = limit.as_millis() as u64, "builder timed out");
                    return Err(BuildError::Timeout { after: limit });
                }
                thread::sleep(WAIT_POLL);
            }
            Err(e) => {
                kill_group(child);
                let _ = child.wait();
                return Err(BuildError::Wait(e));
            }
        }
    }
}

fn kill_group(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Ok(pid) = libc::pid_t::try_from(child.id()) {
            // SAFETY: kill has no memory-safety preconditions; a negative pid
            // addresses the group created at launch.
            unsafe {
                libc::kill(-pid, libc::SIGKILL);
            }
        }
    }
    let _ = child.kill();
}
