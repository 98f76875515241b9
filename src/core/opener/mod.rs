//! Reveal a directory in the platform file browser.
//!
//! Opening is best-effort: callers log a failure and carry on.

use std::io;
use std::path::Path;
use std::process::{Command, ExitStatus};
use std::thread::{self, JoinHandle};
use tracing::debug;

/// Something that can show a folder to the user
pub trait FolderOpener: Send + Sync {
    fn open(&self, path: &Path) -> io::Result<()>;
}

/// Opens folders with the desktop's file browser
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl FolderOpener for SystemOpener {
    fn open(&self, path: &Path) -> io::Result<()> {
        open_folder(path)
    }
}

/// Launch the file browser on `path` without waiting for it
pub fn open_folder(path: &Path) -> io::Result<()> {
    let program = browser_program().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::Unsupported,
            "opening folders is not supported on this platform",
        )
    })?;

    spawn_reaped(Command::new(program).arg(path))?;
    Ok(())
}

/// Spawn `command` and wait for it on a background thread, so the child is
/// reaped without blocking the caller.
fn spawn_reaped(command: &mut Command) -> io::Result<JoinHandle<io::Result<ExitStatus>>> {
    let mut child = command.spawn()?;

    thread::Builder::new()
        .name("hashimg-opener".to_string())
        .spawn(move || {
            let status = child.wait();
            debug!(?status, "file browser exited");
            status
        })
}

fn browser_program() -> Option<&'static str> {
    if cfg!(target_os = "windows") {
        Some("explorer")
    } else if cfg!(target_os = "macos") {
        Some("open")
    } else if cfg!(any(
        target_os = "linux",
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd"
    )) {
        Some("xdg-open")
    } else {
        None
    }
}
