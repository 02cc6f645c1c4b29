//! PID file based process control: start, stop, restart and status.
//!
//! A daemon is started by re-running the current executable with the same
//! arguments and [`DAEMON_ENV`] set; the parent records the child's PID and
//! exits.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tracing::debug;

use crate::{Error, Result};

pub const APP_NAME: &str = "kafka-forwarder";

/// Set in the environment of a re-spawned daemon child.
pub const DAEMON_ENV: &str = "__FORK_PROC__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ControlCommand {
    Start,
    Stop,
    Restart,
    Status,
}

/// What the process should do after a control command has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Exit immediately with this code.
    Exit(i32),
    /// Run the forwarder in the foreground.
    Run,
    /// Re-spawn as a background daemon.
    Daemonize,
}

#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// PID recorded in the file, unless it is missing, unreadable or ours.
    pub fn read(&self) -> Option<Pid> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        let pid: i32 = content.trim().parse().ok()?;
        if pid <= 0 || pid == std::process::id() as i32 {
            return None;
        }
        Some(Pid::from_raw(pid))
    }

    /// PID of another live instance, if there is one.
    pub fn running(&self) -> Option<Pid> {
        self.read().filter(|pid| is_alive(*pid))
    }

    pub fn write(&self, pid: u32) -> Result<()> {
        std::fs::write(&self.path, pid.to_string())?;
        Ok(())
    }
}

pub fn is_alive(pid: Pid) -> bool {
    // Signal 0 only checks that the process exists and can be signalled.
    kill(pid, None).is_ok()
}

/// Sends SIGINT and waits until the process is gone.
pub fn terminate(pid: Pid) -> Result<()> {
    match kill(pid, Signal::SIGINT) {
        Ok(()) => {}
        Err(Errno::ESRCH) => return Ok(()),
        Err(e) => return Err(Error::Process(format!("failed to signal {}: {}", pid, e))),
    }
    debug!(%pid, "SIGINT sent, waiting for exit");

    while is_alive(pid) {
        std::thread::sleep(Duration::from_millis(10));
    }
    Ok(())
}

/// True inside a child started by [`daemonize`].
pub fn is_daemon_child() -> bool {
    std::env::var(DAEMON_ENV).map(|v| v == "1").unwrap_or(false)
}

/// Handles a lifecycle command, printing its result for the operator.
pub fn dispatch(command: Option<ControlCommand>, daemon: bool, pid_file: &PidFile) -> Result<Action> {
    let running = pid_file.running();

    let daemon = match command {
        Some(ControlCommand::Status) => {
            match running {
                Some(pid) => println!("{} is running with PID {}", APP_NAME, pid),
                None => println!("{} is NOT running", APP_NAME),
            }
            return Ok(Action::Exit(0));
        }
        Some(ControlCommand::Stop) => {
            let Some(pid) = running else {
                println!("{} is NOT running", APP_NAME);
                return Ok(Action::Exit(1));
            };
            terminate(pid)?;
            println!("{} stopped OK", APP_NAME);
            return Ok(Action::Exit(0));
        }
        Some(ControlCommand::Restart) => {
            if let Some(pid) = running {
                terminate(pid)?;
                println!("{} stopped OK", APP_NAME);
            }
            true
        }
        Some(ControlCommand::Start) => true,
        None => daemon,
    };

    // A restart has just stopped the old instance.
    if let Some(pid) = pid_file.running() {
        println!("{} is running, can't start, PID {}", APP_NAME, pid);
        return Ok(Action::Exit(1));
    }

    Ok(if daemon { Action::Daemonize } else { Action::Run })
}

/// Re-spawns the current executable in the background and records its PID.
///
/// Returns the child PID; the caller is expected to exit.
pub fn daemonize(pid_file: &PidFile) -> Result<u32> {
    let exe = std::env::current_exe()?;
    let child = std::process::Command::new(exe)
        .args(std::env::args_os().skip(1))
        .env(DAEMON_ENV, "1")
        .spawn()
        .map_err(|e| Error::Process(format!("failed to daemonize: {}", e)))?;

    let pid = child.id();
    pid_file
        .write(pid)
        .map_err(|e| Error::Process(format!("failed to write PID file {:?}: {}", pid_file.path(), e)))?;

    Ok(pid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_pid_file_missing_or_garbage() {
        let temp_dir = TempDir::new().unwrap();
        let pid_file = PidFile::new(temp_dir.path().join("pid"));
        assert!(pid_file.read().is_none());

        std::fs::write(pid_file.path(), "").unwrap();
        assert!(pid_file.read().is_none());

        std::fs::write(pid_file.path(), "not-a-pid").unwrap();
        assert!(pid_file.read().is_none());
    }

    #[test]
    fn test_pid_file_ignores_own_pid() {
        let temp_dir = TempDir::new().unwrap();
        let pid_file = PidFile::new(temp_dir.path().join("pid"));

        pid_file.write(std::process::id()).unwrap();
        assert!(pid_file.read().is_none());
        assert!(pid_file.running().is_none());
    }

    #[test]
    fn test_running_detects_live_process() {
        let temp_dir = TempDir::new().unwrap();
        let pid_file = PidFile::new(temp_dir.path().join("pid"));

        let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        pid_file.write(child.id()).unwrap();
        assert_eq!(pid_file.running(), Some(Pid::from_raw(child.id() as i32)));

        child.kill().unwrap();
        child.wait().unwrap();
        assert!(pid_file.running().is_none());
    }

    #[test]
    fn test_dispatch_without_running_instance() {
        let temp_dir = TempDir::new().unwrap();
        let pid_file = PidFile::new(temp_dir.path().join("pid"));

        assert_eq!(dispatch(Some(ControlCommand::Status), false, &pid_file).unwrap(), Action::Exit(0));
        assert_eq!(dispatch(Some(ControlCommand::Stop), false, &pid_file).unwrap(), Action::Exit(1));
        assert_eq!(dispatch(Some(ControlCommand::Start), false, &pid_file).unwrap(), Action::Daemonize);
        assert_eq!(dispatch(Some(ControlCommand::Restart), false, &pid_file).unwrap(), Action::Daemonize);
        assert_eq!(dispatch(None, true, &pid_file).unwrap(), Action::Daemonize);
        assert_eq!(dispatch(None, false, &pid_file).unwrap(), Action::Run);
    }

    #[test]
    fn test_dispatch_refuses_second_instance() {
        let temp_dir = TempDir::new().unwrap();
        let pid_file = PidFile::new(temp_dir.path().join("pid"));

        let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        pid_file.write(child.id()).unwrap();

        assert_eq!(dispatch(None, false, &pid_file).unwrap(), Action::Exit(1));
        assert_eq!(dispatch(Some(ControlCommand::Start), false, &pid_file).unwrap(), Action::Exit(1));

        child.kill().unwrap();
        child.wait().unwrap();
    }

    #[test]
    fn test_stop_terminates_running_instance() {
        let temp_dir = TempDir::new().unwrap();
        let pid_file = PidFile::new(temp_dir.path().join("pid"));

        let child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        pid_file.write(child.id()).unwrap();

        // Reap in the background so the exited child does not linger as a zombie.
        let reaper = std::thread::spawn(move || {
            let mut child = child;
            child.wait().unwrap()
        });

        assert_eq!(dispatch(Some(ControlCommand::Stop), false, &pid_file).unwrap(), Action::Exit(0));
        reaper.join().unwrap();
    }
}
