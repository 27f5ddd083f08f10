//! Shared helpers for the behavioral specs.
//!
//! A `Project` is a scratch directory holding run files and daemon output.
//! `brood` runs are synchronous; `broodd` is spawned and waited for.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command as StdCommand, Stdio};
use std::time::{Duration, Instant};

pub use assert_cmd::Command;
use tempfile::TempDir;

/// How long a spec waits for a daemon to wind down on its own
pub const EXIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Run file for a master with a short contact timeout
pub fn master_run_file(pool_size: usize, iterations: usize, extra: &str) -> String {
    format!(
        r#"
[job]
kind = "master"
pool_size = {pool_size}
glob_opt_iterations = {iterations}

[timeouts]
contact = "1s"
job = "5s"

[problem]
objective = "sphere"
dimensions = 3
lower = -5.0
upper = 5.0

{extra}
"#
    )
}

pub struct Project {
    dir: TempDir,
}

impl Project {
    pub fn empty() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn file(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    pub fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.path().join(rel)).unwrap()
    }

    /// `brood` with fast polling so specs do not sleep for seconds
    pub fn brood(&self) -> Cli {
        let mut cmd = Command::cargo_bin("brood").unwrap();
        cmd.current_dir(self.path())
            .env("BROOD_POLL_INTERVAL_MS", "50")
            .env("BROOD_REGISTER_WAIT_MS", "50")
            .env("BROOD_TIMEOUT_IPC_MS", "5000")
            .env_remove("BROOD_KEY")
            .env_remove("RUST_LOG");
        Cli { cmd }
    }

    /// `broodd` run to completion, for configurations that fail fast
    pub fn broodd(&self) -> Cli {
        let mut cmd = Command::cargo_bin("broodd").unwrap();
        cmd.current_dir(self.path())
            .env_remove("BROOD_KEY")
            .env_remove("RUST_LOG");
        Cli { cmd }
    }

    /// Start `broodd` on an ephemeral port and wait for READY
    pub fn serve(&self, run_file: &Path) -> Daemon {
        let mut child = StdCommand::new(assert_cmd::cargo::cargo_bin("broodd"))
            .current_dir(self.path())
            .arg(run_file)
            .args(["--listen", "127.0.0.1:0"])
            .arg("--output")
            .arg(self.path().join("out"))
            .arg("--log-file")
            .arg(self.path().join("broodd.log"))
            .env_remove("BROOD_KEY")
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();

        let stdout = child.stdout.take().unwrap();
        let mut line = String::new();
        BufReader::new(stdout).read_line(&mut line).unwrap();
        let addr = match line.trim().strip_prefix("READY ") {
            Some(addr) => addr.to_string(),
            None => {
                let _ = child.kill();
                panic!("broodd did not become ready: {:?}", line);
            }
        };
        Daemon { child, addr }
    }
}

pub struct Cli {
    cmd: Command,
}

impl Cli {
    pub fn args(mut self, args: &[&str]) -> Self {
        self.cmd.args(args);
        self
    }

    pub fn arg(mut self, arg: impl AsRef<std::ffi::OsStr>) -> Self {
        self.cmd.arg(arg);
        self
    }

    pub fn passes(mut self) -> Run {
        let run = Run::from(self.cmd.output().unwrap());
        assert!(run.code == Some(0), "expected success, got {:?}\n{}", run.code, run);
        run
    }

    pub fn exits_with(mut self, code: i32) -> Run {
        let run = Run::from(self.cmd.output().unwrap());
        assert!(run.code == Some(code), "expected exit {}, got {:?}\n{}", code, run.code, run);
        run
    }
}

pub struct Run {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl From<std::process::Output> for Run {
    fn from(output: std::process::Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

impl std::fmt::Display for Run {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "--- stdout ---\n{}--- stderr ---\n{}", self.stdout, self.stderr)
    }
}

impl Run {
    pub fn stdout_has(&self, needle: &str) -> &Self {
        assert!(self.stdout.contains(needle), "stdout lacks {:?}\n{}", needle, self);
        self
    }

    pub fn stderr_has(&self, needle: &str) -> &Self {
        assert!(self.stderr.contains(needle), "stderr lacks {:?}\n{}", needle, self);
        self
    }
}

/// A running `broodd`, killed on drop if it has not exited
pub struct Daemon {
    child: Child,
    pub addr: String,
}

impl Daemon {
    /// Wait for the daemon to exit by itself
    pub fn wait(&mut self, timeout: Duration) -> Option<i32> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = self.child.try_wait().unwrap() {
                return status.code();
            }
            if Instant::now() >= deadline {
                panic!("broodd still running after {:?}", timeout);
            }
            std::thread::sleep(Duration::from_millis(50));
        }
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
