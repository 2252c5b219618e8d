//! Fetching a repository into a scoped local workspace.
//!
//! The workspace owns its temporary directory; dropping it removes the
//! checkout whether analysis succeeded, failed or panicked.

use crate::model::ScanFailure;
use regex::Regex;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::LazyLock;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

static GITHUB_SHORTHAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<owner>[A-Za-z0-9_.-]+)/(?P<repo>[A-Za-z0-9_.-]+)$").expect("valid regex")
});

#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("invalid repository identifier: {0}")]
    InvalidIdentifier(String),
    #[error("unable to create workspace: {0}")]
    Workspace(#[source] std::io::Error),
    #[error("unable to execute git: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("git clone failed with exit code {code:?}: {stderr}")]
    CloneFailed { code: Option<i32>, stderr: String },
    #[error("git clone timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

impl AcquireError {
    pub fn to_failure(&self) -> ScanFailure {
        match self {
            AcquireError::Timeout(limit) => ScanFailure::Timeout {
                seconds: limit.as_secs(),
            },
            other => ScanFailure::AcquireFailed {
                reason: other.to_string(),
            },
        }
    }
}

/// A local checkout. The directory is deleted when this value is dropped.
#[derive(Debug)]
pub struct RepoWorkspace {
    _dir: TempDir,
    root: PathBuf,
}

impl RepoWorkspace {
    /// Wraps `dir` with the checkout living at `root` (inside `dir`).
    pub fn new(dir: TempDir, root: PathBuf) -> Self {
        Self { _dir: dir, root }
    }

    /// A workspace whose checkout is the temporary directory itself.
    pub fn from_temp_dir(dir: TempDir) -> Self {
        let root = dir.path().to_path_buf();
        Self { _dir: dir, root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Source of repository checkouts.
pub trait Acquire: Send + Sync {
    fn acquire(&self, identifier: &str) -> Result<RepoWorkspace, AcquireError>;
}

/// Shallow `git clone` with a hard deadline.
#[derive(Debug, Clone)]
pub struct GitAcquirer {
    timeout: Duration,
}

impl GitAcquirer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Acquire for GitAcquirer {
    fn acquire(&self, identifier: &str) -> Result<RepoWorkspace, AcquireError> {
        let (url, name) = clone_target(identifier)?;
        let dir = tempfile::Builder::new()
            .prefix("mcp_repo_")
            .tempdir()
            .map_err(AcquireError::Workspace)?;
        let target = dir.path().join(&name);
        debug!(url = %url, target = %target.display(), "cloning");

        let mut child = Command::new("git")
            .arg("clone")
            .arg("--depth")
            .arg("1")
            .arg("--quiet")
            .arg(&url)
            .arg(&target)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(AcquireError::Spawn)?;

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait().map_err(AcquireError::Spawn)? {
                Some(status) => break status,
                None if Instant::now() >= deadline => {
                    if let Err(err) = child.kill() {
                        warn!(error = %err, "failed to kill git clone");
                    }
                    if let Err(err) = child.wait() {
                        debug!(error = %err, "failed to reap killed git clone");
                    }
                    return Err(AcquireError::Timeout(self.timeout));
                }
                None => thread::sleep(POLL_INTERVAL),
            }
        };

        if !status.success() {
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                if let Err(err) = pipe.read_to_string(&mut stderr) {
                    debug!(error = %err, "failed to read git stderr");
                }
            }
            return Err(AcquireError::CloneFailed {
                code: status.code(),
                stderr: stderr.trim().to_string(),
            });
        }
        if !target.is_dir() {
            return Err(AcquireError::CloneFailed {
                code: status.code(),
                stderr: "clone did not produce the expected directory".to_string(),
            });
        }
        Ok(RepoWorkspace::new(dir, target))
    }
}

/// Clone URL and checkout directory name for an identifier: a git URL
/// (`https://`, `ssh://`, `git@host:owner/repo`) or GitHub `owner/repo`.
pub fn clone_target(identifier: &str) -> Result<(String, String), AcquireError> {
    let trimmed = identifier.trim();
    let invalid = || AcquireError::InvalidIdentifier(identifier.to_string());
    if trimmed.is_empty() || trimmed.starts_with('-') {
        return Err(invalid());
    }
    let url = if trimmed.contains("://") || trimmed.starts_with("git@") {
        trimmed.to_string()
    } else if GITHUB_SHORTHAND.is_match(trimmed) {
        format!("https://github.com/{trimmed}")
    } else {
        return Err(invalid());
    };
    let last = url
        .trim_end_matches('/')
        .rsplit(['/', ':'])
        .next()
        .unwrap_or_default();
    let name = last.strip_suffix(".git").unwrap_or(last).to_string();
    if name.is_empty() || name == "." || name == ".." {
        return Err(invalid());
    }
    Ok((url, name))
}
