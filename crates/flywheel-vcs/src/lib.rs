//! Version-control gateway.
//!
//! Every mutation commits the single changed path with a tag-prefixed
//! message. Lock contention (recognised by git's `index.lock` signature on
//! stderr) is retried with exponential backoff; a lock file older than 30
//! seconds is reported as stale but never deleted. Commit failure never
//! rolls back the mutation: the file is already on disk, and callers
//! surface "file saved; commit failed".

use flywheel_core::CommitConfig;
use parking_lot::Mutex;
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Age at which a lock file is reported stale.
const STALE_LOCK_MS: u64 = 30_000;

/// Outcome of a commit or undo attempt. Failures are values, not errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct CommitResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub undo_available: bool,
    pub stale_lock_detected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_age_ms: Option<u64>,
}

impl CommitResult {
    fn failure(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Gateway over the `git` CLI for one or more vaults.
///
/// Tracks the last commit hash per tag so [`GitGateway::undo_last`] can
/// verify nothing else moved the branch before reverting.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LastCommit {
    hash: String,
    path: String,
}

#[derive(Default)]
pub struct GitGateway {
    config: CommitConfig,
    last_commit_by_tag: Mutex<HashMap<String, LastCommit>>,
}

impl GitGateway {
    pub fn new(config: CommitConfig) -> Self {
        Self {
            config,
            last_commit_by_tag: Mutex::new(HashMap::new()),
        }
    }

    /// Stage and commit a single path with a `tag`-prefixed message.
    pub async fn commit(&self, vault_root: &Path, changed_path: &str, tag: &str) -> CommitResult {
        if !vault_root.join(".git").exists() {
            return CommitResult::failure(format!(
                "no repository: {} is not under version control; run `git init` to enable undo",
                vault_root.display()
            ));
        }

        let message = format!("{tag}: update {changed_path}");
        let mut stale_lock_detected = false;
        let mut lock_age_ms = None;
        let mut last_error = String::new();

        for attempt in 0..self.config.max_attempts {
            if let Some(age) = lock_file_age_ms(vault_root) {
                if age >= STALE_LOCK_MS {
                    stale_lock_detected = true;
                    lock_age_ms = Some(age);
                    warn!(age_ms = age, "stale git lock detected, leaving in place");
                }
            }

            match self.try_commit(vault_root, changed_path, &message).await {
                Ok(hash) => {
                    let undo_available = hash.is_some();
                    if let Some(hash) = &hash {
                        self.last_commit_by_tag.lock().insert(
                            tag.to_string(),
                            LastCommit {
                                hash: hash.clone(),
                                path: changed_path.to_string(),
                            },
                        );
                    }
                    return CommitResult {
                        success: true,
                        hash,
                        error: None,
                        undo_available,
                        stale_lock_detected,
                        lock_age_ms,
                    };
                }
                Err(stderr) if is_lock_error(&stderr) => {
                    last_error = stderr;
                    let delay = self.backoff_delay(attempt);
                    debug!(attempt, delay_ms = delay.as_millis() as u64, "git lock contention, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(stderr) => {
                    return CommitResult {
                        success: false,
                        hash: None,
                        error: Some(format!("git commit failed for {changed_path}: {stderr}")),
                        undo_available: false,
                        stale_lock_detected,
                        lock_age_ms,
                    };
                }
            }
        }

        CommitResult {
            success: false,
            hash: None,
            error: Some(format!(
                "git lock contention persisted after {} attempts: {last_error}",
                self.config.max_attempts
            )),
            undo_available: false,
            stale_lock_detected,
            lock_age_ms,
        }
    }

    /// Path of the last commit recorded for a tag, for callers that need
    /// to re-index after an undo.
    pub fn recorded_path(&self, tag: &str) -> Option<String> {
        self.last_commit_by_tag
            .lock()
            .get(tag)
            .map(|c| c.path.clone())
    }

    /// Revert the last commit made under `tag`, verified by hash equality
    /// with the recorded hash.
    pub async fn undo_last(&self, vault_root: &Path, tag: &str) -> CommitResult {
        let recorded = self.last_commit_by_tag.lock().get(tag).map(|c| c.hash.clone());
        let Some(recorded) = recorded else {
            return CommitResult::failure(format!("nothing to undo for tag {tag}"));
        };

        let head = match run_git(vault_root, &["rev-parse", "HEAD"]).await {
            Ok(out) => out.trim().to_string(),
            Err(stderr) => return CommitResult::failure(format!("rev-parse failed: {stderr}")),
        };
        if head != recorded {
            return CommitResult::failure(format!(
                "refusing to undo: HEAD {head} is no longer the recorded commit {recorded}"
            ));
        }

        match run_git(vault_root, &["revert", "--no-edit", &recorded]).await {
            Ok(_) => {
                self.last_commit_by_tag.lock().remove(tag);
                let new_head = run_git(vault_root, &["rev-parse", "HEAD"])
                    .await
                    .ok()
                    .map(|h| h.trim().to_string());
                CommitResult {
                    success: true,
                    hash: new_head,
                    error: None,
                    undo_available: false,
                    stale_lock_detected: false,
                    lock_age_ms: None,
                }
            }
            Err(stderr) => CommitResult::failure(format!("git revert failed: {stderr}")),
        }
    }

    async fn try_commit(
        &self,
        vault_root: &Path,
        changed_path: &str,
        message: &str,
    ) -> Result<Option<String>, String> {
        run_git(vault_root, &["add", "--", changed_path]).await?;

        match run_git(vault_root, &["commit", "-m", message, "--", changed_path]).await {
            Ok(_) => {
                let hash = run_git(vault_root, &["rev-parse", "HEAD"]).await?;
                Ok(Some(hash.trim().to_string()))
            }
            Err(output) if output.contains("nothing to commit")
                || output.contains("nothing added to commit")
                || output.contains("no changes added to commit") =>
            {
                // A successful no-op: the file matched HEAD already.
                Ok(None)
            }
            Err(stderr) => Err(stderr),
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.config.base_delay_ms.saturating_mul(1u64 << attempt.min(16));
        let mut delay = base.min(self.config.max_delay_ms);
        if self.config.jitter && delay > 0 {
            delay += rand::thread_rng().gen_range(0..=delay / 4);
        }
        Duration::from_millis(delay)
    }
}

/// Age of `.git/index.lock` in milliseconds, when present.
fn lock_file_age_ms(vault_root: &Path) -> Option<u64> {
    let lock = vault_root.join(".git").join("index.lock");
    let modified = std::fs::metadata(&lock).ok()?.modified().ok()?;
    Some(
        std::time::SystemTime::now()
            .duration_since(modified)
            .unwrap_or_default()
            .as_millis() as u64,
    )
}

/// Lock contention shows up as git's index.lock complaint on stderr.
fn is_lock_error(stderr: &str) -> bool {
    stderr.contains("index.lock")
        || stderr.contains("Another git process seems to be running")
}

async fn run_git(dir: &Path, args: &[&str]) -> Result<String, String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .await
        .map_err(|e| format!("failed to spawn git: {e}"))?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        let mut combined = String::from_utf8_lossy(&output.stderr).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stdout));
        Err(combined)
    }
}
