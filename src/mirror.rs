use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use tokio::process::Command;

use crate::progress::Progress;
use crate::repos::RepoEntry;

/// The two git operations a mirror needs.
pub trait Git {
    fn clone_mirror(&self, url: &str, dest: &Path) -> impl Future<Output = anyhow::Result<()>>;
    fn remote_update(&self, repo_dir: &Path) -> impl Future<Output = anyhow::Result<()>>;
}

/// Runs the `git` binary found on `PATH`.
#[derive(Debug, Clone, Default)]
pub struct SystemGit;

impl Git for SystemGit {
    async fn clone_mirror(&self, url: &str, dest: &Path) -> anyhow::Result<()> {
        let mut cmd = Command::new("git");
        cmd.arg("clone").arg("--mirror").arg(url).arg(dest);
        run_git(cmd).await
    }

    async fn remote_update(&self, repo_dir: &Path) -> anyhow::Result<()> {
        let mut cmd = Command::new("git");
        cmd.arg("--git-dir")
            .arg(repo_dir)
            .args(["remote", "update", "--prune"]);
        run_git(cmd).await
    }
}

async fn run_git(mut cmd: Command) -> anyhow::Result<()> {
    let display = format!("{:?}", cmd.as_std());
    let status = cmd
        .status()
        .await
        .with_context(|| format!("spawn {display}"))?;
    if !status.success() {
        anyhow::bail!("{display} exited with {status}");
    }
    Ok(())
}

/// Local directory name for a clone URL, always ending in `.git`.
pub fn repo_dir_from_url(url: &str) -> String {
    let base = url.trim_end_matches('/').rsplit('/').next().unwrap_or("");
    if base.ends_with(".git") {
        base.to_string()
    } else {
        format!("{base}.git")
    }
}

#[derive(Debug, Clone)]
pub struct MirrorOptions {
    pub root: PathBuf,
    /// Remove local mirrors that are no longer listed.
    pub delete: bool,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub cloned: Vec<String>,
    pub updated: Vec<String>,
    pub deleted: Vec<String>,
}

pub async fn sync_repos<G: Git>(
    git: &G,
    repos: &[RepoEntry],
    opts: &MirrorOptions,
    progress: &Progress,
) -> anyhow::Result<SyncReport> {
    let mut report = SyncReport::default();
    progress.set_total(repos.len());

    for repo in repos {
        if repo.https.is_empty() {
            tracing::warn!(name = %repo.name, "no https url; skipping");
            progress.item_failed(&repo.name);
            continue;
        }
        let dir_name = repo_dir_from_url(&repo.https);
        let repo_dir = opts.root.join(&dir_name);

        if repo_dir.is_dir() {
            tracing::info!(url = %repo.https, "update");
            progress.set_stage(format!("update {dir_name}"));
            git.remote_update(&repo_dir)
                .await
                .with_context(|| format!("update {}", repo_dir.display()))?;
            report.updated.push(dir_name.clone());
        } else {
            tracing::info!(url = %repo.https, "mirror");
            progress.set_stage(format!("mirror {dir_name}"));
            git.clone_mirror(&repo.https, &repo_dir)
                .await
                .with_context(|| format!("git clone --mirror {}", repo.https))?;
            report.cloned.push(dir_name.clone());
        }

        write_description(&repo_dir, repo.description.as_deref())?;
        mark_exported(&repo_dir)?;
        progress.item_done(&dir_name);
    }

    if opts.delete {
        for stale in remotely_deleted(&opts.root, repos)? {
            let path = opts.root.join(&stale);
            tracing::info!(repo = %stale, "delete");
            remove_mirror(&path)?;
            report.deleted.push(stale);
        }
    }

    Ok(report)
}

/// `remove_dir_all`, retried once with write permission restored when the
/// tree holds read-only entries (git packs objects read-only).
fn remove_mirror(path: &Path) -> anyhow::Result<()> {
    match std::fs::remove_dir_all(path) {
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            tracing::debug!(path = %path.display(), "read-only entries; retrying removal");
            make_writable(path).with_context(|| format!("chmod {}", path.display()))?;
            std::fs::remove_dir_all(path)
        }
        other => other,
    }
    .with_context(|| format!("remove {}", path.display()))
}

fn make_writable(path: &Path) -> std::io::Result<()> {
    let meta = std::fs::symlink_metadata(path)?;
    if meta.file_type().is_symlink() {
        return Ok(());
    }
    let mut perms = meta.permissions();
    if perms.readonly() {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt as _;
            perms.set_mode(perms.mode() | 0o200);
        }
        #[cfg(not(unix))]
        perms.set_readonly(false);
        std::fs::set_permissions(path, perms)?;
    }
    if meta.is_dir() {
        for entry in std::fs::read_dir(path)? {
            make_writable(&entry?.path())?;
        }
    }
    Ok(())
}

/// Overwrites `description`; `None` leaves whatever git wrote.
fn write_description(repo_dir: &Path, description: Option<&str>) -> anyhow::Result<()> {
    let Some(description) = description else {
        return Ok(());
    };
    let path = repo_dir.join("description");
    std::fs::write(&path, format!("{description}\n"))
        .with_context(|| format!("write {}", path.display()))
}

fn mark_exported(repo_dir: &Path) -> anyhow::Result<()> {
    let path = repo_dir.join("git-daemon-export-ok");
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("touch {}", path.display()))?;
    Ok(())
}

/// Local `*.git` mirrors under `root` with no entry in `repos`.
pub fn remotely_deleted(root: &Path, repos: &[RepoEntry]) -> anyhow::Result<Vec<String>> {
    let wanted: HashSet<String> = repos
        .iter()
        .filter(|r| !r.https.is_empty())
        .map(|r| repo_dir_from_url(&r.https))
        .collect();

    let mut stale = Vec::new();
    for entry in std::fs::read_dir(root).with_context(|| format!("list {}", root.display()))? {
        let entry = entry.with_context(|| format!("list {}", root.display()))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == ".git" || !name.ends_with(".git") || !entry.path().is_dir() {
            continue;
        }
        if !wanted.contains(&name) {
            stale.push(name);
        }
    }
    stale.sort();
    Ok(stale)
}
