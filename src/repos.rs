use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub git: String,
    #[serde(default)]
    pub https: String,
}

pub fn read_repos(path: &Path) -> anyhow::Result<Vec<RepoEntry>> {
    let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parse {}", path.display()))
}

/// Writes `<dir>/<file_name>` as pretty JSON; refuses an empty list.
pub fn export_repos(dir: &Path, file_name: &str, repos: &[RepoEntry]) -> anyhow::Result<PathBuf> {
    if repos.is_empty() {
        anyhow::bail!("empty repo list; nothing written to {}", file_name);
    }
    if !dir.as_os_str().is_empty() {
        std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let path = dir.join(file_name);
    let json = serde_json::to_string_pretty(repos).context("serialize repo list")?;
    std::fs::write(&path, json).with_context(|| format!("write {}", path.display()))?;
    tracing::info!(count = repos.len(), path = %path.display(), "exported repo list");
    Ok(path)
}
