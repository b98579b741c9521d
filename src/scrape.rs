use std::sync::Arc;

use anyhow::Context as _;
use kuchiki::iter::NodeIterator as _;
use kuchiki::traits::TendrilSink as _;
use serde::Deserialize;
use url::Url;

use crate::fetcher::Fetcher;
use crate::progress::Progress;
use crate::repos::RepoEntry;

/// Repository names to leave out of a scrape.
#[derive(Debug, Clone, Default)]
pub struct Excludes {
    names: Vec<String>,
}

impl Excludes {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Matches on the last path segment of `url`, with or without its
    /// extension (`foo.git` and `foo` both exclude `.../foo.git`).
    pub fn matches(&self, url: &str) -> bool {
        let base = url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or("");
        let stem = base.split('.').next().unwrap_or("");
        self.names.iter().any(|n| n == base || n == stem)
    }
}

/// One repository row of a cgit index page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRow {
    pub name: String,
    pub section: String,
    pub description: String,
    pub owner: String,
    pub url: Option<Url>,
}

pub fn parse_cgit_index(html: &str, base_url: &Url, excludes: &Excludes) -> Vec<IndexRow> {
    let doc = kuchiki::parse_html().one(html);
    let Ok(table) = doc.select_first("table.list.nowrap") else {
        return Vec::new();
    };

    let mut rows = Vec::new();
    let mut section = String::new();
    let Ok(trs) = table.as_node().select("tr") else {
        return rows;
    };
    for tr in trs {
        let cells: Vec<_> = match tr.as_node().select("td") {
            Ok(tds) => tds.collect(),
            Err(()) => continue,
        };
        match cells.len() {
            0 => continue,
            1 => {
                section = cells[0].text_contents().trim().to_string();
                continue;
            }
            _ => {}
        }

        let href = cells[0]
            .as_node()
            .select("a[href]")
            .ok()
            .and_then(|links| links.last())
            .and_then(|a| {
                let href = a.attributes.borrow().get("href").map(str::to_string);
                href
            });
        let url = href.and_then(|h| base_url.join(&h).ok());
        if let Some(url) = &url {
            if excludes.matches(url.as_str()) {
                tracing::info!(%url, "skipping excluded repo");
                continue;
            }
        }

        let text = |i: usize| {
            cells
                .get(i)
                .map(|c| c.text_contents().trim().to_string())
                .unwrap_or_default()
        };
        rows.push(IndexRow {
            name: text(0),
            section: section.clone(),
            description: text(1),
            owner: text(2),
            url,
        });
    }
    rows
}

/// Clone URLs listed under the "Clone" row of a cgit summary page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloneUrls {
    pub git: String,
    pub https: String,
}

pub fn parse_clone_urls(html: &str) -> Option<CloneUrls> {
    let doc = kuchiki::parse_html().one(html);
    let table = doc.select_first("table.list").ok()?;
    let trs = table.as_node().select("tr").ok()?;
    for tr in trs {
        if tr.text_contents().trim() != "Clone" {
            continue;
        }
        let mut urls = CloneUrls::default();
        for sibling in tr.as_node().following_siblings().elements() {
            let text = sibling.text_contents();
            let url = text.trim();
            if url.starts_with("git:") {
                urls.git = url.to_string();
            }
            if url.starts_with("https:") {
                urls.https = url.to_string();
            }
        }
        return Some(urls);
    }
    None
}

pub struct CgitScraper {
    entry_url: Url,
    excludes: Excludes,
    fetcher: Fetcher,
    progress: Arc<Progress>,
}

impl CgitScraper {
    pub const EXPORT_FILE_NAME: &'static str = "cgit_repos.json";

    pub fn new(entry_url: Url, excludes: Excludes, fetcher: Fetcher, progress: Arc<Progress>) -> Self {
        Self {
            entry_url,
            excludes,
            fetcher,
            progress,
        }
    }

    pub async fn collect(&self) -> anyhow::Result<Vec<RepoEntry>> {
        self.progress.set_stage(format!("index {}", self.entry_url));
        let html = self
            .fetcher
            .get_text(self.entry_url.clone())
            .await
            .with_context(|| format!("download index {}", self.entry_url))?;

        let rows = parse_cgit_index(&html, &self.entry_url, &self.excludes);
        if rows.is_empty() {
            anyhow::bail!("no repositories found at {}", self.entry_url);
        }
        self.progress.set_total(rows.len());
        self.progress.set_stage("repository pages");

        let mut repos = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(url) = row.url.clone() else {
                tracing::warn!(name = %row.name, "repo row has no link");
                self.progress.item_failed(&row.name);
                continue;
            };

            let urls = match self.fetcher.get_text(url.clone()).await {
                Ok(page) => parse_clone_urls(&page).unwrap_or_default(),
                Err(e) => {
                    tracing::error!(%url, error = %format!("{e:#}"), "repo page unavailable");
                    CloneUrls::default()
                }
            };
            if urls.git.is_empty() && urls.https.is_empty() {
                tracing::warn!(name = %row.name, %url, "incomplete: no clone urls");
                self.progress.item_failed(&row.name);
                continue;
            }

            let entry = RepoEntry {
                name: row.name,
                section: Some(row.section),
                description: Some(row.description),
                owner: row.owner,
                git: urls.git,
                https: urls.https,
            };
            tracing::info!(name = %entry.name, https = %entry.https, "complete");
            self.progress.item_done(&entry.name);
            repos.push(entry);
        }
        Ok(repos)
    }
}

#[derive(Debug, Deserialize)]
struct GitHubRepo {
    name: String,
    #[serde(default)]
    description: Option<String>,
    owner: GitHubOwner,
    #[serde(default)]
    git_url: String,
    clone_url: String,
}

#[derive(Debug, Deserialize)]
struct GitHubOwner {
    login: String,
}

pub struct GitHubScraper {
    user: String,
    api_base: Url,
    excludes: Excludes,
    fetcher: Fetcher,
    progress: Arc<Progress>,
}

impl GitHubScraper {
    pub const DEFAULT_API_BASE: &'static str = "https://api.github.com/";

    pub fn new(
        user: String,
        api_base: Url,
        excludes: Excludes,
        fetcher: Fetcher,
        progress: Arc<Progress>,
    ) -> Self {
        Self {
            user,
            api_base,
            excludes,
            fetcher,
            progress,
        }
    }

    pub fn export_file_name(&self) -> String {
        format!("github_{}_repos.json", self.user)
    }

    fn page_url(&self, page: u32) -> anyhow::Result<Url> {
        let mut url = self
            .api_base
            .join(&format!("users/{}/repos", self.user))
            .with_context(|| format!("build api url for {}", self.user))?;
        url.query_pairs_mut().append_pair("page", &page.to_string());
        Ok(url)
    }

    pub async fn collect(&self) -> anyhow::Result<Vec<RepoEntry>> {
        let mut repos = Vec::new();
        for page in 1u32.. {
            let url = self.page_url(page)?;
            self.progress.set_stage(format!("github page {page}"));
            let body = match self.fetcher.get_text(url.clone()).await {
                Ok(body) => body,
                Err(e) => {
                    tracing::error!(page, error = %format!("{e:#}"), "stop at page");
                    break;
                }
            };
            let listed: Vec<GitHubRepo> =
                serde_json::from_str(&body).with_context(|| format!("parse {}", url))?;
            if listed.is_empty() {
                break;
            }
            for repo in listed {
                if self.excludes.matches(&repo.clone_url) {
                    tracing::info!(url = %repo.clone_url, "skipping excluded repo");
                    continue;
                }
                let entry = RepoEntry {
                    name: repo.name,
                    section: None,
                    description: repo.description,
                    owner: repo.owner.login,
                    git: repo.git_url,
                    https: repo.clone_url,
                };
                tracing::info!(name = %entry.name, https = %entry.https, "complete");
                self.progress.item_done(&entry.name);
                repos.push(entry);
            }
        }
        Ok(repos)
    }
}
