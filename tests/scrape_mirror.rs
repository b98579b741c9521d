use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use cgit_mirror::fetcher::{FetchPolicy, Fetcher};
use cgit_mirror::mirror::{self, Git, MirrorOptions};
use cgit_mirror::progress::Progress;
use cgit_mirror::repos::{self, RepoEntry};
use cgit_mirror::scrape::{CgitScraper, Excludes, GitHubScraper};
use httpmock::Method::GET;
use httpmock::MockServer;
use tempfile::tempdir;
use url::Url;

fn fetcher(retries: usize) -> Fetcher {
    Fetcher::new(&FetchPolicy {
        user_agent: "test-agent".to_string(),
        timeout: Duration::from_secs(5),
        retries,
        retry_interval: Duration::ZERO,
    })
    .unwrap()
}

fn summary_page(name: &str) -> String {
    format!(
        r#"<html><body><div class="content"><table summary="repository info" class="list nowrap">
<tr class="nohover"><th class="left">Branch</th><th class="left">Commit message</th></tr>
<tr><td><a href="/cgit.cgi/{name}/log/">master</a></td><td>Initial</td></tr>
<tr class="nohover"><td colspan="4">&nbsp;</td></tr>
<tr><th class="left" colspan="4">Clone</th></tr>
<tr><td colspan="4"><a rel="vcs-git" href="git://git.example.org/{name}">git://git.example.org/{name}</a></td></tr>
<tr><td colspan="4"><a rel="vcs-git" href="https://git.example.org/git/{name}">https://git.example.org/git/{name}</a></td></tr>
</table></div></body></html>"#
    )
}

fn entry(name: &str, https: &str, description: Option<&str>) -> RepoEntry {
    RepoEntry {
        name: name.to_string(),
        section: None,
        description: description.map(str::to_string),
        owner: "owner".to_string(),
        git: String::new(),
        https: https.to_string(),
    }
}

#[tokio::test]
async fn scrapes_cgit_index_and_clone_urls() {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(GET).path("/cgit.cgi/");
        then.status(200)
            .header("Content-Type", "text/html; charset=utf-8")
            .body(
                r#"<html><body><div class="content"><table summary="repository list" class="list nowrap">
<tr class="nohover"><th class="left">Name</th><th class="left">Description</th><th class="left">Owner</th><th class="left">Idle</th></tr>
<tr class="nohover-highlight"><td colspan="4" class="reposection">Yocto Project</td></tr>
<tr><td class="sublevel-repo"><a title="poky" href="/cgit.cgi/poky/">poky</a></td><td><a href="/cgit.cgi/poky/">Poky Build Tool</a></td><td><a href="/cgit.cgi/poky/">Richard</a></td><td>2 hours</td></tr>
<tr><td class="sublevel-repo"><a href="/cgit.cgi/yocto-testresults/">yocto-testresults</a></td><td>Results</td><td>CI</td><td>1 day</td></tr>
<tr class="nohover-highlight"><td colspan="4" class="reposection">Archived</td></tr>
<tr><td class="sublevel-repo"><a href="/cgit.cgi/broken/">broken</a></td><td>No clone urls</td><td>nobody</td><td>9 years</td></tr>
</table></div></body></html>"#,
            );
    });
    server.mock(|when, then| {
        when.method(GET).path("/cgit.cgi/poky/");
        then.status(200).body(summary_page("poky"));
    });
    server.mock(|when, then| {
        when.method(GET).path("/cgit.cgi/broken/");
        then.status(200).body("<html><body>empty</body></html>");
    });

    let url = Url::parse(&server.url("/cgit.cgi/")).unwrap();
    let scraper = CgitScraper::new(
        url,
        Excludes::new(vec!["yocto-testresults".to_string()]),
        fetcher(0),
        Progress::new(false),
    );
    let found = scraper.collect().await.unwrap();

    assert_eq!(
        found,
        vec![RepoEntry {
            name: "poky".to_string(),
            section: Some("Yocto Project".to_string()),
            description: Some("Poky Build Tool".to_string()),
            owner: "Richard".to_string(),
            git: "git://git.example.org/poky".to_string(),
            https: "https://git.example.org/git/poky".to_string(),
        }]
    );

    let tmp = tempdir().unwrap();
    let path = repos::export_repos(tmp.path(), CgitScraper::EXPORT_FILE_NAME, &found).unwrap();
    assert_eq!(repos::read_repos(&path).unwrap(), found);
}

#[tokio::test]
async fn latin1_bytes_in_index_do_not_abort_the_scrape() {
    let server = MockServer::start();

    let mut index = br#"<html><body><table class="list nowrap">
<tr><td><a href="/cgit.cgi/cafe/">cafe</a></td><td>Caf"#
        .to_vec();
    index.push(0xE9);
    index.extend_from_slice(b" menus</td><td>owner</td></tr>\n</table></body></html>");

    server.mock(|when, then| {
        when.method(GET).path("/cgit.cgi/");
        then.status(200)
            .header("Content-Type", "text/html")
            .body(index);
    });
    server.mock(|when, then| {
        when.method(GET).path("/cgit.cgi/cafe/");
        then.status(200).body(summary_page("cafe"));
    });

    let url = Url::parse(&server.url("/cgit.cgi/")).unwrap();
    let scraper = CgitScraper::new(url, Excludes::default(), fetcher(0), Progress::new(false));
    let found = scraper.collect().await.unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "cafe");
    assert_eq!(found[0].description.as_deref(), Some("Caf\u{FFFD} menus"));
    assert_eq!(found[0].https, "https://git.example.org/git/cafe");
}

#[tokio::test]
async fn github_pagination_stops_at_empty_page() {
    let server = MockServer::start();

    let page1 = server.mock(|when, then| {
        when.method(GET)
            .path("/users/d12y12/repos")
            .query_param("page", "1");
        then.status(200)
            .header("Content-Type", "application/json")
            .body(
                r#"[
  {"name": "dotfiles", "description": "Config", "owner": {"login": "d12y12"},
   "git_url": "git://github.com/d12y12/dotfiles.git", "clone_url": "https://github.com/d12y12/dotfiles.git"},
  {"name": "scratch", "description": null, "owner": {"login": "d12y12"},
   "git_url": "git://github.com/d12y12/scratch.git", "clone_url": "https://github.com/d12y12/scratch.git"}
]"#,
            );
    });
    let page2 = server.mock(|when, then| {
        when.method(GET)
            .path("/users/d12y12/repos")
            .query_param("page", "2");
        then.status(200)
            .header("Content-Type", "application/json")
            .body(
                r#"[{"name": "mirror", "description": "Mirrors 镜像", "owner": {"login": "d12y12"},
   "git_url": "git://github.com/d12y12/mirror.git", "clone_url": "https://github.com/d12y12/mirror.git"}]"#,
            );
    });
    let page3 = server.mock(|when, then| {
        when.method(GET)
            .path("/users/d12y12/repos")
            .query_param("page", "3");
        then.status(200).body("[]");
    });

    let api_base = Url::parse(&server.url("/")).unwrap();
    let scraper = GitHubScraper::new(
        "d12y12".to_string(),
        api_base,
        Excludes::new(vec!["scratch".to_string()]),
        fetcher(0),
        Progress::new(false),
    );
    let found = scraper.collect().await.unwrap();

    page1.assert();
    page2.assert();
    page3.assert();
    let names: Vec<_> = found.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["dotfiles", "mirror"]);
    assert_eq!(found[1].description.as_deref(), Some("Mirrors 镜像"));
    assert_eq!(found[0].https, "https://github.com/d12y12/dotfiles.git");
    assert_eq!(found[0].section, None);
    assert_eq!(scraper.export_file_name(), "github_d12y12_repos.json");
}

#[tokio::test]
async fn scrape_subcommand_writes_repo_list() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/users/someone/repos")
            .query_param("page", "1");
        then.status(200).body(
            r#"[{"name": "one", "description": null, "owner": {"login": "someone"},
 "git_url": "git://github.com/someone/one.git", "clone_url": "https://github.com/someone/one.git"}]"#,
        );
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/users/someone/repos")
            .query_param("page", "2");
        then.status(200).body("[]");
    });

    let tmp = tempdir().unwrap();
    let args = cgit_mirror::CliArgs {
        command: cgit_mirror::Command::Scrape {
            source: cgit_mirror::ScrapeSource::Github {
                user: "someone".to_string(),
                excludes: Vec::new(),
                out: tmp.path().to_path_buf(),
                api_base: Url::parse(&server.url("/")).unwrap(),
            },
        },
        user_agent: "test-agent".to_string(),
        timeout_secs: 5,
        retries: 0,
        retry_interval_secs: 0,
        progress: cgit_mirror::ProgressMode::Never,
    };
    cgit_mirror::run(args).await.unwrap();

    let written = repos::read_repos(&tmp.path().join("github_someone_repos.json")).unwrap();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].https, "https://github.com/someone/one.git");

    let raw = std::fs::read_to_string(tmp.path().join("github_someone_repos.json")).unwrap();
    assert!(raw.starts_with("[\n  {\n"));
}

#[tokio::test]
async fn failing_requests_are_retried_then_reported() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/cgit.cgi/");
        then.status(503);
    });

    let url = Url::parse(&server.url("/cgit.cgi/")).unwrap();
    let err = fetcher(2).get_text(url).await.unwrap_err();

    mock.assert_hits(3);
    assert!(format!("{err:#}").contains("503"));
}

#[test]
fn empty_repo_list_is_not_exported() {
    let tmp = tempdir().unwrap();
    assert!(repos::export_repos(tmp.path(), "empty.json", &[]).is_err());
    assert!(!tmp.path().join("empty.json").exists());
}

#[derive(Default)]
struct FakeGit {
    calls: Mutex<Vec<String>>,
}

impl Git for FakeGit {
    async fn clone_mirror(&self, url: &str, dest: &Path) -> anyhow::Result<()> {
        std::fs::create_dir_all(dest)?;
        std::fs::write(dest.join("description"), "Unnamed repository\n")?;
        self.calls.lock().unwrap().push(format!("clone {url}"));
        Ok(())
    }

    async fn remote_update(&self, repo_dir: &Path) -> anyhow::Result<()> {
        let name = repo_dir.file_name().unwrap().to_string_lossy().into_owned();
        self.calls.lock().unwrap().push(format!("update {name}"));
        Ok(())
    }
}

#[tokio::test]
async fn mirror_sync_clones_updates_and_prunes() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().to_path_buf();
    std::fs::create_dir(root.join("existing.git")).unwrap();
    std::fs::create_dir(root.join("stale.git")).unwrap();
    std::fs::create_dir(root.join("workdir")).unwrap();

    let listed = vec![
        entry("new", "https://git.example.org/git/new", Some("New thing")),
        entry("existing", "https://github.com/u/existing.git", None),
        entry("no-https", "", Some("skipped")),
    ];
    let git = FakeGit::default();
    let progress = Progress::new(false);
    let report = mirror::sync_repos(
        &git,
        &listed,
        &MirrorOptions {
            root: root.clone(),
            delete: true,
        },
        &progress,
    )
    .await
    .unwrap();

    assert_eq!(
        *git.calls.lock().unwrap(),
        vec![
            "clone https://git.example.org/git/new".to_string(),
            "update existing.git".to_string(),
        ]
    );
    assert_eq!(report.cloned, vec!["new.git"]);
    assert_eq!(report.updated, vec!["existing.git"]);
    assert_eq!(report.deleted, vec!["stale.git"]);

    assert_eq!(
        std::fs::read_to_string(root.join("new.git/description")).unwrap(),
        "New thing\n"
    );
    assert!(!root.join("existing.git/description").exists());
    assert!(root.join("new.git/git-daemon-export-ok").is_file());
    assert!(root.join("existing.git/git-daemon-export-ok").is_file());
    assert!(!root.join("stale.git").exists());
    assert!(root.join("workdir").is_dir());
}

#[tokio::test]
async fn mirror_sync_keeps_unlisted_repos_without_delete() {
    let tmp = tempdir().unwrap();
    std::fs::create_dir(tmp.path().join("stale.git")).unwrap();

    let report = mirror::sync_repos(
        &FakeGit::default(),
        &[entry("a", "https://h/a", None)],
        &MirrorOptions {
            root: tmp.path().to_path_buf(),
            delete: false,
        },
        &Progress::new(false),
    )
    .await
    .unwrap();

    assert!(report.deleted.is_empty());
    assert!(tmp.path().join("stale.git").is_dir());
}
