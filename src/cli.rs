use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use url::Url;

use crate::scrape::GitHubScraper;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ProgressMode {
    /// Enable progress UI when stderr is a TTY.
    Auto,
    /// Always enable progress UI (even when piped).
    Always,
    /// Never show progress UI.
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ThemeArg {
    Light,
    Dark,
}

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// HTTP User-Agent used when scraping.
    #[arg(long, global = true, default_value = "cgit-mirror/0.1")]
    pub user_agent: String,

    /// Connect timeout in seconds; the whole request may take twice as long.
    #[arg(long, global = true, default_value_t = 15)]
    pub timeout_secs: u64,

    /// Retries after a failed request.
    #[arg(long, global = true, default_value_t = 3)]
    pub retries: usize,

    /// Seconds to wait between retries, unless the server sends `Retry-After`.
    #[arg(long, global = true, default_value_t = 3)]
    pub retry_interval_secs: u64,

    /// Progress display: `auto`, `always`, or `never`.
    #[arg(long, global = true, value_enum, default_value = "auto")]
    pub progress: ProgressMode,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Collect a repository list and export it as JSON.
    Scrape {
        #[command(subcommand)]
        source: ScrapeSource,
    },
    /// Clone or update mirrors for every repository in a JSON list.
    Mirror {
        /// Repository list written by `scrape`.
        file: PathBuf,

        /// Delete local mirrors whose repository is no longer listed.
        #[arg(short, long)]
        delete: bool,

        /// Directory holding the `*.git` mirrors.
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
    /// Render a saved cgit page with the theme switcher applied.
    Theme {
        /// HTML page to rewrite.
        #[arg(long)]
        input: PathBuf,

        /// URL path the page is served at (e.g. `/myrepo/log.html`).
        #[arg(long)]
        path: String,

        /// Stored preference to render; omit to render a first visit.
        #[arg(long, value_enum)]
        theme: Option<ThemeArg>,

        /// Output file; defaults to stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
pub enum ScrapeSource {
    /// Walk a cgit index page and each repository's summary page.
    Cgit {
        /// cgit index URL (e.g. `https://git.yoctoproject.org/cgit.cgi/`).
        url: Url,

        /// Repository name to skip; repeatable.
        #[arg(long = "exclude")]
        excludes: Vec<String>,

        /// Directory to write `cgit_repos.json` into.
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// List a GitHub user's public repositories.
    Github {
        user: String,

        /// Repository name to skip; repeatable.
        #[arg(long = "exclude")]
        excludes: Vec<String>,

        /// Directory to write `github_<user>_repos.json` into.
        #[arg(long, default_value = ".")]
        out: PathBuf,

        #[arg(long, default_value = GitHubScraper::DEFAULT_API_BASE, hide = true)]
        api_base: Url,
    },
}
