pub mod logging;
pub mod page;
pub mod prefs;
pub mod theme;

#[cfg(not(target_arch = "wasm32"))]
mod cli;
#[cfg(not(target_arch = "wasm32"))]
pub mod fetcher;
#[cfg(not(target_arch = "wasm32"))]
pub mod html;
#[cfg(not(target_arch = "wasm32"))]
pub mod mirror;
#[cfg(not(target_arch = "wasm32"))]
pub mod progress;
#[cfg(not(target_arch = "wasm32"))]
pub mod repos;
#[cfg(not(target_arch = "wasm32"))]
pub mod scrape;

#[cfg(target_arch = "wasm32")]
pub mod web;

#[cfg(not(target_arch = "wasm32"))]
pub use cli::{Args as CliArgs, Command, ProgressMode, ScrapeSource, ThemeArg};

#[cfg(not(target_arch = "wasm32"))]
pub use native::run;

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::Context as _;

    use crate::cli::{Args, Command, ProgressMode, ScrapeSource, ThemeArg};
    use crate::fetcher::{FetchPolicy, Fetcher};
    use crate::html::StaticPage;
    use crate::mirror::{self, MirrorOptions, SystemGit};
    use crate::prefs::MemoryStore;
    use crate::progress::Progress;
    use crate::scrape::{CgitScraper, Excludes, GitHubScraper};
    use crate::theme::{Theme, ThemeConfig};
    use crate::{page, repos};

    pub async fn run(args: Args) -> anyhow::Result<()> {
        use std::io::IsTerminal as _;

        let progress_enabled = match args.progress {
            ProgressMode::Always => true,
            ProgressMode::Never => false,
            ProgressMode::Auto => std::io::stderr().is_terminal(),
        };
        let policy = FetchPolicy {
            user_agent: args.user_agent.clone(),
            timeout: Duration::from_secs(args.timeout_secs),
            retries: args.retries,
            retry_interval: Duration::from_secs(args.retry_interval_secs),
        };

        match args.command {
            Command::Scrape { source } => {
                let progress = Progress::new(progress_enabled);
                let res = scrape(source, &policy, progress.clone()).await;
                progress.finish();
                res
            }
            Command::Mirror { file, delete, root } => {
                let progress = Progress::new(progress_enabled);
                let res = sync(&file, MirrorOptions { root, delete }, &progress).await;
                progress.finish();
                res
            }
            Command::Theme {
                input,
                path,
                theme,
                out,
            } => render_theme(&input, &path, theme, out.as_deref()),
        }
    }

    async fn scrape(
        source: ScrapeSource,
        policy: &FetchPolicy,
        progress: Arc<Progress>,
    ) -> anyhow::Result<()> {
        let fetcher = Fetcher::new(policy)?;
        let (out, file_name, found) = match source {
            ScrapeSource::Cgit { url, excludes, out } => {
                let scraper = CgitScraper::new(url, Excludes::new(excludes), fetcher, progress);
                let found = scraper.collect().await?;
                (out, CgitScraper::EXPORT_FILE_NAME.to_string(), found)
            }
            ScrapeSource::Github {
                user,
                excludes,
                out,
                api_base,
            } => {
                let scraper =
                    GitHubScraper::new(user, api_base, Excludes::new(excludes), fetcher, progress);
                let found = scraper.collect().await?;
                (out, scraper.export_file_name(), found)
            }
        };
        repos::export_repos(&out, &file_name, &found)?;
        Ok(())
    }

    async fn sync(file: &Path, opts: MirrorOptions, progress: &Progress) -> anyhow::Result<()> {
        let listed = repos::read_repos(file)?;
        std::fs::create_dir_all(&opts.root)
            .with_context(|| format!("create {}", opts.root.display()))?;

        progress.set_stage("sync mirrors");
        let report = mirror::sync_repos(&SystemGit, &listed, &opts, progress).await?;
        tracing::info!(
            cloned = report.cloned.len(),
            updated = report.updated.len(),
            deleted = report.deleted.len(),
            "mirror sync finished"
        );
        Ok(())
    }

    fn render_theme(
        input: &Path,
        path: &str,
        theme: Option<ThemeArg>,
        out: Option<&Path>,
    ) -> anyhow::Result<()> {
        let html =
            std::fs::read_to_string(input).with_context(|| format!("read {}", input.display()))?;
        let page = StaticPage::parse(&html);

        let mut store = match theme {
            Some(ThemeArg::Light) => MemoryStore::with_value(Theme::Light.as_str()),
            Some(ThemeArg::Dark) => MemoryStore::with_value(Theme::Dark.as_str()),
            None => MemoryStore::default(),
        };
        let config = ThemeConfig::default();
        let view = page::initialize(&config, Some(&mut store), &page, path)
            .context("theme switching unavailable")?;
        tracing::info!(
            theme = view.theme.as_str(),
            stylesheet = %view.stylesheet_path,
            logo = %view.logo_path,
            "applied theme"
        );

        let rendered = page.to_html()?;
        match out {
            Some(out) => {
                std::fs::write(out, rendered).with_context(|| format!("write {}", out.display()))?
            }
            None => {
                use std::io::Write as _;
                std::io::stdout()
                    .lock()
                    .write_all(rendered.as_bytes())
                    .context("write stdout")?;
            }
        }
        Ok(())
    }
}
