use crate::prefs::PreferenceStore;
use crate::theme::{self, ThemeConfig, ThemeView};

/// The parts of a cgit page the theme switcher touches.
pub trait PageSurface {
    type Link;

    /// Every `<link rel="stylesheet">` currently in the document.
    fn stylesheet_links(&self) -> Vec<Self::Link>;
    fn link_href(&self, link: &Self::Link) -> Option<String>;
    fn remove_link(&self, link: &Self::Link);
    /// Appends a stylesheet link to `<head>`.
    fn append_stylesheet(&self, href: &str);
    /// Appends the toggle button to each `.logo` container.
    fn append_toggle(&self, label: &str);
    /// Points each `img` inside `.logo` at `src`.
    fn set_logo_src(&self, src: &str);
    /// Blocking, user-facing message.
    fn notify(&self, message: &str);
    fn reload(&self);
}

/// Drops every themed stylesheet, then links `href`.
pub fn swap_stylesheet<P: PageSurface>(page: &P, marker: &str, href: &str) {
    let mut removed = 0usize;
    for link in page.stylesheet_links() {
        let Some(current) = page.link_href(&link) else {
            continue;
        };
        if current.contains(marker) {
            page.remove_link(&link);
            removed += 1;
        }
    }
    tracing::debug!(removed, href, "swapping stylesheet");
    page.append_stylesheet(href);
}

/// The DOM-ready half of initialization.
pub fn apply<P: PageSurface>(page: &P, config: &ThemeConfig, view: &ThemeView) {
    swap_stylesheet(page, &config.stylesheet_marker, &view.stylesheet_path);
    page.append_toggle(&view.label);
    page.set_logo_src(&view.logo_path);
}

/// Runs the whole initializer against a page that is already parsed.
///
/// Returns the applied view, or `None` when storage is unavailable and the
/// user has been notified instead.
pub fn initialize<S, P>(
    config: &ThemeConfig,
    store: Option<&mut S>,
    page: &P,
    pathname: &str,
) -> Option<ThemeView>
where
    S: PreferenceStore,
    P: PageSurface,
{
    match theme::prepare(config, store, pathname) {
        Ok(view) => {
            apply(page, config, &view);
            Some(view)
        }
        Err(e) => {
            tracing::warn!(error = %e, "theme switching disabled");
            page.notify(&e.to_string());
            None
        }
    }
}

/// Click handler: flip the stored theme and reload.
pub fn toggle<S: PreferenceStore, P: PageSurface>(store: &mut S, page: &P) {
    let next = theme::flip(store);
    tracing::info!(theme = next.as_str(), "theme toggled");
    page.reload();
}
