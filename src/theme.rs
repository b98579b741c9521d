use maud::{Markup, html};

use crate::prefs::PreferenceStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub const fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    /// Anything other than exactly `"light"` renders dark.
    pub fn from_stored(value: &str) -> Self {
        if value == Theme::Light.as_str() {
            Theme::Light
        } else {
            Theme::Dark
        }
    }

    pub const fn opposite(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// Names the host page agrees on: the storage key, the substring that marks
/// a themed stylesheet, and where logos and stylesheets are served from.
#[derive(Debug, Clone)]
pub struct ThemeConfig {
    pub storage_key: String,
    pub stylesheet_marker: String,
    pub statics_prefix: String,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            storage_key: "theme".to_string(),
            stylesheet_marker: "cgit".to_string(),
            statics_prefix: "/statics".to_string(),
        }
    }
}

/// Everything the initializer puts on the page for one theme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeView {
    pub theme: Theme,
    pub label: String,
    pub logo_path: String,
    pub stylesheet_path: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ThemeError {
    #[error("Not support localstorage")]
    StorageUnavailable,
}

/// First segment of an URL path; `/myrepo/log.html` is `myrepo`.
pub fn repo_from_path(pathname: &str) -> &str {
    pathname.split('/').nth(1).unwrap_or("")
}

pub fn derive_view(config: &ThemeConfig, theme: Theme, pathname: &str) -> ThemeView {
    let repo = repo_from_path(pathname);
    let prefix = config.statics_prefix.trim_end_matches('/');
    let label = format!("{} theme", theme.opposite().as_str());
    ThemeView {
        theme,
        label,
        logo_path: format!("{prefix}/{repo}/logo-{}.png", theme.as_str()),
        stylesheet_path: format!("{prefix}/cgit-{}.css", theme.as_str()),
    }
}

/// Capability check, defaulting and derivation. Runs before the page is ready.
pub fn prepare<S: PreferenceStore>(
    config: &ThemeConfig,
    store: Option<&mut S>,
    pathname: &str,
) -> Result<ThemeView, ThemeError> {
    let store = store.ok_or(ThemeError::StorageUnavailable)?;

    let stored = match store.get() {
        Some(v) if !v.is_empty() => v,
        _ => {
            tracing::debug!(key = %config.storage_key, "no theme stored; defaulting to light");
            store.set(Theme::Light.as_str());
            Theme::Light.as_str().to_string()
        }
    };

    let view = derive_view(config, Theme::from_stored(&stored), pathname);
    tracing::debug!(
        repo = repo_from_path(pathname),
        theme = view.theme.as_str(),
        "derived theme view"
    );
    Ok(view)
}

/// Strict two-state flip keyed only on equality to `"light"`.
pub fn flip<S: PreferenceStore>(store: &mut S) -> Theme {
    let next = match store.get().as_deref() {
        Some("light") => Theme::Dark,
        _ => Theme::Light,
    };
    store.set(next.as_str());
    next
}

pub fn toggle_markup(label: &str) -> Markup {
    html! {
        button onclick="setTheme()"
            style="background-color:transparent; color:blue; border:none; outline:none;" {
            (label)
        }
    }
}
