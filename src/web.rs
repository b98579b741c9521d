use tracing::Level;
use wasm_bindgen::JsCast as _;
use wasm_bindgen::prelude::*;
use web_sys::{Document, Element, Storage, Window};

use crate::logging::{self, LineSink};
use crate::page::{self, PageSurface};
use crate::prefs::PreferenceStore;
use crate::theme::{self, ThemeConfig};

/// `window.localStorage`, scoped to one key.
pub struct LocalStorage {
    storage: Storage,
    key: String,
}

impl LocalStorage {
    /// `None` when the browser has no usable localStorage.
    pub fn open(window: &Window, key: &str) -> Option<Self> {
        let storage = window.local_storage().ok()??;
        Some(Self {
            storage,
            key: key.to_string(),
        })
    }
}

impl PreferenceStore for LocalStorage {
    fn get(&self) -> Option<String> {
        self.storage.get_item(&self.key).ok().flatten()
    }

    fn set(&mut self, value: &str) {
        if let Err(e) = self.storage.set_item(&self.key, value) {
            tracing::warn!(error = ?e, key = %self.key, "failed to write localStorage");
        }
    }
}

#[derive(Clone)]
pub struct DomPage {
    window: Window,
    document: Document,
}

impl DomPage {
    pub fn new(window: Window, document: Document) -> Self {
        Self { window, document }
    }

    fn select_all(&self, selector: &str) -> Vec<Element> {
        let Ok(list) = self.document.query_selector_all(selector) else {
            return Vec::new();
        };
        (0..list.length())
            .filter_map(|i| list.get(i))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .collect()
    }
}

impl PageSurface for DomPage {
    type Link = Element;

    fn stylesheet_links(&self) -> Vec<Element> {
        self.select_all("link[rel~=stylesheet]")
    }

    fn link_href(&self, link: &Element) -> Option<String> {
        link.get_attribute("href")
    }

    fn remove_link(&self, link: &Element) {
        link.remove();
    }

    fn append_stylesheet(&self, href: &str) {
        let Some(head) = self.document.head() else {
            return;
        };
        let Ok(link) = self.document.create_element("link") else {
            return;
        };
        for (name, value) in [("rel", "stylesheet"), ("type", "text/css"), ("href", href)] {
            link.set_attribute(name, value).ok();
        }
        if let Err(e) = head.append_child(&link) {
            tracing::warn!(error = ?e, "failed to append stylesheet");
        }
    }

    fn append_toggle(&self, label: &str) {
        let markup = theme::toggle_markup(label).into_string();
        for container in self.select_all(".logo") {
            container.insert_adjacent_html("beforeend", &markup).ok();
        }
    }

    fn set_logo_src(&self, src: &str) {
        for img in self.select_all(".logo img") {
            img.set_attribute("src", src).ok();
        }
    }

    fn notify(&self, message: &str) {
        self.window.alert_with_message(message).ok();
    }

    fn reload(&self) {
        self.window.location().reload().ok();
    }
}

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    tracing::subscriber::set_global_default(logging::subscriber(console_sink(), Level::INFO)).ok();

    if let Err(e) = run() {
        web_sys::console::error_1(&e);
    }
}

fn console_sink() -> LineSink {
    LineSink::new(|level, line| {
        let line = JsValue::from_str(line);
        match level {
            Level::ERROR => web_sys::console::error_1(&line),
            Level::WARN => web_sys::console::warn_1(&line),
            Level::INFO => web_sys::console::info_1(&line),
            _ => web_sys::console::debug_1(&line),
        }
    })
}

fn run() -> Result<(), JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;
    let config = ThemeConfig::default();
    let pathname = window.location().pathname()?;
    let dom = DomPage::new(window.clone(), document.clone());

    let mut store = LocalStorage::open(&window, &config.storage_key);
    let view = match theme::prepare(&config, store.as_mut(), &pathname) {
        Ok(view) => view,
        Err(e) => {
            dom.notify(&e.to_string());
            return Ok(());
        }
    };

    install_set_theme(&window, &config.storage_key)?;

    let ready_state = js_sys::Reflect::get(&document, &JsValue::from_str("readyState"))?
        .as_string()
        .unwrap_or_default();
    if ready_state == "loading" {
        let on_ready = Closure::once(move |_event: web_sys::Event| {
            page::apply(&dom, &config, &view);
        });
        document
            .add_event_listener_with_callback("DOMContentLoaded", on_ready.as_ref().unchecked_ref())?;
        on_ready.forget();
    } else {
        page::apply(&dom, &config, &view);
    }
    Ok(())
}

/// Publishes `window.setTheme`, which the toggle button's `onclick` calls.
fn install_set_theme(window: &Window, key: &str) -> Result<(), JsValue> {
    let key = key.to_string();
    let set_theme = Closure::wrap(Box::new(move || {
        let Some(window) = web_sys::window() else {
            return;
        };
        let Some(document) = window.document() else {
            return;
        };
        let dom = DomPage::new(window.clone(), document);
        match LocalStorage::open(&window, &key) {
            Some(mut store) => page::toggle(&mut store, &dom),
            None => dom.notify(&theme::ThemeError::StorageUnavailable.to_string()),
        }
    }) as Box<dyn FnMut()>);

    js_sys::Reflect::set(window, &JsValue::from_str("setTheme"), set_theme.as_ref())?;
    set_theme.forget();
    Ok(())
}
