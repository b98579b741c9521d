use std::cell::{Cell, RefCell};

use anyhow::Context as _;
use kuchiki::NodeRef;
use kuchiki::traits::TendrilSink as _;
use maud::html;

use crate::page::PageSurface;
use crate::theme;

/// A parsed HTML document standing in for the live DOM.
///
/// Notifications are recorded instead of shown, and a reload only bumps a
/// counter.
pub struct StaticPage {
    document: NodeRef,
    notifications: RefCell<Vec<String>>,
    reloads: Cell<u32>,
}

impl StaticPage {
    pub fn parse(html: &str) -> Self {
        Self {
            document: kuchiki::parse_html().one(html),
            notifications: RefCell::new(Vec::new()),
            reloads: Cell::new(0),
        }
    }

    pub fn document(&self) -> &NodeRef {
        &self.document
    }

    pub fn notifications(&self) -> Vec<String> {
        self.notifications.borrow().clone()
    }

    pub fn reload_count(&self) -> u32 {
        self.reloads.get()
    }

    /// `href` of every stylesheet link, in document order.
    pub fn stylesheet_hrefs(&self) -> Vec<String> {
        self.stylesheet_links()
            .iter()
            .filter_map(|link| self.link_href(link))
            .collect()
    }

    pub fn to_html(&self) -> anyhow::Result<String> {
        let mut out = Vec::new();
        self.document
            .serialize(&mut out)
            .context("serialize page")?;
        String::from_utf8(out).context("page html not utf-8")
    }

    fn logo_containers(&self) -> Vec<NodeRef> {
        match self.document.select(".logo") {
            Ok(nodes) => nodes.map(|n| n.as_node().clone()).collect(),
            Err(()) => Vec::new(),
        }
    }
}

impl PageSurface for StaticPage {
    type Link = NodeRef;

    fn stylesheet_links(&self) -> Vec<NodeRef> {
        let Ok(nodes) = self.document.select("link") else {
            return Vec::new();
        };
        nodes
            .filter(|n| is_stylesheet_rel(n.attributes.borrow().get("rel").unwrap_or("")))
            .map(|n| n.as_node().clone())
            .collect()
    }

    fn link_href(&self, link: &NodeRef) -> Option<String> {
        let element = link.as_element()?;
        let attrs = element.attributes.borrow();
        attrs.get("href").map(str::to_string)
    }

    fn remove_link(&self, link: &NodeRef) {
        link.detach();
    }

    fn append_stylesheet(&self, href: &str) {
        let Ok(head) = self.document.select_first("head") else {
            tracing::debug!("page has no <head>; stylesheet not linked");
            return;
        };
        let markup = html! { link rel="stylesheet" type="text/css" href=(href); };
        if let Some(link) = fragment_node(&markup.into_string(), "link") {
            head.as_node().append(link);
        }
    }

    fn append_toggle(&self, label: &str) {
        let markup = theme::toggle_markup(label).into_string();
        for container in self.logo_containers() {
            if let Some(button) = fragment_node(&markup, "button") {
                container.append(button);
            }
        }
    }

    fn set_logo_src(&self, src: &str) {
        for container in self.logo_containers() {
            let Ok(images) = container.select("img") else {
                continue;
            };
            for img in images {
                img.attributes.borrow_mut().insert("src", src.to_string());
            }
        }
    }

    fn notify(&self, message: &str) {
        tracing::warn!(message, "page notification");
        self.notifications.borrow_mut().push(message.to_string());
    }

    fn reload(&self) {
        self.reloads.set(self.reloads.get() + 1);
    }
}

fn is_stylesheet_rel(rel: &str) -> bool {
    rel.split(|c: char| c.is_ascii_whitespace())
        .any(|t| t.eq_ignore_ascii_case("stylesheet"))
}

/// Parses `frag` and returns its first `selector` element, detached.
fn fragment_node(frag: &str, selector: &str) -> Option<NodeRef> {
    let doc = kuchiki::parse_html().one(frag);
    let node = doc.select_first(selector).ok()?.as_node().clone();
    node.detach();
    Some(node)
}
