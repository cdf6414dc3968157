//! The rendered page as data: every value a poller writes lands on an
//! [`Element`] looked up by its id, and the terminal view only reads from here.

use std::collections::BTreeMap;
use std::fmt;

use homepage_status::SyncTier;
use ratatui::style::Color;

/// Element ids shared by the pollers and the layout. Renaming one breaks the
/// binding silently: the element is simply not found.
pub mod ids {
    pub const BTC_VERSION: &str = "btc_version";
    pub const BTC_SYNC_TEXT: &str = "btc_sync_text";
    pub const BTC_BAR: &str = "btc_bar";
    pub const BTC_DOT: &str = "btc_dot";
    pub const BTC_STATUS: &str = "btc_status";
    pub const BTC_DISK: &str = "btc_disk";
    pub const BTC_MEMPOOL: &str = "btc_mempool";
    pub const BTC_PEERS: &str = "btc_peers";
    pub const BTC_UPTIME: &str = "btc_uptime";

    pub const FL_VERSION: &str = "fl_version";
    pub const FL_BTC_BADGE: &str = "fl_btc_badge";
    pub const FL_SYNC_TEXT: &str = "fl_sync_text";
    pub const FL_BAR: &str = "fl_bar";
    pub const FL_DOT: &str = "fl_dot";
    pub const FL_STATUS: &str = "fl_status";
    pub const FL_SPEEDS: &str = "fl_speeds";

    pub const BTC_BODY: &str = "btc_body";
    pub const BTC_ARROW: &str = "btc_arrow";
    pub const FL_BODY: &str = "fl_body";
    pub const FL_ARROW: &str = "fl_arrow";
    pub const LINKS_BODY: &str = "links_body";
    pub const LINKS_ARROW: &str = "links_arrow";

    pub const BITCOIN: &[&str] = &[
        BTC_VERSION,
        BTC_SYNC_TEXT,
        BTC_BAR,
        BTC_DOT,
        BTC_STATUS,
        BTC_DISK,
        BTC_MEMPOOL,
        BTC_PEERS,
        BTC_UPTIME,
    ];

    pub const FULCRUM: &[&str] = &[
        FL_VERSION,
        FL_BTC_BADGE,
        FL_SYNC_TEXT,
        FL_BAR,
        FL_DOT,
        FL_STATUS,
        FL_SPEEDS,
    ];
}

pub const PLACEHOLDER: &str = "-";

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Element {
    pub text: String,
    pub hidden: bool,
    /// Color class of bars and dots.
    pub tier: Option<SyncTier>,
    /// Bar fill, 0 to 100.
    pub fill_percent: Option<f64>,
    /// Transient copy-success marker.
    pub copied: bool,
    /// Inline color override; `None` means the theme color.
    pub color: Option<Color>,
    /// `Some` marks the element copyable. An empty payload copies the text.
    pub copy_payload: Option<String>,
    /// `Some` marks the element as a zoomable thumbnail of this source.
    pub zoom_source: Option<String>,
}

impl Element {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn is_copyable(&self) -> bool {
        self.copy_payload.is_some()
    }

    /// What a click copies: the explicit payload, or the trimmed text.
    pub fn copy_text(&self) -> String {
        match self.copy_payload.as_deref() {
            Some(payload) if !payload.is_empty() => payload.to_string(),
            _ => self.text.trim().to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LinkEntry {
    pub id: String,
    pub label: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PageError {
    MissingElement(String),
}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageError::MissingElement(id) => write!(f, "element '{id}' not found"),
        }
    }
}

impl std::error::Error for PageError {}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Page {
    elements: BTreeMap<String, Element>,
    links: Vec<LinkEntry>,
    blurred: bool,
}

impl Page {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every status element, in its before-first-poll state.
    pub fn standard() -> Self {
        let mut page = Self::empty();
        for id in ids::BITCOIN.iter().chain(ids::FULCRUM) {
            page.insert(id, Element::text(PLACEHOLDER));
        }
        page.insert(ids::FL_BTC_BADGE, Element::text("Bitcoin down").hidden());
        page.insert(ids::FL_SPEEDS, Element::text("").hidden());
        page
    }

    pub fn without(mut self, id: &str) -> Self {
        self.elements.remove(id);
        self
    }

    pub fn insert(&mut self, id: &str, element: Element) {
        self.elements.insert(id.to_string(), element);
    }

    pub fn get(&self, id: &str) -> Option<&Element> {
        self.elements.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Element> {
        self.elements.get_mut(id)
    }

    pub fn require(&mut self, id: &str) -> Result<&mut Element, PageError> {
        self.elements
            .get_mut(id)
            .ok_or_else(|| PageError::MissingElement(id.to_string()))
    }

    pub fn text_of(&self, id: &str) -> Option<&str> {
        self.get(id).map(|element| element.text.as_str())
    }

    /// Adds a copyable row to the Connect panel, optionally with a QR
    /// thumbnail. Returns the element id.
    pub fn add_link(&mut self, label: &str, value: &str, zoomable: bool) -> String {
        let id = format!("link_{}", self.links.len());
        let mut element = Element::text(value);
        element.copy_payload = Some(value.to_string());
        if zoomable {
            element.zoom_source = Some(value.to_string());
        }
        self.insert(&id, element);
        self.links.push(LinkEntry {
            id: id.clone(),
            label: label.to_string(),
        });
        id
    }

    pub fn links(&self) -> &[LinkEntry] {
        &self.links
    }

    pub fn is_blurred(&self) -> bool {
        self.blurred
    }

    pub fn set_blurred(&mut self, blurred: bool) {
        self.blurred = blurred;
    }

    pub fn copy_targets(&self) -> Vec<String> {
        self.elements
            .iter()
            .filter(|(_, element)| element.is_copyable())
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn zoom_targets(&self) -> Vec<String> {
        self.elements
            .iter()
            .filter(|(_, element)| element.zoom_source.is_some())
            .map(|(id, _)| id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_page_hides_badge_and_speeds() {
        let page = Page::standard();
        assert!(page.get(ids::FL_BTC_BADGE).expect("badge").hidden);
        assert!(page.get(ids::FL_SPEEDS).expect("speeds").hidden);
        assert_eq!(page.text_of(ids::BTC_STATUS), Some(PLACEHOLDER));
        assert!(page.get(ids::FL_STATUS).is_some());
    }

    #[test]
    fn copy_text_prefers_payload_then_trimmed_text() {
        let mut element = Element::text("  abc.onion:8333 \n");
        element.copy_payload = Some(String::new());
        assert_eq!(element.copy_text(), "abc.onion:8333");
        element.copy_payload = Some("payload".to_string());
        assert_eq!(element.copy_text(), "payload");
    }

    #[test]
    fn links_are_copy_and_zoom_targets() {
        let mut page = Page::standard();
        let plain = page.add_link("Mempool", "http://mempool.local", false);
        let qr = page.add_link("Bitcoin P2P", "abc.onion:8333", true);
        assert_eq!(page.copy_targets(), vec![plain.clone(), qr.clone()]);
        assert_eq!(page.zoom_targets(), vec![qr]);
        assert_eq!(page.links()[0].label, "Mempool");
    }

    #[test]
    fn require_reports_missing_ids() {
        let mut page = Page::standard().without(ids::BTC_DOT);
        assert_eq!(
            page.require(ids::BTC_DOT).err(),
            Some(PageError::MissingElement("btc_dot".to_string()))
        );
    }
}
