//! Dashboard state owned by the UI loop: the page, its panels, the zoom
//! modal and the copy markers. Poll outcomes arrive here and nowhere else.

use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::clipboard::{copy_text, Clipboard, CopyFeedback};
use crate::collapsible::Panels;
use crate::links::ServiceLink;
use crate::page::{ids, Page};
use crate::poller::{Feed, FeedPayload, PollError, PollOutcome};
use crate::render::{render_bitcoin, render_fulcrum, Rendered};
use crate::zoom::ZoomModal;

/// Width of the label column in front of each panel row.
pub const LABEL_WIDTH: u16 = 12;
/// Marker after zoomable link values.
pub const QR_TAG: &str = " [QR]";
/// Tier dot in front of status text.
pub const STATUS_DOT: &str = "● ";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PanelKind {
    Bitcoin,
    Fulcrum,
    Links,
}

impl PanelKind {
    pub const ALL: [PanelKind; 3] = [PanelKind::Bitcoin, PanelKind::Fulcrum, PanelKind::Links];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bitcoin" | "btc" => Some(PanelKind::Bitcoin),
            "fulcrum" => Some(PanelKind::Fulcrum),
            "links" | "connect" => Some(PanelKind::Links),
            _ => None,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            PanelKind::Bitcoin => "Bitcoin Core",
            PanelKind::Fulcrum => "Fulcrum",
            PanelKind::Links => "Connect",
        }
    }

    pub fn body_id(self) -> &'static str {
        match self {
            PanelKind::Bitcoin => ids::BTC_BODY,
            PanelKind::Fulcrum => ids::FL_BODY,
            PanelKind::Links => ids::LINKS_BODY,
        }
    }

    pub fn arrow_id(self) -> &'static str {
        match self {
            PanelKind::Bitcoin => ids::BTC_ARROW,
            PanelKind::Fulcrum => ids::FL_ARROW,
            PanelKind::Links => ids::LINKS_ARROW,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RowKind {
    Text,
    Gauge,
    /// Status text led by a tier dot.
    Status { dot: &'static str },
    Badge,
    Link { zoomable: bool },
}

/// One visible line group inside a panel body.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PanelRow {
    pub label: String,
    pub id: String,
    pub kind: RowKind,
}

impl PanelRow {
    fn new(label: &str, id: &str, kind: RowKind) -> Self {
        Self {
            label: label.to_string(),
            id: id.to_string(),
            kind,
        }
    }
}

/// What one poll outcome did to the page.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Applied {
    Rendered,
    Disabled,
    /// An older answer arrived after a newer one had been applied.
    Stale,
    /// The backend reported an error; the page was left alone.
    Skipped,
    Failed,
}

pub fn build_page(links: &[ServiceLink]) -> Page {
    let mut page = Page::standard();
    for link in links {
        page.add_link(&link.label, &link.value, link.zoomable);
    }
    page
}

/// A row label padded to the label column, always followed by at least one
/// space so a long label never runs into its value.
pub fn label_cell(label: &str) -> String {
    let width = usize::from(LABEL_WIDTH) - 1;
    format!("{label:<width$} ")
}

/// Panel bodies are inset by one column on each side.
pub fn body_width(width: u16) -> u16 {
    width.saturating_sub(2).max(1)
}

/// Rows are broken at exactly `body_width` characters, never at words.
fn wrapped_rows(row_chars: usize, width: u16) -> u16 {
    let inner = usize::from(body_width(width));
    u16::try_from(row_chars.div_ceil(inner).max(1)).unwrap_or(u16::MAX)
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

pub struct Dashboard {
    page: Page,
    panels: Panels,
    modal: ZoomModal,
    feedback: CopyFeedback,
    clipboard: Clipboard,
    copy_targets: Vec<String>,
    zoom_targets: Vec<String>,
    width: u16,
    selected_link: usize,
    discard_stale: bool,
    last_applied: HashMap<Feed, u64>,
    last_update_ms: Option<u64>,
}

impl Dashboard {
    pub fn new(page: Page, clipboard: Clipboard, discard_stale: bool) -> Self {
        let mut panels = Panels::new();
        for kind in PanelKind::ALL {
            panels.register(kind.body_id(), Some(kind.arrow_id()));
        }
        Self {
            page,
            panels,
            modal: ZoomModal::new(),
            feedback: CopyFeedback::new(),
            clipboard,
            copy_targets: Vec::new(),
            zoom_targets: Vec::new(),
            width: 80,
            selected_link: 0,
            discard_stale,
            last_applied: HashMap::new(),
            last_update_ms: None,
        }
    }

    /// Binds copy and zoom targets and opens the default panel. The first
    /// poll is issued by the caller right after.
    pub fn bootstrap(&mut self, default_panel: PanelKind) {
        self.copy_targets = self.page.copy_targets();
        self.zoom_targets = self.page.zoom_targets();
        self.measure_panels();
        self.panels
            .open(default_panel.body_id(), default_panel.arrow_id());
        log_debug!(
            "bootstrap: {} copy targets, {} zoom targets, {} open",
            self.copy_targets.len(),
            self.zoom_targets.len(),
            default_panel.title()
        );
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn panels(&self) -> &Panels {
        &self.panels
    }

    pub fn modal(&self) -> &ZoomModal {
        &self.modal
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn last_update_ms(&self) -> Option<u64> {
        self.last_update_ms
    }

    pub fn apply(&mut self, outcome: PollOutcome) -> Applied {
        let PollOutcome { feed, seq, result } = outcome;
        let payload = match result {
            Ok(payload) => payload,
            Err(PollError::Backend(message)) => {
                log_warn!("{} status unavailable: {message}", feed.label());
                return Applied::Skipped;
            }
            Err(err) => {
                log_error!("{} poll failed: {err}", feed.label());
                return Applied::Failed;
            }
        };

        if self.discard_stale {
            let last = self.last_applied.get(&feed).copied().unwrap_or(0);
            if seq <= last {
                log_debug!("{} answer #{seq} older than #{last}; dropped", feed.label());
                return Applied::Stale;
            }
        }

        let rendered = match &payload {
            FeedPayload::Bitcoin(status) => render_bitcoin(&mut self.page, status),
            FeedPayload::Fulcrum(status) => render_fulcrum(&mut self.page, status),
        };
        self.last_applied.insert(feed, seq);
        match rendered {
            Ok(Rendered::Updated) => {
                self.last_update_ms = Some(now_ms());
                self.measure_panels();
                self.panels.recalc_heights();
                log_debug!("{} status rendered (#{seq})", feed.label());
                Applied::Rendered
            }
            Ok(Rendered::Disabled) => {
                self.last_update_ms = Some(now_ms());
                Applied::Disabled
            }
            Err(err) => {
                log_error!("{} render failed: {err}", feed.label());
                Applied::Failed
            }
        }
    }

    /// Rows a panel shows right now; hidden and missing elements take no room.
    pub fn panel_rows(&self, kind: PanelKind) -> Vec<PanelRow> {
        let candidates = match kind {
            PanelKind::Bitcoin => vec![
                PanelRow::new("Version", ids::BTC_VERSION, RowKind::Text),
                PanelRow::new("Sync", ids::BTC_SYNC_TEXT, RowKind::Text),
                PanelRow::new("", ids::BTC_BAR, RowKind::Gauge),
                PanelRow::new("Status", ids::BTC_STATUS, RowKind::Status { dot: ids::BTC_DOT }),
                PanelRow::new("Disk", ids::BTC_DISK, RowKind::Text),
                PanelRow::new("Mempool", ids::BTC_MEMPOOL, RowKind::Text),
                PanelRow::new("Peers", ids::BTC_PEERS, RowKind::Text),
                PanelRow::new("Uptime", ids::BTC_UPTIME, RowKind::Text),
            ],
            PanelKind::Fulcrum => vec![
                PanelRow::new("Version", ids::FL_VERSION, RowKind::Text),
                PanelRow::new("", ids::FL_BTC_BADGE, RowKind::Badge),
                PanelRow::new("Height", ids::FL_SYNC_TEXT, RowKind::Text),
                PanelRow::new("", ids::FL_BAR, RowKind::Gauge),
                PanelRow::new("Status", ids::FL_STATUS, RowKind::Status { dot: ids::FL_DOT }),
                PanelRow::new("Speed", ids::FL_SPEEDS, RowKind::Text),
            ],
            PanelKind::Links => self
                .page
                .links()
                .iter()
                .map(|link| {
                    let zoomable = self
                        .page
                        .get(&link.id)
                        .is_some_and(|element| element.zoom_source.is_some());
                    PanelRow::new(&link.label, &link.id, RowKind::Link { zoomable })
                })
                .collect(),
        };
        candidates
            .into_iter()
            .filter(|row| self.page.get(&row.id).is_some_and(|element| !element.hidden))
            .collect()
    }

    /// Characters a row occupies before wrapping: label cell, value and any
    /// leading dot or trailing QR tag.
    pub fn row_chars(&self, row: &PanelRow) -> usize {
        let text = self.page.text_of(&row.id).unwrap_or_default().chars().count();
        let extra = match row.kind {
            RowKind::Status { .. } => STATUS_DOT.chars().count(),
            RowKind::Link { zoomable: true } => QR_TAG.chars().count(),
            _ => 0,
        };
        label_cell(&row.label).chars().count() + text + extra
    }

    pub fn row_height(&self, row: &PanelRow) -> u16 {
        if row.kind == RowKind::Gauge {
            return 1;
        }
        wrapped_rows(self.row_chars(row), self.width)
    }

    /// Re-measures the natural content height of every panel at the
    /// current width.
    pub fn measure_panels(&mut self) {
        for kind in PanelKind::ALL {
            let height = self
                .panel_rows(kind)
                .iter()
                .map(|row| self.row_height(row))
                .sum::<u16>()
                .max(1);
            self.panels.measure(kind.body_id(), height);
        }
    }

    pub fn toggle(&mut self, kind: PanelKind) {
        self.panels.toggle(kind.body_id(), kind.arrow_id());
    }

    pub fn resize(&mut self, width: u16) {
        self.width = width;
        self.measure_panels();
        self.panels.recalc_heights();
    }

    /// Copies a bound copy target, marking it for the feedback window.
    pub fn copy_element(&mut self, id: &str, now: Instant) -> Option<bool> {
        if !self.copy_targets.iter().any(|target| target == id) {
            return None;
        }
        let text = self.page.get(id)?.copy_text();
        Some(copy_text(
            &self.clipboard,
            &mut self.feedback,
            &mut self.page,
            &text,
            Some(id),
            now,
        ))
    }

    pub fn zoom_element(&mut self, id: &str) -> bool {
        if !self.zoom_targets.iter().any(|target| target == id) {
            return false;
        }
        self.modal.open_target(&mut self.page, id)
    }

    pub fn close_modal(&mut self) {
        self.modal.close(&mut self.page);
    }

    pub fn click_modal(&mut self, on_image: bool) {
        self.modal.click(&mut self.page, on_image);
    }

    pub fn selected_link(&self) -> Option<&str> {
        self.page
            .links()
            .get(self.selected_link)
            .map(|link| link.id.as_str())
    }

    pub fn select_next_link(&mut self) {
        let count = self.page.links().len();
        if count > 0 {
            self.selected_link = (self.selected_link + 1) % count;
        }
    }

    pub fn select_prev_link(&mut self) {
        let count = self.page.links().len();
        if count > 0 {
            self.selected_link = (self.selected_link + count - 1) % count;
        }
    }

    pub fn select_link(&mut self, id: &str) {
        if let Some(index) = self.page.links().iter().position(|link| link.id == id) {
            self.selected_link = index;
        }
    }

    pub fn copy_selected(&mut self, now: Instant) -> Option<bool> {
        let id = self.selected_link()?.to_string();
        self.copy_element(&id, now)
    }

    pub fn zoom_selected(&mut self) -> bool {
        match self.selected_link().map(str::to_string) {
            Some(id) => self.zoom_element(&id),
            None => false,
        }
    }

    /// One UI frame: queued collapses, height transitions, expired copy
    /// markers. True while something is still animating.
    pub fn tick(&mut self, now: Instant, elapsed: Duration) -> bool {
        self.panels.run_animation_frame();
        let moving = self.panels.animate(elapsed);
        self.feedback.expire(&mut self.page, now);
        moving
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::{ClipboardError, ClipboardSink};
    use homepage_status::{FeedResponse, SyncStatus};

    struct Refusing;

    impl ClipboardSink for Refusing {
        fn name(&self) -> &'static str {
            "refusing"
        }

        fn write(&self, _text: &str) -> Result<(), ClipboardError> {
            Err(ClipboardError::Unavailable)
        }
    }

    fn dashboard(discard_stale: bool) -> Dashboard {
        let links = vec![ServiceLink {
            label: "Bitcoin P2P".to_string(),
            value: "abcdefghijklmnop.onion:8333".to_string(),
            zoomable: true,
        }];
        let clipboard = Clipboard::new(Box::new(Refusing), Box::new(Refusing));
        let mut dashboard = Dashboard::new(build_page(&links), clipboard, discard_stale);
        dashboard.bootstrap(PanelKind::Bitcoin);
        dashboard
    }

    fn bitcoin(seq: u64, blocks: u64) -> PollOutcome {
        let body = format!(
            r#"{{"version":"26.0","blocks":{blocks},"headers":800000,"sync_percent":99.0,
                "disk_size_gb":600,"mempool_mb":120,
                "connections":{{"total":10,"inbound":4,"outbound":6}},"uptime":"3d"}}"#
        );
        let status = FeedResponse::<SyncStatus>::from_json(&body)
            .expect("json")
            .ready()
            .expect("ready");
        PollOutcome {
            feed: Feed::Bitcoin,
            seq,
            result: Ok(FeedPayload::Bitcoin(status)),
        }
    }

    #[test]
    fn bootstrap_opens_default_panel_only() {
        let dashboard = dashboard(false);
        assert!(dashboard.panels().is_open(ids::BTC_BODY));
        assert!(!dashboard.panels().is_open(ids::FL_BODY));
        assert!(!dashboard.panels().is_open(ids::LINKS_BODY));
        assert_eq!(dashboard.panels().get(ids::BTC_BODY).expect("panel").max_height(), 8);
    }

    #[test]
    fn backend_error_leaves_page_identical() {
        let mut dashboard = dashboard(false);
        dashboard.apply(bitcoin(1, 799_000));
        let before = dashboard.page().clone();
        let applied = dashboard.apply(PollOutcome {
            feed: Feed::Bitcoin,
            seq: 2,
            result: Err(PollError::Backend("x".to_string())),
        });
        assert_eq!(applied, Applied::Skipped);
        assert_eq!(dashboard.page(), &before);
    }

    #[test]
    fn stale_answers_dropped_only_when_enabled() {
        let mut guarded = dashboard(true);
        assert_eq!(guarded.apply(bitcoin(2, 799_002)), Applied::Rendered);
        assert_eq!(guarded.apply(bitcoin(1, 799_001)), Applied::Stale);
        assert_eq!(
            guarded.page().text_of(ids::BTC_SYNC_TEXT),
            Some("799002 / 800000 (99%)")
        );

        let mut open = dashboard(false);
        open.apply(bitcoin(2, 799_002));
        assert_eq!(open.apply(bitcoin(1, 799_001)), Applied::Rendered);
        assert_eq!(
            open.page().text_of(ids::BTC_SYNC_TEXT),
            Some("799001 / 800000 (99%)")
        );
    }

    #[test]
    fn narrow_terminal_grows_link_panel() {
        let mut dashboard = dashboard(false);
        dashboard.toggle(PanelKind::Links);
        let wide = dashboard.panels().get(ids::LINKS_BODY).expect("links").max_height();
        dashboard.resize(24);
        let narrow = dashboard.panels().get(ids::LINKS_BODY).expect("links").max_height();
        assert_eq!(wide, 1);
        assert!(narrow > wide, "{narrow} <= {wide}");
    }

    #[test]
    fn labels_keep_a_separator_and_count_toward_height() {
        assert_eq!(label_cell("Disk"), format!("Disk{}", " ".repeat(8)));
        assert_eq!(label_cell("Dojo pairing"), "Dojo pairing ");

        let links = vec![ServiceLink {
            label: "Dojo pairing".to_string(),
            value: "x".repeat(60),
            zoomable: true,
        }];
        let clipboard = Clipboard::new(Box::new(Refusing), Box::new(Refusing));
        let mut dashboard = Dashboard::new(build_page(&links), clipboard, false);
        dashboard.bootstrap(PanelKind::Links);
        dashboard.resize(40);
        let row = dashboard.panel_rows(PanelKind::Links).remove(0);
        // 13 label + 60 value + 5 tag over a 38-column body.
        assert_eq!(dashboard.row_chars(&row), 78);
        assert_eq!(dashboard.row_height(&row), 3);
        assert_eq!(dashboard.panels().get(ids::LINKS_BODY).expect("links").max_height(), 3);
    }

    #[test]
    fn failed_copy_reverts_color() {
        let mut dashboard = dashboard(false);
        let id = dashboard.selected_link().expect("link").to_string();
        let start = Instant::now();
        assert_eq!(dashboard.copy_selected(start), Some(false));
        assert!(dashboard.page().get(&id).expect("link").color.is_some());
        dashboard.tick(start + crate::clipboard::FEEDBACK_WINDOW, Duration::ZERO);
        assert_eq!(dashboard.page().get(&id).expect("link").color, None);
    }

    #[test]
    fn unbound_elements_do_not_copy_or_zoom() {
        let mut dashboard = dashboard(false);
        assert_eq!(dashboard.copy_element(ids::BTC_STATUS, Instant::now()), None);
        assert!(!dashboard.zoom_element(ids::BTC_STATUS));
        assert!(dashboard.zoom_selected());
        assert!(dashboard.page().is_blurred());
        dashboard.close_modal();
        assert!(!dashboard.page().is_blurred());
    }
}
