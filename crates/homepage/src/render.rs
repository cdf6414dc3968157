use homepage_status::{IndexStatus, SyncStatus};

use crate::page::{ids, Page, PageError};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Rendered {
    /// Fields were written; open panels may have changed size.
    Updated,
    /// The feed is switched off upstream; only the always-on fields were
    /// written.
    Disabled,
}

/// Writes a node status into the Bitcoin panel. Every target is expected to
/// exist: a missing one stops the pass with an error, keeping the writes
/// made before it.
pub fn render_bitcoin(page: &mut Page, status: &SyncStatus) -> Result<Rendered, PageError> {
    let tier = status.tier();

    page.require(ids::BTC_VERSION)?.text = status.version.clone();
    page.require(ids::BTC_SYNC_TEXT)?.text = status.sync_text();

    let bar = page.require(ids::BTC_BAR)?;
    bar.fill_percent = Some(status.sync_percent);
    bar.tier = Some(tier);

    page.require(ids::BTC_DOT)?.tier = Some(tier);
    page.require(ids::BTC_STATUS)?.text = status.status_label().to_string();

    page.require(ids::BTC_DISK)?.text = status.disk_text();
    page.require(ids::BTC_MEMPOOL)?.text = status.mempool_text();
    page.require(ids::BTC_PEERS)?.text = status.peers_text();
    page.require(ids::BTC_UPTIME)?.text = status.uptime.clone();

    Ok(Rendered::Updated)
}

/// Writes an indexer status into the Fulcrum panel. Each target is optional
/// and each optional field only touches the page when present.
pub fn render_fulcrum(page: &mut Page, status: &IndexStatus) -> Result<Rendered, PageError> {
    if let Some(version) = status.version_text() {
        if let Some(element) = page.get_mut(ids::FL_VERSION) {
            element.text = version.to_string();
        }
    }

    if let Some(badge) = page.get_mut(ids::FL_BTC_BADGE) {
        badge.hidden = status.bitcoin_up;
    }

    if status.is_disabled() {
        return Ok(Rendered::Disabled);
    }

    if let Some(text) = status.sync_text() {
        if let Some(element) = page.get_mut(ids::FL_SYNC_TEXT) {
            element.text = text;
        }
    }

    if let Some(percent) = status.sync_percent {
        let tier = status.tier();
        if let Some(bar) = page.get_mut(ids::FL_BAR) {
            bar.fill_percent = Some(percent);
            bar.tier = tier;
        }
        if let Some(dot) = page.get_mut(ids::FL_DOT) {
            dot.tier = tier;
        }
    }

    if let Some(element) = page.get_mut(ids::FL_STATUS) {
        element.text = status.status_label();
    }

    if let Some(element) = page.get_mut(ids::FL_SPEEDS) {
        match status.speeds_text() {
            Some(text) => {
                element.text = text;
                element.hidden = false;
            }
            None => element.hidden = true,
        }
    }

    Ok(Rendered::Updated)
}
