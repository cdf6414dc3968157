use serde::{Deserialize, Serialize};

use crate::format;
use crate::tier::{status_label, SyncTier};

pub const IN_PROGRESS_LABEL: &str = "Syncing";

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Connections {
    pub total: u64,
    pub inbound: u64,
    pub outbound: u64,
}

/// `/api/bitcoin` payload. Every field is required: the endpoint either
/// answers in full or reports an error.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct SyncStatus {
    pub version: String,
    pub blocks: u64,
    pub headers: u64,
    pub sync_percent: f64,
    pub disk_size_gb: f64,
    pub mempool_mb: f64,
    pub connections: Connections,
    pub uptime: String,
}

impl SyncStatus {
    pub fn tier(&self) -> SyncTier {
        SyncTier::from_percent(self.sync_percent)
    }

    pub fn status_label(&self) -> &'static str {
        status_label(self.sync_percent, IN_PROGRESS_LABEL)
    }

    pub fn sync_text(&self) -> String {
        format!(
            "{} / {} ({})",
            self.blocks,
            self.headers,
            format::percent(self.sync_percent)
        )
    }

    pub fn peers_text(&self) -> String {
        format!(
            "{} ({} in / {} out)",
            self.connections.total, self.connections.inbound, self.connections.outbound
        )
    }

    pub fn disk_text(&self) -> String {
        format::number(self.disk_size_gb)
    }

    pub fn mempool_text(&self) -> String {
        format::number(self.mempool_mb)
    }
}
