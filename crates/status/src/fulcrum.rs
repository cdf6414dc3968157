use serde::{Deserialize, Serialize};

use crate::format;
use crate::tier::{status_label, SyncTier};

pub const IN_PROGRESS_LABEL: &str = "Indexing";
pub const DISABLED_SOURCE: &str = "disabled";

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct IndexSpeeds {
    pub blocks_per_sec: f64,
    pub txs_per_sec: f64,
    pub addrs_per_sec: f64,
}

/// `/api/fulcrum` payload. Only `bitcoin_up` and `source` are always there;
/// an absent (or `null`) field means "not known yet" and is never read as
/// zero.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct IndexStatus {
    #[serde(default)]
    pub version: Option<String>,
    pub bitcoin_up: bool,
    pub source: String,
    #[serde(default)]
    pub height: Option<u64>,
    #[serde(default)]
    pub sync_percent: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
    /// Present only while the indexer is actively catching up.
    #[serde(default)]
    pub speeds: Option<IndexSpeeds>,
}

impl IndexStatus {
    pub fn is_disabled(&self) -> bool {
        self.source == DISABLED_SOURCE
    }

    pub fn version_text(&self) -> Option<&str> {
        self.version.as_deref().filter(|version| !version.is_empty())
    }

    pub fn tier(&self) -> Option<SyncTier> {
        self.sync_percent.map(SyncTier::from_percent)
    }

    pub fn sync_text(&self) -> Option<String> {
        let height = self.height?;
        Some(match self.sync_percent {
            Some(percent) => format!("{height} ({})", format::percent(percent)),
            None => height.to_string(),
        })
    }

    pub fn status_label(&self) -> String {
        if let Some(status) = self.status.as_deref().filter(|status| !status.is_empty()) {
            return status.to_string();
        }
        match self.sync_percent {
            Some(percent) => status_label(percent, IN_PROGRESS_LABEL).to_string(),
            None => IN_PROGRESS_LABEL.to_string(),
        }
    }

    pub fn speeds_text(&self) -> Option<String> {
        self.speeds.as_ref().map(|speeds| {
            format!(
                "{} blk/s · {} tx/s · {} addr/s",
                format::number(speeds.blocks_per_sec),
                format::number(speeds.txs_per_sec),
                format::number(speeds.addrs_per_sec)
            )
        })
    }
}
