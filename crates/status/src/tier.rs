/// At or above this percentage a service counts as synced.
pub const SYNCED_THRESHOLD: f64 = 99.9;
/// At or above this percentage a service is close behind the tip.
pub const LAGGING_THRESHOLD: f64 = 95.0;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SyncTier {
    Green,
    Yellow,
    Red,
}

impl SyncTier {
    pub fn from_percent(percent: f64) -> Self {
        if percent >= SYNCED_THRESHOLD {
            Self::Green
        } else if percent >= LAGGING_THRESHOLD {
            Self::Yellow
        } else {
            // NaN lands here too.
            Self::Red
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Red => "red",
        }
    }
}

/// "Synced" once caught up, otherwise the service's own in-progress word.
pub fn status_label(percent: f64, in_progress: &'static str) -> &'static str {
    if percent >= SYNCED_THRESHOLD {
        "Synced"
    } else {
        in_progress
    }
}
