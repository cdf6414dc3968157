//! Status payloads served by the node homepage backend and the values a
//! dashboard derives from them.

pub mod bitcoin;
pub mod format;
pub mod fulcrum;
pub mod response;
pub mod tier;

pub use bitcoin::{Connections, SyncStatus};
pub use fulcrum::{IndexSpeeds, IndexStatus};
pub use response::{FeedResponse, ResponseError};
pub use tier::{status_label, SyncTier, LAGGING_THRESHOLD, SYNCED_THRESHOLD};
