//! Per-channel pipelines. Each record owns its sanitized raw signal, the
//! filtered signal its detector ran on, and the resulting event sets.

pub mod bcg;
pub mod ecg;
pub mod imu;
pub mod ppg;

pub use bcg::BcgRecord;
pub use ecg::EcgRecord;
pub use imu::ImuRecord;
pub use ppg::PpgRecord;

use crate::signal::{Events, Signal};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Ecg,
    Bcg,
    Ppg,
    Imu,
}

impl ChannelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelKind::Ecg => "ecg",
            ChannelKind::Bcg => "bcg",
            ChannelKind::Ppg => "ppg",
            ChannelKind::Imu => "imu",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common view over processed channels for export and plotting.
pub trait ChannelRecord {
    fn kind(&self) -> ChannelKind;
    /// Sanitized input on the session time axis.
    fn raw(&self) -> &Signal;
    /// Signal the landmark detector ran on.
    fn filtered(&self) -> &Signal;
    /// The channel's primary landmarks (R-peaks, J-peaks, troughs).
    fn events(&self) -> &Events;

    fn markers(&self) -> Vec<bool> {
        self.events().to_markers(self.filtered().len())
    }
}
