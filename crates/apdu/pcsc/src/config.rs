//! Configuration options for PC/SC transport

use pcsc::{Protocols, ShareMode as PcscShareMode};
use serde::{Deserialize, Serialize};

/// Sharing mode for card connections
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareMode {
    /// Exclusive access to the card
    Exclusive,
    /// Shared access to the card (default)
    #[default]
    Shared,
    /// Direct connection to the reader
    Direct,
}

impl From<ShareMode> for PcscShareMode {
    fn from(mode: ShareMode) -> Self {
        match mode {
            ShareMode::Exclusive => Self::Exclusive,
            ShareMode::Shared => Self::Shared,
            ShareMode::Direct => Self::Direct,
        }
    }
}

/// Strategy for picking a reader
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConnectStrategy {
    /// Connect to a specific reader by name
    Reader(String),
    /// Connect to the first reader with a card present
    #[default]
    AnyCard,
}

impl ConnectStrategy {
    /// Use the named reader, or any reader with a card when no name is given
    pub fn from_name(name: Option<&str>) -> Self {
        name.map_or(Self::AnyCard, |name| Self::Reader(name.to_owned()))
    }
}

/// Configuration options for PC/SC transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcscConfig {
    /// Sharing mode for card connections
    pub share_mode: ShareMode,
    /// Preferred protocols for card communication
    pub protocols: Protocols,
    /// Reconnect once and retry when the card was reset behind our back
    pub auto_reconnect: bool,
}

impl Default for PcscConfig {
    fn default() -> Self {
        Self {
            share_mode: ShareMode::Shared,
            protocols: Protocols::ANY,
            auto_reconnect: true,
        }
    }
}

impl PcscConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sharing mode
    pub const fn with_share_mode(mut self, mode: ShareMode) -> Self {
        self.share_mode = mode;
        self
    }

    /// Set the preferred protocols
    pub const fn with_protocols(mut self, protocols: Protocols) -> Self {
        self.protocols = protocols;
        self
    }

    /// Set whether to automatically reconnect
    pub const fn with_auto_reconnect(mut self, auto_reconnect: bool) -> Self {
        self.auto_reconnect = auto_reconnect;
        self
    }
}
