//! GlobalPlatform SCP02 secure channel and card content management
//!
//! This crate provides the cryptography and the protocol flows needed to talk
//! to GlobalPlatform 2.1.1 cards over SCP02:
//!
//! - DES/3DES block primitives, the retail MAC family and legacy PBOC helpers
//!   ([`crypto`])
//! - session key derivation and cryptograms
//! - the [`SecureChannel`] state machine (INITIALIZE UPDATE, EXTERNAL
//!   AUTHENTICATE, C-MAC wrapping)
//! - GlobalPlatform commands and LOAD segmentation
//!
//! The main entry point is the [`GlobalPlatform`] struct, which scripts card
//! reset, authentication and DELETE / INSTALL / LOAD over any
//! [`CardTransport`](cardcheck_apdu_core::CardTransport).
//!
//! ```no_run
//! # fn main() -> cardcheck_globalplatform::Result<()> {
//! use cardcheck_apdu_pcsc::{ConnectStrategy, PcscConfig, PcscDeviceManager};
//! use cardcheck_globalplatform::GlobalPlatform;
//! # use cardcheck_apdu_pcsc::PcscError;
//! # let map = |e: PcscError| cardcheck_apdu_core::Error::Transport(e.into());
//!
//! let manager = PcscDeviceManager::new().map_err(map)?;
//! let transport = manager
//!     .connect(ConnectStrategy::AnyCard, PcscConfig::default())
//!     .map_err(map)?;
//!
//! let mut gp = GlobalPlatform::new(transport);
//! gp.card()?;
//! gp.auth()?;
//! gp.delete(&[0xA0, 0x00, 0x00, 0x00, 0x62, 0x03, 0x01, 0x0C, 0x01], true)?;
//! # Ok(())
//! # }
//! ```

pub mod application;
pub mod commands;
pub mod config;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod load;
pub mod secure_channel;
pub mod session;

// Re-exports
pub use application::GlobalPlatform;
pub use config::HarnessConfig;
pub use error::{
    AuthenticationFailure, CryptoInputError, CryptoInputKind, Error, ProtocolFailure, Result,
};
pub use load::LoadCommandStream;
pub use secure_channel::{ChannelOptions, ChannelState, IcvMode, SecureChannel, SecurityLevel};
pub use session::{SessionContext, SessionKeys, StaticKeys};

// Export main commands
pub use commands::{
    DeleteCommand, ExternalAuthenticateCommand, InitializeUpdateCommand, InitializeUpdateResponse,
    InstallCommand, LoadCommand, SelectCommand,
};
