//! PC/SC transport implementation for APDU operations
//!
//! This crate provides an implementation of the `CardTransport` trait from
//! `cardcheck-apdu-core` using the PC/SC API for communication with smart
//! cards.
//!
//! # Examples
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use cardcheck_apdu_core::{Expectation, TransportSession};
//! use cardcheck_apdu_pcsc::{ConnectStrategy, PcscConfig, PcscDeviceManager};
//!
//! let manager = PcscDeviceManager::new()?;
//! for reader in manager.list_readers()? {
//!     println!("{reader}");
//! }
//!
//! let transport = manager.connect(ConnectStrategy::AnyCard, PcscConfig::default())?;
//! let mut session = TransportSession::new(transport);
//! let response = session.send(
//!     &[0x00, 0xA4, 0x04, 0x00, 0x08, 0xA0, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00],
//!     &Expectation::success().name("SELECT"),
//! )?;
//! println!("FCI: {}", response.data_hex());
//! # Ok(())
//! # }
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![warn(missing_docs)]

mod config;
mod error;
mod manager;
mod reader;
mod transport;

pub use config::{ConnectStrategy, PcscConfig, ShareMode};
pub use error::PcscError;
pub use manager::PcscDeviceManager;
pub use reader::PcscReader;
pub use transport::PcscTransport;

// Re-export some pcsc types for convenience
pub use pcsc::{Protocol, Protocols};
