// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # klimalogg-rf
//!
//! Host-side RF driver for klimalogg-family wireless weather-station
//! consoles: a USB transceiver dongle paired to a console, which in turn
//! polls up to eight remote sensors over the air.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use klimalogg_rf::facade::KlimaLoggDriver;
//! use klimalogg_rf::settings::DriverConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DriverConfig::from_toml_str("comm_interval = 8\n")?;
//! let mut driver = KlimaLoggDriver::start(config)?;
//! while !driver.is_paired() {
//!     std::thread::sleep(std::time::Duration::from_secs(1));
//! }
//! if let Some(current) = driver.get_current_data() {
//!     println!("{:?}", current);
//! }
//! driver.stop();
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +-------------------------------------------------------------+
//! |                     facade (consumer API)                   |
//! |   KlimaLoggDriver: snapshot accessors + RF worker lifecycle  |
//! +-------------------------------------------------------------+
//! |                           engine                              |
//! |   Engine::handle_frame: decode -> update state -> encode     |
//! +-----------------------+-----------------+---------------------+
//! |    history_cursor      |      model      |         rf          |
//! |  backfill sizing/      |  codec views:   |  AX5051 register    |
//! |  windowing/filtering   |  config/current/ |  table + PLL math  |
//! |                         |  history         |                    |
//! +-----------------------+-----------------+---------------------+
//! |                             usb                                |
//! |         Transport trait: rusb_transport (real) / mock          |
//! +-------------------------------------------------------------+
//! ```
//!
//! ## Key types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`facade::KlimaLoggDriver`] | Owns the RF worker thread; the public entry point |
//! | [`engine::Engine`] | Synchronous frame-in/outcome-out state machine |
//! | [`settings::DriverConfig`] | TOML-deserializable host configuration |
//! | [`usb::Transport`] | USB control-transfer abstraction |
//! | [`error::DriverError`] | Everything that can go wrong |

pub mod codec;
pub mod engine;
pub mod error;
pub mod facade;
pub mod history_cursor;
pub mod model;
pub mod rf;
pub mod settings;
pub mod usb;

pub use engine::{Engine, HandlerOutcome};
pub use error::{DriverError, DriverResult};
pub use facade::KlimaLoggDriver;
pub use settings::DriverConfig;
