// SPDX-License-Identifier: Apache-2.0 OR MIT

//! USB transport abstraction.
//!
//! The dongle speaks a small set of USB class control transfers — no bulk
//! or interrupt endpoints are involved. [`Transport`] models exactly the
//! operations the RF exchange engine needs; [`rusb_transport::RusbTransport`]
//! is the production implementation and [`mock::MockTransport`] replays
//! scripted frame sequences for engine tests.
//!
//! Grounded on `kl.py`'s `Transceiver` class for the operation set and wire
//! values; the trait/impl split and crate choice follow
//! `examples/other_examples/.../malesch-arexx-tap/src/arexx.rs`'s `UsbDevice`.

pub mod mock;
pub mod rusb_transport;

use crate::error::DriverResult;

/// One control-transfer round trip with the RF transceiver dongle.
///
/// All operations are synchronous with a fixed timeout; failures surface as
/// [`crate::error::DriverError::Transport`] and are retried, if at all, by
/// the caller.
pub trait Transport: Send {
    /// Open the first matching device, optionally narrowed by a serial
    /// number read from config flash.
    fn open(&mut self, vid: u16, pid: u16, serial: Option<&str>) -> DriverResult<()>;

    /// Release the USB interface. Idempotent.
    fn close(&mut self);

    /// Poll the dongle's current radio state. Returns the two state bytes.
    fn get_state(&mut self) -> DriverResult<[u8; 2]>;

    /// Read back the last frame the dongle received over the air.
    fn get_frame(&mut self) -> DriverResult<(usize, Vec<u8>)>;

    /// Hand the dongle a frame to transmit.
    fn set_frame(&mut self, data: &[u8]) -> DriverResult<()>;

    /// Switch the radio to receive mode.
    fn set_rx(&mut self) -> DriverResult<()>;

    /// Switch the radio to transmit mode.
    fn set_tx(&mut self) -> DriverResult<()>;

    /// Set the dongle's internal state machine byte.
    fn set_state(&mut self, state: u8) -> DriverResult<()>;

    /// Read `nbytes` from the dongle's config flash starting at `addr`, in
    /// chunks of at most 16 bytes.
    fn read_config_flash(&mut self, addr: u16, nbytes: usize) -> DriverResult<Vec<u8>>;

    /// Write one AX5051-style radio register.
    fn write_reg(&mut self, reg_addr: u8, data: u8) -> DriverResult<()>;

    /// Issue a one-byte dongle command (used by the RF register programmer).
    fn execute(&mut self, command: u8) -> DriverResult<()>;

    /// Set the preamble detection pattern.
    fn set_preamble(&mut self, pattern: u8) -> DriverResult<()>;
}
