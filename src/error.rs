// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types for the RF exchange engine and its collaborators.

use thiserror::Error;

/// Everything that can go wrong talking to the transceiver or decoding what
/// it sends back.
///
/// `DataWritten` from the wire protocol is deliberately *not* a variant here
/// — it is a control-flow signal (a SetTime/SetConfig acknowledgement), not
/// a failure, and is represented by [`crate::engine::HandlerOutcome`] instead.
#[derive(Debug, Error)]
pub enum DriverError {
    /// A USB control transfer failed.
    #[error("transport error: {0}")]
    Transport(#[from] rusb::Error),

    /// A response frame had an unexpected length for its response type.
    #[error("unexpected response: {0}")]
    BadResponse(String),

    /// The frame's DeviceID is neither ours nor the pairing wildcard.
    #[error("foreign device id {0:#06x}")]
    UnknownDeviceId(u16),

    /// No transceiver matching the requested vendor/product/serial was found.
    #[error("no matching USB device found")]
    DeviceNotFound,
}

pub type DriverResult<T> = Result<T, DriverError>;

/// A decoded field was a sentinel (NP / OFL) rather than a real value.
///
/// Not an error in the `std::error::Error` sense — surfaced to the consumer
/// as `None` so it can tell "missing" apart from "zero". Kept distinct from
/// [`DriverError`] so call sites can't accidentally propagate it with `?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeSentinel {
    NotPresent,
    OutOfFactoryLimits,
}
