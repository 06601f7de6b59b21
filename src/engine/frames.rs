// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Outbound frame builders.
//!
//! Grounded on `kl.py`'s `buildACKFrame`/`buildFirstConfigFrame`/
//! `buildConfigFrame`/`buildTimeFrame`. Byte layouts are reproduced
//! verbatim, including the two "meaning unknown" bytes the original leaves
//! undocumented.

use chrono::{Datelike, Timelike};

use crate::model::{index_to_addr, MAX_RECORDS};

/// Request actions, encoded in the low nibble of byte 3 of an ACK frame.
pub mod action {
    pub const GET_HISTORY: u8 = 0x00;
    pub const REQ_SET_TIME: u8 = 0x01;
    pub const REQ_SET_CONFIG: u8 = 0x02;
    pub const GET_CONFIG: u8 = 0x03;
    pub const GET_CURRENT: u8 = 0x04;
    pub const SEND_CONFIG: u8 = 0x20;
    pub const SEND_TIME: u8 = 0x60;
}

/// Response type, the high nibble of byte 3 of an inbound frame.
pub mod response {
    pub const DATA_WRITTEN: u8 = 0x10;
    pub const GET_CONFIG: u8 = 0x20;
    pub const GET_CURRENT: u8 = 0x30;
    pub const GET_HISTORY: u8 = 0x40;
    pub const REQUEST: u8 = 0x50;
}

/// The sub-kind of a `0x50`-class "what do you want next" frame, read from
/// byte 3 in full (not just the high nibble).
pub mod request_kind {
    pub const READ_HISTORY: u8 = 0x50;
    pub const FIRST_CONFIG: u8 = 0x51;
    pub const SET_CONFIG: u8 = 0x52;
    pub const SET_TIME: u8 = 0x53;
}

/// Placeholder logger-channel byte; the original always sends `0`.
const LOGGER_1: u8 = 0;

/// DeviceID the console uses before it's paired to a transceiver.
pub const WILDCARD_DEVICE_ID: u16 = 0xF0F0;

fn haddr_for(hidx: Option<u32>) -> u32 {
    match hidx {
        Some(idx) if idx < MAX_RECORDS => index_to_addr(idx),
        _ => 0x00FF_FFFF,
    }
}

/// Build an 11-byte ACK. `dev_hi`/`dev_lo` are copied verbatim from the
/// incoming frame's DeviceID bytes (not necessarily our own ID — during
/// pairing they're still the wildcard). `cs` is the checksum field; its
/// meaning depends on the handler (station checksum, or the transceiver's
/// own DeviceID during the pairing reply).
pub fn build_ack(dev_hi: u8, dev_lo: u8, action: u8, cs: u16, hidx: Option<u32>, comm_interval: u8) -> [u8; 11] {
    let haddr = haddr_for(hidx);
    [
        dev_hi,
        dev_lo,
        LOGGER_1,
        action & 0xF,
        (cs >> 8) as u8,
        cs as u8,
        0x80, // meaning unknown, reproduced verbatim
        comm_interval,
        (haddr >> 16) as u8,
        (haddr >> 8) as u8,
        haddr as u8,
    ]
}

/// First-time GetConfig request sent while still addressed to the wildcard
/// DeviceID, history address pinned to `0x010700` (index 1).
pub fn build_first_config_frame(comm_interval: u8) -> [u8; 11] {
    let history_address: u32 = 0x0107_00;
    [
        0xF0,
        0xF0,
        0xFF,
        action::GET_CONFIG,
        0xFF,
        0xFF,
        0x80,
        comm_interval,
        (history_address >> 16) as u8,
        (history_address >> 8) as u8,
        history_address as u8,
    ]
}

/// SetConfig frame: header bytes copied from the incoming frame, payload
/// bytes `[5..125)` from the freshly rendered outgoing config buffer.
pub fn build_set_config_frame(dev_hi: u8, dev_lo: u8, cfg_fifth_byte: u8, cfgbuf: &[u8; 125]) -> [u8; 125] {
    let mut buf = [0u8; 125];
    buf[0] = dev_hi;
    buf[1] = dev_lo;
    buf[2] = LOGGER_1;
    buf[3] = action::SEND_CONFIG;
    buf[4] = cfg_fifth_byte;
    buf[5..125].copy_from_slice(&cfgbuf[5..125]);
    buf
}

/// SetTime frame: BCD-per-nibble wall-clock encoding, `DayOfWeek` 1=Monday
/// .. 7=Sunday.
pub fn build_set_time_frame(dev_hi: u8, dev_lo: u8, cs: u16, now: chrono::DateTime<chrono::Local>) -> [u8; 13] {
    let sec = now.second() as u8;
    let min = now.minute() as u8;
    let hour = now.hour() as u8;
    let day = now.day() as u8;
    let month = now.month() as u8;
    let year = now.year();
    let day_of_week = now.weekday().number_from_monday() as u8; // 1..7

    let bcd = |v: u8| -> u8 { (v % 10) + 0x10 * (v / 10) };

    [
        dev_hi,
        dev_lo,
        LOGGER_1,
        action::SEND_TIME,
        (cs >> 8) as u8,
        cs as u8,
        bcd(sec),
        bcd(min),
        bcd(hour),
        (day_of_week % 10) + 0x10 * (day % 10),
        (day / 10) + 0x10 * (month % 10),
        (month / 10) + 0x10 * (((year - 2000) as u8) % 10),
        ((year - 2000) as u8) / 10,
    ]
}
