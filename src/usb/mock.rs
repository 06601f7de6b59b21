// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scripted [`Transport`] double for engine and history-cursor tests.
//!
//! Queue replies with `push_state`/`push_frame` in the order the engine is
//! expected to poll for them; outgoing frames and side-effecting calls are
//! recorded for assertions.

use std::collections::VecDeque;

use crate::error::{DriverError, DriverResult};

use super::Transport;

#[derive(Debug, Default)]
pub struct MockTransport {
    opened: bool,
    states: VecDeque<[u8; 2]>,
    frames: VecDeque<(usize, Vec<u8>)>,
    flash: Vec<u8>,
    pub sent_frames: Vec<Vec<u8>>,
    pub tx_count: usize,
    pub rx_count: usize,
    pub reg_writes: Vec<(u8, u8)>,
    pub executed: Vec<u8>,
    pub preamble: Option<u8>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_state(&mut self, bytes: [u8; 2]) -> &mut Self {
        self.states.push_back(bytes);
        self
    }

    /// Queue a reply for the next `get_frame` call. `data` is the real
    /// on-wire payload; it's padded out to the fixed 0x131-byte buffer size
    /// `RusbTransport::get_frame` always returns, so tests exercise the same
    /// "real length travels separately from buffer length" contract
    /// production code does.
    pub fn push_frame(&mut self, data: Vec<u8>) -> &mut Self {
        let len = data.len();
        let mut buf = vec![0u8; 0x131];
        let copy_len = len.min(0x131);
        buf[..copy_len].copy_from_slice(&data[..copy_len]);
        self.frames.push_back((len, buf));
        self
    }

    /// Preload config-flash content returned by `read_config_flash`.
    pub fn set_flash(&mut self, addr: u16, bytes: &[u8]) {
        let end = addr as usize + bytes.len();
        if self.flash.len() < end {
            self.flash.resize(end, 0);
        }
        self.flash[addr as usize..end].copy_from_slice(bytes);
    }

    pub fn is_open(&self) -> bool {
        self.opened
    }
}

impl Transport for MockTransport {
    fn open(&mut self, _vid: u16, _pid: u16, _serial: Option<&str>) -> DriverResult<()> {
        self.opened = true;
        Ok(())
    }

    fn close(&mut self) {
        self.opened = false;
    }

    fn get_state(&mut self) -> DriverResult<[u8; 2]> {
        self.states
            .pop_front()
            .ok_or_else(|| DriverError::BadResponse("mock get_state exhausted".into()))
    }

    fn get_frame(&mut self) -> DriverResult<(usize, Vec<u8>)> {
        self.frames
            .pop_front()
            .ok_or_else(|| DriverError::BadResponse("mock get_frame exhausted".into()))
    }

    fn set_frame(&mut self, data: &[u8]) -> DriverResult<()> {
        self.sent_frames.push(data.to_vec());
        Ok(())
    }

    fn set_rx(&mut self) -> DriverResult<()> {
        self.rx_count += 1;
        Ok(())
    }

    fn set_tx(&mut self) -> DriverResult<()> {
        self.tx_count += 1;
        Ok(())
    }

    fn set_state(&mut self, _state: u8) -> DriverResult<()> {
        Ok(())
    }

    fn read_config_flash(&mut self, addr: u16, nbytes: usize) -> DriverResult<Vec<u8>> {
        let start = addr as usize;
        let end = start + nbytes;
        if self.flash.len() < end {
            self.flash.resize(end, 0);
        }
        Ok(self.flash[start..end].to_vec())
    }

    fn write_reg(&mut self, reg_addr: u8, data: u8) -> DriverResult<()> {
        self.reg_writes.push((reg_addr, data));
        Ok(())
    }

    fn execute(&mut self, command: u8) -> DriverResult<()> {
        self.executed.push(command);
        Ok(())
    }

    fn set_preamble(&mut self, pattern: u8) -> DriverResult<()> {
        self.preamble = Some(pattern);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_scripted_states_in_order() {
        let mut t = MockTransport::new();
        t.push_state([0x00, 0x16]).push_state([0x00, 0x60]);
        assert_eq!(t.get_state().unwrap(), [0x00, 0x16]);
        assert_eq!(t.get_state().unwrap(), [0x00, 0x60]);
        assert!(t.get_state().is_err());
    }

    #[test]
    fn records_outgoing_frames() {
        let mut t = MockTransport::new();
        t.set_frame(&[1, 2, 3]).unwrap();
        assert_eq!(t.sent_frames, vec![vec![1, 2, 3]]);
    }

    #[test]
    fn read_config_flash_returns_preloaded_bytes() {
        let mut t = MockTransport::new();
        t.set_flash(0x1F9, &[1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(t.read_config_flash(0x1F9, 7).unwrap(), vec![1, 2, 3, 4, 5, 6, 7]);
    }
}
