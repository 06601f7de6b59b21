// SPDX-License-Identifier: Apache-2.0 OR MIT

//! One-shot AX5051 radio configuration: register table plus the PLL
//! frequency calculation (base frequency + per-unit correction read from
//! config flash).
//!
//! Grounded on `kl.py`'s `AX5051RegisterNames` and
//! `CommunicationService.configureRegisterNames`/`initTransceiver`.

use std::collections::BTreeMap;

use crate::error::DriverResult;
use crate::usb::Transport;

/// AX5051 register addresses used during setup.
pub mod reg {
    pub const IFMODE: u8 = 0x08;
    pub const MODULATION: u8 = 0x10;
    pub const ENCODING: u8 = 0x11;
    pub const FRAMING: u8 = 0x12;
    pub const CRCINIT3: u8 = 0x14;
    pub const CRCINIT2: u8 = 0x15;
    pub const CRCINIT1: u8 = 0x16;
    pub const CRCINIT0: u8 = 0x17;
    pub const FREQ3: u8 = 0x20;
    pub const FREQ2: u8 = 0x21;
    pub const FREQ1: u8 = 0x22;
    pub const FREQ0: u8 = 0x23;
    pub const PLLLOOP: u8 = 0x2C;
    pub const PLLRANGING: u8 = 0x2D;
    pub const PLLRNGCLK: u8 = 0x2E;
    pub const TXRATEHI: u8 = 0x31;
    pub const TXRATEMID: u8 = 0x32;
    pub const TXRATELO: u8 = 0x33;
    pub const MODMISC: u8 = 0x34;
    pub const ADCMISC: u8 = 0x38;
    pub const AGCTARGET: u8 = 0x39;
    pub const AGCATTACK: u8 = 0x3A;
    pub const AGCDECAY: u8 = 0x3B;
    pub const CICDEC: u8 = 0x3F;
    pub const DATARATEHI: u8 = 0x40;
    pub const DATARATELO: u8 = 0x41;
    pub const SPAREOUT: u8 = 0x60;
    pub const TESTOBS: u8 = 0x68;
    pub const APEOVER: u8 = 0x70;
    pub const TMMUX: u8 = 0x71;
    pub const PLLVCOI: u8 = 0x72;
    pub const PLLCPEN: u8 = 0x73;
    pub const RFMISC: u8 = 0x7A;
    pub const TXDRIVER: u8 = 0x7B;
    pub const REF: u8 = 0x7C;
}

/// Which ISM band the console/sensors operate in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrequencyStandard {
    Eu,
    Us,
}

impl FrequencyStandard {
    fn base_hz(self) -> u32 {
        match self {
            FrequencyStandard::Eu => 868_300_000,
            FrequencyStandard::Us => 905_000_000,
        }
    }
}

/// Identity read back from the dongle's config flash during setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransceiverIdentity {
    pub device_id: u16,
    pub serial: String,
}

/// Build the static part of the AX5051 register table (everything but the
/// four frequency registers, which depend on the band and the per-unit
/// correction value).
fn static_registers() -> BTreeMap<u8, u8> {
    let mut r = BTreeMap::new();
    r.insert(reg::IFMODE, 0x00);
    r.insert(reg::MODULATION, 0x41);
    r.insert(reg::ENCODING, 0x07);
    r.insert(reg::FRAMING, 0x84);
    r.insert(reg::CRCINIT3, 0xff);
    r.insert(reg::CRCINIT2, 0xff);
    r.insert(reg::CRCINIT1, 0xff);
    r.insert(reg::CRCINIT0, 0xff);
    r.insert(reg::PLLLOOP, 0x1d);
    r.insert(reg::PLLRANGING, 0x08);
    r.insert(reg::PLLRNGCLK, 0x03);
    r.insert(reg::MODMISC, 0x03);
    r.insert(reg::SPAREOUT, 0x00);
    r.insert(reg::TESTOBS, 0x00);
    r.insert(reg::APEOVER, 0x00);
    r.insert(reg::TMMUX, 0x00);
    r.insert(reg::PLLVCOI, 0x01);
    r.insert(reg::PLLCPEN, 0x01);
    r.insert(reg::RFMISC, 0xb0);
    r.insert(reg::REF, 0x23);
    r.insert(reg::ADCMISC, 0x01);
    r.insert(reg::AGCTARGET, 0x0e);
    r.insert(reg::AGCATTACK, 0x11);
    r.insert(reg::AGCDECAY, 0x0e);
    r.insert(reg::CICDEC, 0x3f);
    r.insert(reg::DATARATEHI, 0x19);
    r.insert(reg::DATARATELO, 0x66);
    r.insert(reg::TXRATEHI, 0x00);
    r.insert(reg::TXRATEMID, 0x51);
    r.insert(reg::TXRATELO, 0xec);
    r.insert(reg::TXDRIVER, 0x88);
    r
}

/// PLL frequency word for a 16 MHz reference clock: base frequency plus a
/// per-unit correction, nudged odd if the sum happens to land on an even
/// value (observed AX5051 quirk, reproduced from the original driver
/// without further explanation there either).
pub fn pll_frequency_word(standard: FrequencyStandard, correction: u32) -> u32 {
    let base = standard.base_hz() as f64;
    let mut freq_val = ((base / 16_000_000.0) * 16_777_216.0) as u32;
    freq_val = freq_val.wrapping_add(correction);
    if freq_val % 2 == 0 {
        freq_val = freq_val.wrapping_add(1);
    }
    freq_val
}

fn correction_from_flash(bytes: &[u8]) -> u32 {
    let mut val: u32 = 0;
    for &b in &bytes[0..4] {
        val = (val << 8) | b as u32;
    }
    val
}

/// Program the AX5051 over `transport`: read the per-unit frequency
/// correction and identity from config flash, compute the PLL word, and
/// write the full register table.
pub fn initialize(transport: &mut dyn Transport, standard: FrequencyStandard) -> DriverResult<TransceiverIdentity> {
    let mut registers = static_registers();

    let correction_bytes = transport.read_config_flash(0x1F5, 4)?;
    let correction = correction_from_flash(&correction_bytes);
    let freq_val = pll_frequency_word(standard, correction);
    registers.insert(reg::FREQ3, ((freq_val >> 24) & 0xFF) as u8);
    registers.insert(reg::FREQ2, ((freq_val >> 16) & 0xFF) as u8);
    registers.insert(reg::FREQ1, ((freq_val >> 8) & 0xFF) as u8);
    registers.insert(reg::FREQ0, (freq_val & 0xFF) as u8);

    let id_buf = transport.read_config_flash(0x1F9, 7)?;
    let device_id = ((id_buf[5] as u16) << 8) | id_buf[6] as u16;
    let serial = id_buf.iter().take(7).map(|b| format!("{b:02}")).collect();

    for (&addr, &val) in registers.iter() {
        transport.write_reg(addr, val)?;
    }

    Ok(TransceiverIdentity { device_id, serial })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usb::mock::MockTransport;

    #[test]
    fn frequency_word_is_forced_odd() {
        let word = pll_frequency_word(FrequencyStandard::Eu, 0);
        assert_eq!(word % 2, 1);
    }

    #[test]
    fn eu_base_frequency_matches_known_value() {
        // 868300000 / 16e6 * 16777216 truncates to 910478540 (even) -> +1
        let word = pll_frequency_word(FrequencyStandard::Eu, 0);
        assert_eq!(word, 910_478_541);
    }

    #[test]
    fn initialize_writes_every_static_register_plus_frequency() {
        let mut t = MockTransport::new();
        t.set_flash(0x1F5, &[0, 0, 0, 0]);
        t.set_flash(0x1F9, &[1, 2, 3, 4, 5, 0x12, 0x34]);
        let id = initialize(&mut t, FrequencyStandard::Eu).unwrap();
        assert_eq!(id.device_id, 0x1234);
        assert!(t.reg_writes.iter().any(|&(addr, _)| addr == reg::FREQ3));
        assert_eq!(t.reg_writes.len(), static_registers().len());
    }
}
