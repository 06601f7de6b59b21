// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Station configuration view and the one writable builder in this crate:
//! [`OutgoingConfig`], which renders a pending configuration change back to
//! wire bytes and reports whether anything actually changed.
//!
//! Grounded on `kl.py`'s `StationConfig` (`BUFMAP`, `read`, `testConfigChanged`,
//! `setSensorText`, `setAlarmClockOffset`/`resetAlarmClockOffset`).

use crate::codec::{
    checksum, decode_chars_3_2, decode_humidity, decode_temperature, humidity_or_sentinel,
    reverse_byte_order, temperature_or_sentinel, TEMPERATURE_OFFSET,
};
use crate::model::SLOT_COUNT;

/// Alphabet accepted for user-supplied sensor description text. Index 0
/// (`!`) is reserved as the pad character; the original driver rejects any
/// user-supplied character that resolves to index 0 as "not found".
pub const CHARSTR: &str = "!1234567890ABCDEFGHIJKLMNOPQRSTUVWXYZ-+()o*,/\\ .";

const BUFMAP_TEMP_MAX: [usize; SLOT_COUNT] = [8, 11, 14, 17, 20, 23, 26, 29, 32];
const BUFMAP_TEMP_MIN: [usize; SLOT_COUNT] = [9, 12, 15, 18, 21, 24, 27, 30, 33];
const BUFMAP_HUM_MAX: [usize; SLOT_COUNT] = [35, 37, 39, 41, 43, 45, 47, 49, 51];
const BUFMAP_HUM_MIN: [usize; SLOT_COUNT] = [36, 38, 40, 42, 44, 46, 48, 50, 52];
const BUFMAP_DESCRIPTION: [usize; SLOT_COUNT - 1] = [58, 66, 74, 82, 90, 98, 106, 114];

/// History archive interval codes, matching the console's own enumeration.
pub const HI_01MIN: u8 = 0;
pub const HI_05MIN: u8 = 1;
pub const HI_10MIN: u8 = 2;
pub const HI_15MIN: u8 = 3;
pub const HI_01STD: u8 = 5;
pub const HI_02STD: u8 = 6;
pub const HI_03STD: u8 = 7;
pub const HI_06STD: u8 = 8;

/// Minutes per archive interval code, or `None` for a code the console
/// doesn't define.
pub fn history_interval_minutes(code: u8) -> Option<u32> {
    match code {
        HI_01MIN => Some(1),
        HI_05MIN => Some(5),
        HI_10MIN => Some(10),
        HI_15MIN => Some(15),
        HI_01STD => Some(60),
        HI_02STD => Some(120),
        HI_03STD => Some(180),
        HI_06STD => Some(360),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempHumidityLimits {
    pub temp_min: f32,
    pub temp_max: f32,
    pub humidity_min: f32,
    pub humidity_max: f32,
}

/// Station configuration as last read off the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct StationConfig {
    pub settings: u8,
    pub time_zone: i8,
    pub history_interval: u8,
    pub limits: [TempHumidityLimits; SLOT_COUNT],
    pub alarm_set: [u8; 5],
    pub reset_hi_lo: u8,
    pub descriptions: [[u8; 8]; SLOT_COUNT - 1],
    pub sensor_text: [String; SLOT_COUNT - 1],
    pub in_buf_cs: u16,
    pub out_buf_cs: u32,
}

impl StationConfig {
    /// LCD contrast, `0..=15` (`Settings` bits 4-7).
    pub fn contrast(&self) -> u8 {
        (self.settings >> 4) & 0xF
    }

    /// Whether the station's audible/visual alarm is enabled (`Settings`
    /// bit 3, active low).
    pub fn alert_enabled(&self) -> bool {
        self.settings & 0x8 == 0
    }

    /// Whether DCF77 radio clock reception is enabled (`Settings` bit 2).
    pub fn dcf_enabled(&self) -> bool {
        self.settings & 0x4 != 0
    }

    /// `true` for a 12-hour clock display, `false` for 24-hour (`Settings`
    /// bit 1).
    pub fn clock_12h(&self) -> bool {
        self.settings & 0x2 != 0
    }

    /// `true` for Fahrenheit, `false` for Celsius (`Settings` bit 0).
    pub fn temperature_fahrenheit(&self) -> bool {
        self.settings & 0x1 != 0
    }

    /// Decode a 125-byte config frame (`buf[3] & 0xF0 == 0x20`).
    pub fn decode(buf: &[u8]) -> Self {
        let settings = buf[5];
        let time_zone = buf[6] as i8;
        let history_interval = buf[7] & 0xF;

        let mut limits = [TempHumidityLimits {
            temp_min: 0.0,
            temp_max: 0.0,
            humidity_min: 0.0,
            humidity_max: 0.0,
        }; SLOT_COUNT];
        for slot in 0..SLOT_COUNT {
            limits[slot] = TempHumidityLimits {
                temp_max: temperature_or_sentinel(decode_temperature(buf, BUFMAP_TEMP_MAX[slot], true)),
                temp_min: temperature_or_sentinel(decode_temperature(buf, BUFMAP_TEMP_MIN[slot], false)),
                humidity_max: humidity_or_sentinel(decode_humidity(buf, BUFMAP_HUM_MAX[slot], true)),
                humidity_min: humidity_or_sentinel(decode_humidity(buf, BUFMAP_HUM_MIN[slot], true)),
            };
        }

        let mut alarm_set = [0u8; 5];
        alarm_set.copy_from_slice(&buf[53..58]);

        let mut descriptions = [[0u8; 8]; SLOT_COUNT - 1];
        let mut sensor_text: [String; SLOT_COUNT - 1] = Default::default();
        for x in 0..SLOT_COUNT - 1 {
            let off = BUFMAP_DESCRIPTION[x];
            descriptions[x].copy_from_slice(&buf[off..off + 8]);
            let txt = decode_chars_3_2(buf, off + 6, false)
                + &decode_chars_3_2(buf, off + 5, true)
                + &decode_chars_3_2(buf, off + 3, false)
                + &decode_chars_3_2(buf, off + 2, true)
                + &decode_chars_3_2(buf, off, false);
            sensor_text[x] = if txt == " E@@      " {
                "(No sensor)".to_string()
            } else {
                txt
            };
        }

        let reset_hi_lo = buf[122];
        let in_buf_cs = ((buf[123] as u16) << 8) | buf[124] as u16;
        let out_buf_cs = checksum(buf, 5, 122);

        StationConfig {
            settings,
            time_zone,
            history_interval,
            limits,
            alarm_set,
            reset_hi_lo,
            descriptions,
            sensor_text,
            in_buf_cs,
            out_buf_cs,
        }
    }
}

/// Parse an integer into a 2- or 3-nibble run, matching `StationConfig.parse_0`.
fn parse_int(mut num: u32, buf: &mut [u8], start: usize, start_on_hi: bool, numbytes: usize) {
    let mut nbuf = [0u8; 3];
    for i in (3 - numbytes)..3 {
        nbuf[i] = (num % 10) as u8;
        num /= 10;
    }
    if start_on_hi {
        buf[start] = nbuf[2] * 16 + nbuf[1];
        if numbytes > 2 {
            buf[start + 1] = nbuf[0] * 16 + (buf[start + 1] & 0x0F);
        }
    } else {
        buf[start] = (buf[start] & 0xF0) + nbuf[2];
        if numbytes > 2 {
            buf[start + 1] = nbuf[1] * 16 + nbuf[0];
        }
    }
}

fn parse_temp(value: f32, buf: &mut [u8], start: usize, start_on_hi: bool) {
    let num = ((value + TEMPERATURE_OFFSET) * 10.0).round() as u32;
    parse_int(num, buf, start, start_on_hi, 3);
}

fn parse_humidity(value: f32, buf: &mut [u8], start: usize, start_on_hi: bool) {
    parse_int(value.round() as u32, buf, start, start_on_hi, 2);
}

fn pad_right(s: &str, width: usize, fill: char) -> String {
    let mut out = s.to_string();
    while out.chars().count() < width {
        out.push(fill);
    }
    out
}

/// Pack 10 six-bit character codes into the 8-byte description blob.
fn pack_description(ids: &[i32; 10]) -> [u8; 8] {
    let id = |i: usize| ids[i];
    let mut txt = [0u8; 8];
    txt[7] = (((id(0) << 6) & 0xC0) + (id(1) & 0x30) + ((id(0) >> 2) & 0x0F)) as u8;
    txt[6] = (((id(2) << 2) & 0xF0) + (id(1) & 0x0F)) as u8;
    txt[5] = (((id(3) << 4) & 0xF0) + ((id(2) << 2) & 0x0C) + ((id(3) >> 4) & 0x03)) as u8;
    txt[4] = (((id(4) << 6) & 0xC0) + (id(5) & 0x30) + ((id(4) >> 2) & 0x0F)) as u8;
    txt[3] = (((id(6) << 2) & 0xF0) + (id(5) & 0x0F)) as u8;
    txt[2] = (((id(7) << 4) & 0xF0) + ((id(6) << 2) & 0x0C) + ((id(7) >> 4) & 0x03)) as u8;
    txt[1] = (((id(8) << 6) & 0xC0) + (id(9) & 0x30) + ((id(8) >> 2) & 0x0F)) as u8;
    txt[0] = (id(9) & 0x0F) as u8;
    txt
}

/// A pending configuration write, built from a last-read [`StationConfig`]
/// and mutated in place before rendering to wire bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingConfig {
    pub settings: u8,
    pub time_zone: i8,
    pub history_interval: u8,
    pub limits: [TempHumidityLimits; SLOT_COUNT],
    pub alarm_set: [u8; 5],
    pub reset_hi_lo: u8,
    pub descriptions: [[u8; 8]; SLOT_COUNT - 1],
    /// Whether each remote slot (1..=8) is populated; mirrors the
    /// `"(No sensor)"` marker decoded from the console. A non-present slot's
    /// description may not be overwritten by [`Self::set_sensor_text`].
    sensor_present: [bool; SLOT_COUNT - 1],
    in_buf_cs: u16,
}

impl OutgoingConfig {
    pub fn from_station(cfg: &StationConfig) -> Self {
        let mut sensor_present = [true; SLOT_COUNT - 1];
        for x in 0..SLOT_COUNT - 1 {
            sensor_present[x] = cfg.sensor_text[x] != "(No sensor)";
        }
        OutgoingConfig {
            settings: cfg.settings,
            time_zone: cfg.time_zone,
            history_interval: cfg.history_interval,
            limits: cfg.limits,
            alarm_set: cfg.alarm_set,
            reset_hi_lo: cfg.reset_hi_lo,
            descriptions: cfg.descriptions,
            sensor_present,
            in_buf_cs: cfg.in_buf_cs,
        }
    }

    /// Raise the console's humidity-low alarm on slot 0 as a side channel
    /// for "our clock and the console's clock have drifted too far apart".
    pub fn raise_clock_alarm(&mut self) {
        self.limits[0].humidity_min = 99.0;
        self.alarm_set[4] = (self.alarm_set[4] & 0xFD) | 0x2;
    }

    /// Undo [`Self::raise_clock_alarm`] once the clocks are back in sync.
    pub fn clear_clock_alarm(&mut self) {
        self.limits[0].humidity_min = 20.0;
        self.alarm_set[4] &= 0xFD;
    }

    /// Set the description text for sensor `slot` (1..=8). Rejects text
    /// longer than 10 characters or containing a character outside
    /// [`CHARSTR`] (excluding the reserved pad character at index 0).
    pub fn set_sensor_text(&mut self, slot: usize, text: &str) -> Result<(), String> {
        if !(1..=8).contains(&slot) {
            return Err(format!("sensor slot {slot} out of range"));
        }
        if !self.sensor_present[slot - 1] {
            return Err(format!("sensor_text{slot}: \"{text}\" not allowed for non present sensor"));
        }
        if text.chars().count() > 10 {
            return Err(format!("sensor_text{slot}: \"{text}\" has more than 10 characters"));
        }
        for ch in text.chars() {
            match CHARSTR.find(ch) {
                Some(0) | None => {
                    return Err(format!(
                        "sensor_text{slot}: \"{text}\" contains not-allowed character {ch}"
                    ))
                }
                Some(_) => {}
            }
        }
        let padded = pad_right(text, 10, '!');
        let mut ids = [0i32; 10];
        for (i, ch) in padded.chars().enumerate() {
            ids[i] = CHARSTR.find(ch).map(|i| i as i32).unwrap_or(0);
        }
        self.descriptions[slot - 1] = pack_description(&ids);
        Ok(())
    }

    /// Render to the 125-byte outgoing config buffer and report whether the
    /// recomputed checksum differs from the last-seen `InBufCS` (i.e.
    /// whether the console needs a SetConfig at all).
    pub fn render(&mut self) -> ([u8; 125], bool) {
        if self.history_interval > HI_05MIN {
            self.history_interval = HI_05MIN;
        }
        let mut buf = [0u8; 125];
        buf[5] = self.settings;
        buf[6] = self.time_zone as u8;
        buf[7] = self.history_interval;

        for slot in 0..SLOT_COUNT {
            parse_temp(self.limits[slot].temp_max, &mut buf, BUFMAP_TEMP_MAX[slot], true);
            parse_temp(self.limits[slot].temp_min, &mut buf, BUFMAP_TEMP_MIN[slot], false);
            reverse_byte_order(&mut buf, BUFMAP_TEMP_MAX[slot], 3);

            parse_humidity(self.limits[slot].humidity_max, &mut buf, BUFMAP_HUM_MAX[slot], true);
            parse_humidity(self.limits[slot].humidity_min, &mut buf, BUFMAP_HUM_MIN[slot], true);
            reverse_byte_order(&mut buf, BUFMAP_HUM_MAX[slot], 2);
        }

        for (y, &b) in self.alarm_set.iter().rev().enumerate() {
            buf[53 + y] = b;
        }

        for x in 0..SLOT_COUNT - 1 {
            let off = BUFMAP_DESCRIPTION[x];
            for (y, &b) in self.descriptions[x].iter().rev().enumerate() {
                buf[off + y] = b;
            }
        }

        buf[122] = self.reset_hi_lo;
        let out_buf_cs = checksum(&buf, 5, 122);
        buf[123] = (out_buf_cs >> 8) as u8;
        buf[124] = out_buf_cs as u8;

        let changed = out_buf_cs as u16 != self.in_buf_cs;
        (buf, changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_limits() -> [TempHumidityLimits; SLOT_COUNT] {
        [TempHumidityLimits {
            temp_min: -10.0,
            temp_max: 40.0,
            humidity_min: 20.0,
            humidity_max: 80.0,
        }; SLOT_COUNT]
    }

    fn sample_outgoing() -> OutgoingConfig {
        OutgoingConfig {
            settings: 0x12,
            time_zone: 0,
            history_interval: HI_15MIN,
            limits: blank_limits(),
            alarm_set: [0; 5],
            reset_hi_lo: 0,
            descriptions: [[0; 8]; SLOT_COUNT - 1],
            sensor_present: [true; SLOT_COUNT - 1],
            in_buf_cs: 0,
        }
    }

    #[test]
    fn history_interval_clamps_to_5_minutes() {
        let mut cfg = sample_outgoing();
        let (buf, _) = cfg.render();
        assert_eq!(buf[7], HI_05MIN);
        assert_eq!(cfg.history_interval, HI_05MIN);
    }

    #[test]
    fn render_changed_matches_checksum_mismatch() {
        let mut cfg = sample_outgoing();
        cfg.in_buf_cs = 1;
        let (_, changed) = cfg.render();
        assert!(changed);
    }

    #[test]
    fn render_unchanged_when_checksum_matches() {
        let mut cfg = sample_outgoing();
        let (buf, _) = cfg.render();
        let recomputed_cs = ((buf[123] as u16) << 8) | buf[124] as u16;
        cfg.in_buf_cs = recomputed_cs;
        let (_, changed) = cfg.render();
        assert!(!changed);
    }

    #[test]
    fn clock_alarm_raises_and_clears_humidity0_low() {
        let mut cfg = sample_outgoing();
        cfg.raise_clock_alarm();
        assert_eq!(cfg.limits[0].humidity_min, 99.0);
        assert_eq!(cfg.alarm_set[4] & 0x2, 0x2);
        cfg.clear_clock_alarm();
        assert_eq!(cfg.limits[0].humidity_min, 20.0);
        assert_eq!(cfg.alarm_set[4] & 0x2, 0);
    }

    #[test]
    fn sensor_text_rejects_too_long() {
        let mut cfg = sample_outgoing();
        assert!(cfg.set_sensor_text(1, "01234567890").is_err());
    }

    #[test]
    fn sensor_text_rejects_bad_character() {
        let mut cfg = sample_outgoing();
        assert!(cfg.set_sensor_text(1, "abc").is_err());
    }

    #[test]
    fn sensor_text_accepts_valid_text() {
        let mut cfg = sample_outgoing();
        assert!(cfg.set_sensor_text(3, "GARAGE").is_ok());
        assert_ne!(cfg.descriptions[2], [0u8; 8]);
    }

    #[test]
    fn settings_byte_decodes_all_five_fields() {
        let mut buf = vec![0u8; 125];
        // contrast=4, alert ON (bit clear), DCF ON, 12h clock, Fahrenheit.
        buf[5] = 0b0100_0111;
        let cfg = StationConfig::decode(&buf);
        assert_eq!(cfg.contrast(), 4);
        assert!(cfg.alert_enabled());
        assert!(cfg.dcf_enabled());
        assert!(cfg.clock_12h());
        assert!(cfg.temperature_fahrenheit());
    }

    #[test]
    fn settings_byte_all_zero_means_alert_off_24h_celsius() {
        let buf = vec![0u8; 125];
        let cfg = StationConfig::decode(&buf);
        assert_eq!(cfg.contrast(), 0);
        assert!(!cfg.alert_enabled());
        assert!(!cfg.dcf_enabled());
        assert!(!cfg.clock_12h());
        assert!(!cfg.temperature_fahrenheit());
    }

    #[test]
    fn history_interval_minutes_table() {
        assert_eq!(history_interval_minutes(HI_01MIN), Some(1));
        assert_eq!(history_interval_minutes(HI_06STD), Some(360));
        assert_eq!(history_interval_minutes(4), None);
    }
}
