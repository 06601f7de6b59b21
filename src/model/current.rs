// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Current-observation view: slot 0 (base) plus slots 1-8 (remotes), each
//! with a current/min/max temperature and humidity pair plus signal
//! quality and per-sensor alarm bits.
//!
//! Grounded on `kl.py`'s `CurrentData.BUFMAP`/`read`.

use crate::codec::{
    decode_humidity, decode_temperature, decode_timestamp_8, humidity_or_sentinel,
    temperature_or_sentinel, Timestamp,
};
use crate::model::SLOT_COUNT;

/// Per-slot offsets into a 229-byte current-weather frame:
/// `(temp_max, temp_min, temp_cur, temp_max_dt, temp_min_dt,
///   hum_max, hum_min, hum_cur, hum_max_dt, hum_min_dt)`.
const BUFMAP: [(usize, usize, usize, usize, usize, usize, usize, usize, usize, usize); SLOT_COUNT] = [
    (26, 28, 29, 18, 22, 15, 16, 17, 7, 11),
    (50, 52, 53, 42, 46, 39, 40, 41, 31, 35),
    (74, 76, 77, 66, 70, 63, 64, 65, 55, 59),
    (98, 100, 101, 90, 94, 87, 88, 89, 79, 83),
    (122, 124, 125, 114, 118, 111, 112, 113, 103, 107),
    (146, 148, 149, 138, 142, 135, 136, 137, 127, 131),
    (170, 172, 173, 162, 166, 159, 160, 161, 151, 155),
    (194, 196, 197, 186, 190, 183, 184, 185, 175, 179),
    (218, 220, 221, 210, 214, 207, 208, 209, 199, 203),
];

/// One slot's current/min/max temperature or humidity triple plus the
/// timestamps of the min/max extremes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extremes {
    pub current: f32,
    pub min: f32,
    pub min_at: Option<i64>,
    pub max: f32,
    pub max_at: Option<i64>,
}

/// Decoded current-weather snapshot for all nine slots.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentObservation {
    /// Host wall-clock time the frame was received (not a field of the wire
    /// frame itself).
    pub received_at: i64,
    pub signal_quality: u8,
    pub temperature: [Extremes; SLOT_COUNT],
    pub humidity: [Extremes; SLOT_COUNT],
    /// 12-byte alarm bitfield, `buf[223..235]`. Low half (bytes 0-1) carries
    /// per-sensor TX-battery-low and threshold-trip flags.
    pub alarm_data: [u8; 12],
}

impl CurrentObservation {
    /// Decode a 229-byte current-weather frame (`buf[3] & 0xF0 == 0x30`).
    pub fn decode(buf: &[u8], received_at: i64) -> Self {
        let signal_quality = buf[4] & 0x7F;
        let mut temperature = [Extremes {
            current: 0.0,
            min: 0.0,
            min_at: None,
            max: 0.0,
            max_at: None,
        }; SLOT_COUNT];
        let mut humidity = temperature;

        for (slot, map) in BUFMAP.iter().enumerate() {
            let (tmax_o, tmin_o, tcur_o, tmaxdt_o, tmindt_o, hmax_o, hmin_o, hcur_o, hmaxdt_o, hmindt_o) =
                *map;

            let t_max = decode_temperature(buf, tmax_o, false);
            let t_min = decode_temperature(buf, tmin_o, true);
            let t_cur = decode_temperature(buf, tcur_o, false);
            temperature[slot] = Extremes {
                current: temperature_or_sentinel(t_cur),
                max: temperature_or_sentinel(t_max),
                max_at: valid_dt_if_present(t_max.is_ok(), buf, tmaxdt_o, false),
                min: temperature_or_sentinel(t_min),
                min_at: valid_dt_if_present(t_min.is_ok(), buf, tmindt_o, false),
            };

            let h_max = decode_humidity(buf, hmax_o, true);
            let h_min = decode_humidity(buf, hmin_o, true);
            let h_cur = decode_humidity(buf, hcur_o, true);
            humidity[slot] = Extremes {
                current: humidity_or_sentinel(h_cur),
                max: humidity_or_sentinel(h_max),
                max_at: valid_dt_if_present(h_max.is_ok(), buf, hmaxdt_o, true),
                min: humidity_or_sentinel(h_min),
                min_at: valid_dt_if_present(h_min.is_ok(), buf, hmindt_o, true),
            };
        }

        let mut alarm_data = [0u8; 12];
        alarm_data.copy_from_slice(&buf[223..235]);

        CurrentObservation {
            received_at,
            signal_quality,
            temperature,
            humidity,
            alarm_data,
        }
    }

    /// Battery-low flags for all nine slots (slot 0 from `alarm_data[1] &
    /// 0x80`, slots 1..8 from `alarm_data[0]` bits `0x01..0x80`).
    pub fn battery_low(&self) -> [bool; SLOT_COUNT] {
        let mut out = [false; SLOT_COUNT];
        out[0] = self.alarm_data[1] & 0x80 != 0;
        for slot in 1..SLOT_COUNT {
            let bit = 1u8 << (slot - 1);
            out[slot] = self.alarm_data[0] & bit != 0;
        }
        out
    }
}

/// Only decode the min/max timestamp when the paired value was a real
/// reading, not NP/OFL.
fn valid_dt_if_present(value_is_valid: bool, buf: &[u8], start: usize, start_on_hi: bool) -> Option<i64> {
    if !value_is_valid {
        return None;
    }
    match decode_timestamp_8(buf, start, start_on_hi) {
        Timestamp::Valid(ts) => Some(ts),
        _ => None,
    }
}
