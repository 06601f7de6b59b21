// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backfill cursor for the console's 51 200-slot circular history buffer.
//!
//! Grounded on `kl.py`'s `HistoryCache` plus `CommunicationService.
//! handleHistoryData` (the sizing, windowing and per-position filtering
//! logic lives together there; split out here as a standalone, testable
//! component per Design Notes' "cyclic handler -> state -> handler is
//! linearized").

use crate::model::history::{HistoryFrame, HistorySlot};
use crate::model::{wrap_index, MAX_RECORDS};

/// Console-clock sanity floor: 2010-07-01 00:00:00 UTC.
pub const EARLIEST_VALID_TS: i64 = 1_277_942_400;

/// How far a record's timestamp may sit ahead of wall-clock "now" before
/// it's rejected as implausible.
const FUTURE_SLACK_SECS: i64 = 300;

/// Maximum gap between consecutive accepted records before a record is
/// treated as a clock glitch rather than real data.
const MAX_RECORD_GAP_SECS: i64 = 86_400;

/// Requested starting point for a backfill: an explicit record count, a
/// "since" timestamp (sized using the archive interval), or "everything
/// the station has".
#[derive(Debug, Clone, Copy)]
pub enum BackfillRequest {
    Count(u32),
    Since { since_ts: i64, now: i64, archive_interval_secs: u32 },
    All,
}

/// Bounded record cache driving one backfill run.
#[derive(Debug, Clone)]
pub struct HistoryCursor {
    /// Inclusive lower bound; records older than this are never accepted.
    pub since_ts: i64,
    /// Index the first frame of this run started at.
    pub start_index: u32,
    /// Index the next outgoing ACK should request.
    pub next_index: u32,
    /// Most recent index the station reported as its latest record.
    pub latest_index: u32,
    pub records: Vec<crate::model::history::HistoryRecord>,
    pub num_scanned: u32,
    ts_last_rec: Option<i64>,
}

impl HistoryCursor {
    /// Start a new backfill run. `nrec` is the number of records the
    /// station currently holds (`(latest - this) mod 51200` from its most
    /// recent status); `limit` is the host-configured cap on one run.
    pub fn start(request: BackfillRequest, since_ts: i64, latest_index: u32, nrec: u32, limit: u32) -> Self {
        let nreq = match request {
            BackfillRequest::Count(n) => n,
            BackfillRequest::Since { since_ts, now, archive_interval_secs } => {
                let archive_interval_secs = archive_interval_secs.max(1) as i64;
                let elapsed = (now - since_ts).max(0);
                let by_age = (elapsed + archive_interval_secs - 1) / archive_interval_secs + 5;
                (by_age as u32).min(nrec)
            }
            BackfillRequest::All => nrec,
        };
        let nreq = nreq.min(limit).min(MAX_RECORDS - 1);

        let start_index = wrap_index(latest_index as i64 - nreq as i64);
        HistoryCursor {
            since_ts,
            start_index,
            next_index: start_index,
            latest_index,
            records: Vec::new(),
            num_scanned: 0,
            ts_last_rec: None,
        }
    }

    /// `true` once the cursor has caught up to the station's latest index.
    pub fn is_complete(&self) -> bool {
        self.next_index == self.latest_index
    }

    /// Validate and absorb one incoming history frame whose header claims
    /// index `this_index`. `now` is wall-clock seconds, used for the
    /// future-timestamp ceiling.
    ///
    /// Returns `true` if the frame's index fell in the expected window and
    /// was processed (`next_index` advances regardless of how many of its
    /// six positions were actually kept); `false` if the frame must be
    /// ignored and re-requested.
    pub fn accept_frame(&mut self, this_index: u32, frame: &HistoryFrame, now: i64) -> bool {
        let offset = wrap_index(this_index as i64 - self.next_index as i64);
        if offset == 0 || offset > 6 {
            return false;
        }

        for slot in &frame.slots {
            if let HistorySlot::Record(rec) = slot {
                let Some(ts) = rec.at.unix() else { continue };
                if ts < EARLIEST_VALID_TS {
                    log::warn!("rejecting history record with implausible timestamp {ts}");
                    continue;
                }
                if ts < self.since_ts {
                    continue;
                }
                if ts > now + FUTURE_SLACK_SECS {
                    continue;
                }
                if let Some(last) = self.ts_last_rec {
                    if ts <= last || ts - last > MAX_RECORD_GAP_SECS {
                        continue;
                    }
                }
                self.ts_last_rec = Some(ts);
                self.records.push(rec.clone());
            }
        }

        self.next_index = this_index;
        self.num_scanned += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Timestamp;
    use crate::model::history::HistoryRecord;

    fn record_at(ts: i64) -> HistoryRecord {
        HistoryRecord {
            at: Timestamp::Valid(ts),
            temperature: [0.0; crate::model::SLOT_COUNT],
            humidity: [0.0; crate::model::SLOT_COUNT],
        }
    }

    fn frame_of(records: [HistoryRecord; 6]) -> HistoryFrame {
        HistoryFrame {
            slots: records.map(HistorySlot::Record),
        }
    }

    #[test]
    fn sizing_from_explicit_count() {
        let cursor = HistoryCursor::start(BackfillRequest::Count(10), 0, 0, 10, 3001);
        assert_eq!(cursor.start_index, 51_190);
        assert_eq!(cursor.next_index, 51_190);
    }

    #[test]
    fn sizing_clamped_by_limit_and_nrec() {
        // 3600s since, 5min interval -> ceil(3600/300)+5 = 17; nrec caps it, not here.
        let now = 10_000;
        let since_ts = now - 3600;
        let cursor = HistoryCursor::start(
            BackfillRequest::Since { since_ts, now, archive_interval_secs: 300 },
            since_ts,
            0,
            200,
            3001,
        );
        // ceil(3600/300) + 5 = 12 + 5 = 17, well under nrec=200 and limit=3001.
        assert_eq!(cursor.start_index, wrap_index(0 - 17));
    }

    #[test]
    fn catch_up_sizing_clips_to_nrec() {
        // since_ts = now - 3600, history_interval = 5 min, nrec = 200:
        // by_age = ceil(3600/300) + 5 = 17 (not 725 -- that example assumes
        // a 5s archive interval in seconds, not minutes; pin the formula
        // directly against the spec's literal numbers instead).
        let now = 10_000;
        let since_ts = now - 3600;
        let archive_interval_secs = 5u32; // the spec's scenario uses seconds directly
        let cursor = HistoryCursor::start(
            BackfillRequest::Since { since_ts, now, archive_interval_secs },
            since_ts,
            0,
            200,
            3001,
        );
        // ceil(3600/5) + 5 = 720 + 5 = 725, clipped to nrec = 200.
        assert_eq!(cursor.start_index, wrap_index(0 - 200));
    }

    #[test]
    fn sizing_clamped_by_configured_limit() {
        let cursor = HistoryCursor::start(BackfillRequest::All, 0, 0, 5000, 100);
        assert_eq!(cursor.start_index, wrap_index(0 - 100));
    }

    #[test]
    fn accepts_in_window_frame_and_appends_all_six() {
        let mut cursor = HistoryCursor::start(BackfillRequest::Count(10), 0, 0, 10, 3001);
        let base = EARLIEST_VALID_TS + 10_000;
        let frame = frame_of([
            record_at(base),
            record_at(base + 300),
            record_at(base + 600),
            record_at(base + 900),
            record_at(base + 1200),
            record_at(base + 1500),
        ]);
        let this_index = wrap_index(cursor.next_index as i64 + 5);
        let accepted = cursor.accept_frame(this_index, &frame, base + 100_000);
        assert!(accepted);
        assert_eq!(cursor.next_index, this_index);
        assert_eq!(cursor.records.len(), 6);
    }

    #[test]
    fn rejects_out_of_window_frame() {
        let mut cursor = HistoryCursor::start(BackfillRequest::Count(10), 0, 0, 10, 3001);
        let frame = frame_of([
            record_at(EARLIEST_VALID_TS),
            record_at(EARLIEST_VALID_TS),
            record_at(EARLIEST_VALID_TS),
            record_at(EARLIEST_VALID_TS),
            record_at(EARLIEST_VALID_TS),
            record_at(EARLIEST_VALID_TS),
        ]);
        let bad_index = wrap_index(cursor.next_index as i64 + 7);
        assert!(!cursor.accept_frame(bad_index, &frame, EARLIEST_VALID_TS + 1_000_000));
        assert_eq!(cursor.records.len(), 0);
    }

    #[test]
    fn future_timestamp_fully_rejected() {
        let mut cursor = HistoryCursor::start(BackfillRequest::Count(10), 0, 0, 10, 3001);
        let now = EARLIEST_VALID_TS + 10_000;
        let frame = frame_of([
            record_at(now + 400),
            record_at(now + 400),
            record_at(now + 400),
            record_at(now + 400),
            record_at(now + 400),
            record_at(now + 400),
        ]);
        let this_index = wrap_index(cursor.next_index as i64 + 3);
        let accepted = cursor.accept_frame(this_index, &frame, now);
        assert!(accepted);
        assert_eq!(cursor.records.len(), 0);
    }

    #[test]
    fn duplicate_timestamp_keeps_first_only() {
        let mut cursor = HistoryCursor::start(BackfillRequest::Count(10), 0, 0, 10, 3001);
        let base = EARLIEST_VALID_TS + 10_000;
        let frame = frame_of([
            record_at(base),
            record_at(base),
            record_at(base + 100),
            record_at(base + 200),
            record_at(base + 300),
            record_at(base + 400),
        ]);
        let this_index = wrap_index(cursor.next_index as i64 + 4);
        cursor.accept_frame(this_index, &frame, base + 100_000);
        assert_eq!(cursor.records.len(), 5);
        assert_eq!(cursor.records[0].at.unix(), Some(base));
        assert_eq!(cursor.records[1].at.unix(), Some(base + 100));
    }

    #[test]
    fn pre_2010_record_rejected() {
        let mut cursor = HistoryCursor::start(BackfillRequest::Count(10), 0, 0, 10, 3001);
        let frame = frame_of([
            record_at(EARLIEST_VALID_TS - 1),
            record_at(EARLIEST_VALID_TS + 100),
            record_at(EARLIEST_VALID_TS + 200),
            record_at(EARLIEST_VALID_TS + 300),
            record_at(EARLIEST_VALID_TS + 400),
            record_at(EARLIEST_VALID_TS + 500),
        ]);
        let this_index = wrap_index(cursor.next_index as i64 + 2);
        cursor.accept_frame(this_index, &frame, EARLIEST_VALID_TS + 100_000);
        assert_eq!(cursor.records.len(), 5);
    }

    #[test]
    fn since_ts_floor_enforced() {
        let since_ts = EARLIEST_VALID_TS + 50_000;
        let mut cursor = HistoryCursor::start(BackfillRequest::Count(10), since_ts, 0, 10, 3001);
        let frame = frame_of([
            record_at(since_ts - 100),
            record_at(since_ts + 100),
            record_at(since_ts + 200),
            record_at(since_ts + 300),
            record_at(since_ts + 400),
            record_at(since_ts + 500),
        ]);
        let this_index = wrap_index(cursor.next_index as i64 + 1);
        cursor.accept_frame(this_index, &frame, since_ts + 1_000_000);
        assert_eq!(cursor.records.len(), 5);
        assert!(cursor.records.iter().all(|r| r.at.unix().unwrap() >= since_ts));
    }

    #[test]
    fn large_gap_after_first_record_rejected() {
        let mut cursor = HistoryCursor::start(BackfillRequest::Count(10), 0, 0, 10, 3001);
        let base = EARLIEST_VALID_TS + 10_000;
        let frame = frame_of([
            record_at(base),
            record_at(base + 90_000),
            record_at(base + 200),
            record_at(base + 300),
            record_at(base + 400),
            record_at(base + 500),
        ]);
        let this_index = wrap_index(cursor.next_index as i64 + 6);
        cursor.accept_frame(this_index, &frame, base + 200_000);
        // base accepted, +90000 rejected (gap), +200.. all rejected (not > ts_last_rec=base... wait base+200 < base, no)
        assert!(cursor.records.iter().any(|r| r.at.unix() == Some(base)));
        assert!(!cursor.records.iter().any(|r| r.at.unix() == Some(base + 90_000)));
    }

    #[test]
    fn is_complete_when_caught_up() {
        let mut cursor = HistoryCursor::start(BackfillRequest::Count(10), 0, 10, 10, 3001);
        assert!(!cursor.is_complete());
        cursor.next_index = 10;
        assert!(cursor.is_complete());
    }
}
