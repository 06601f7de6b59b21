// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Thread-safe facade: owns the RF worker thread and publishes snapshots
//! the consumer can read from any other thread.
//!
//! Grounded on `kl.py`'s `CommunicationService` public accessors
//! (`getCurrentData`/`getConfigData`/`getLastStat`/`isPaired`/
//! `startCachingHistory`/...) and its `doRF`/`doRFSetup`/`doRFCommunication`
//! loop; the lock-free snapshot pattern follows
//! `hdds::config::RuntimeConfig` (`Arc<ArcSwap<Option<T>>>` per field,
//! atomic load/store, no read-side lock).

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use chrono::Local;
use parking_lot::Mutex;

use crate::engine::{self, Engine, HandlerOutcome};
use crate::error::{DriverError, DriverResult};
use crate::history_cursor::HistoryCursor;
use crate::model::config::StationConfig;
use crate::model::current::CurrentObservation;
use crate::model::history::HistoryRecord;
use crate::rf::{self, FrequencyStandard};
use crate::settings::{DriverConfig, TransceiverFrequency};
use crate::usb::Transport;

const VENDOR_ID: u16 = 0x6666;
const PRODUCT_ID: u16 = 0x5555;

/// A snapshot of the bookkeeping the console reports back on every frame
/// (link quality, last-seen timestamps for each data category).
///
/// Grounded on `kl.py`'s `LastStat`.
#[derive(Debug, Clone, Default)]
pub struct LastStat {
    pub last_link_quality: Option<u8>,
    pub last_history_index: Option<u32>,
    pub latest_history_index: Option<u32>,
    pub last_seen_ts: Option<i64>,
    pub last_weather_ts: i64,
    pub last_history_ts: i64,
    pub last_config_ts: i64,
}

/// Everything the worker thread publishes and the consumer reads.
/// Every field is independently lock-free (`ArcSwap`) except the history
/// cache, which needs the same lock a push-and-scan naturally wants.
struct Shared {
    current: ArcSwap<Option<CurrentObservation>>,
    config: ArcSwap<Option<StationConfig>>,
    last_stat: Mutex<LastStat>,
    paired: AtomicBool,
    device_id: AtomicU32,
    serial: ArcSwap<Option<String>>,
    history: Mutex<Option<HistoryCursor>>,
    num_history_scanned: AtomicU32,
    wait_at_start: AtomicBool,
    running: AtomicBool,
    /// Cross-thread command for the worker's `Engine`; taken and applied at
    /// the top of each `run_loop` iteration.
    history_command: Mutex<Option<HistoryCommand>>,
}

/// A history-cache request issued by the consumer, applied by the worker
/// thread on its next iteration (the `Engine` that actually tracks the
/// cursor lives on that thread).
enum HistoryCommand {
    Start { since_ts: i64, num_rec: u32 },
    Stop,
}

impl Shared {
    fn new() -> Self {
        Shared {
            current: ArcSwap::new(Arc::new(None)),
            config: ArcSwap::new(Arc::new(None)),
            last_stat: Mutex::new(LastStat::default()),
            paired: AtomicBool::new(false),
            device_id: AtomicU32::new(u32::MAX),
            serial: ArcSwap::new(Arc::new(None)),
            history: Mutex::new(None),
            num_history_scanned: AtomicU32::new(0),
            wait_at_start: AtomicBool::new(false),
            running: AtomicBool::new(true),
            history_command: Mutex::new(None),
        }
    }
}

/// Host-side driver for one klimalogg console/transceiver pair.
///
/// Spawns one dedicated RF worker thread on [`KlimaLoggDriver::start`]; all
/// USB I/O is serialized there. Every accessor here is safe to call from any
/// other thread and never blocks on the worker.
pub struct KlimaLoggDriver {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl KlimaLoggDriver {
    /// Open the transceiver and start the RF worker thread.
    pub fn start(config: DriverConfig) -> DriverResult<Self> {
        let transport = crate::usb::rusb_transport::RusbTransport::new()?;
        Self::start_with_transport(config, Box::new(transport))
    }

    /// As [`Self::start`], but with an injected [`Transport`] (used by
    /// tests to drive the worker against a [`crate::usb::mock::MockTransport`]).
    pub fn start_with_transport(config: DriverConfig, mut transport: Box<dyn Transport>) -> DriverResult<Self> {
        let shared = Arc::new(Shared::new());
        shared.wait_at_start.store(true, Ordering::SeqCst);

        transport.open(VENDOR_ID, PRODUCT_ID, config.serial.as_deref())?;
        let standard = match config.transceiver_frequency {
            TransceiverFrequency::Eu => FrequencyStandard::Eu,
            TransceiverFrequency::Us => FrequencyStandard::Us,
        };
        let identity = rf::initialize(transport.as_mut(), standard)?;
        shared.device_id.store(identity.device_id as u32, Ordering::SeqCst);
        shared.serial.store(Arc::new(Some(identity.serial)));

        let worker_shared = shared.clone();
        let limit = config.limit_rec_read_to;
        let comm_interval = config.comm_interval;
        let first_sleep = config.first_sleep();
        let serial_configured = config.serial.is_some();
        let sensor_preset: Vec<(usize, String)> =
            config.sensor_texts().map(|(i, t)| (i, t.to_string())).collect();

        let worker = std::thread::spawn(move || {
            let mut engine = Engine::new(identity.device_id, comm_interval, limit);
            engine.set_sensor_text_preset(sensor_preset);
            run_loop(worker_shared, transport, engine, first_sleep, serial_configured);
        });

        Ok(KlimaLoggDriver { shared, worker: Some(worker) })
    }

    pub fn is_present(&self) -> bool {
        self.worker.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn is_paired(&self) -> bool {
        self.shared.paired.load(Ordering::SeqCst)
    }

    pub fn get_device_id(&self) -> Option<u16> {
        match self.shared.device_id.load(Ordering::SeqCst) {
            v if v == u32::MAX => None,
            v => Some(v as u16),
        }
    }

    pub fn get_serial(&self) -> Option<String> {
        (**self.shared.serial.load()).clone()
    }

    pub fn get_current_data(&self) -> Option<CurrentObservation> {
        (**self.shared.current.load()).clone()
    }

    pub fn get_config_data(&self) -> Option<StationConfig> {
        (**self.shared.config.load()).clone()
    }

    pub fn get_last_stat(&self) -> LastStat {
        self.shared.last_stat.lock().clone()
    }

    pub fn clear_wait_at_start(&self) {
        self.shared.wait_at_start.store(false, Ordering::SeqCst);
    }

    /// Begin a history backfill. Applied by the worker on its next
    /// iteration, since the `Engine` tracking the cursor lives on that
    /// thread; see [`Engine::start_caching_history`].
    pub fn start_caching_history(&self, since_ts: i64, num_rec: u32) {
        *self.shared.history_command.lock() = Some(HistoryCommand::Start { since_ts, num_rec });
    }

    pub fn stop_caching_history(&self) {
        *self.shared.history_command.lock() = Some(HistoryCommand::Stop);
        *self.shared.history.lock() = None;
    }

    pub fn get_history_cache_records(&self) -> Vec<HistoryRecord> {
        self.shared
            .history
            .lock()
            .as_ref()
            .map(|c| c.records.clone())
            .unwrap_or_default()
    }

    pub fn clear_history_cache(&self) {
        if let Some(cursor) = self.shared.history.lock().as_mut() {
            cursor.records.clear();
        }
    }

    pub fn get_uncached_history_count(&self) -> Option<u32> {
        let guard = self.shared.history.lock();
        let cursor = guard.as_ref()?;
        Some(crate::model::wrap_index(cursor.latest_index as i64 - cursor.next_index as i64))
    }

    pub fn get_next(&self) -> Option<u32> {
        self.shared.history.lock().as_ref().map(|c| c.next_index)
    }

    pub fn get_latest_history_index(&self) -> Option<u32> {
        self.shared.last_stat.lock().latest_history_index
    }

    pub fn get_num_history_scanned(&self) -> u32 {
        self.shared.num_history_scanned.load(Ordering::SeqCst)
    }

    /// Stop the worker thread and join it, waiting up to 60 s.
    pub fn stop(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.worker.take() {
            let deadline = Instant::now() + Duration::from_secs(60);
            while !handle.is_finished() && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(50));
            }
            let _ = handle.join();
        }
    }
}

impl Drop for KlimaLoggDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(
    shared: Arc<Shared>,
    mut transport: Box<dyn Transport>,
    mut engine: Engine,
    default_first_sleep: Duration,
    serial_configured: bool,
) {
    if let Err(e) = rf_setup(transport.as_mut()) {
        log::error!("rf setup failed: {e}");
        return;
    }

    while shared.wait_at_start.load(Ordering::SeqCst) && shared.running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_secs(1));
    }

    let mut first_sleep = Duration::from_millis(75);
    let mut next_sleep = Duration::from_millis(5);

    while shared.running.load(Ordering::SeqCst) {
        if let Some(command) = shared.history_command.lock().take() {
            let now = chrono::Utc::now().timestamp();
            match command {
                HistoryCommand::Start { since_ts, num_rec } => {
                    engine.start_caching_history_auto(since_ts, num_rec, now)
                }
                HistoryCommand::Stop => engine.stop_caching_history(),
            }
        }

        std::thread::sleep(first_sleep);

        let mut ready = false;
        while shared.running.load(Ordering::SeqCst) {
            match transport.get_state() {
                Ok(state) => {
                    if state[0] == 0x16 {
                        ready = true;
                        break;
                    }
                }
                Err(e) => {
                    log::error!("get_state failed: {e}");
                    std::thread::sleep(Duration::from_secs(5));
                }
            }
            std::thread::sleep(next_sleep);
        }
        if !ready {
            continue;
        }

        let (len, buf) = match transport.get_frame() {
            Ok(v) => v,
            Err(e) => {
                log::error!("get_frame failed: {e}");
                continue;
            }
        };

        let now = chrono::Utc::now().timestamp();
        let wall_clock = Local::now();
        match engine.handle_frame(&buf, len, now, wall_clock) {
            Ok(HandlerOutcome::Send(out)) => {
                if len >= 4 && buf[3] & 0xF0 == engine::frames::response::REQUEST {
                    let _ = transport.set_state(0);
                }
                if let Err(e) = transport.set_frame(&out) {
                    log::error!("set_frame failed: {e}");
                } else if let Err(e) = transport.set_tx() {
                    log::error!("set_tx failed: {e}");
                }
                let hint = engine::sleep_hint(&buf, default_first_sleep);
                first_sleep = hint.0;
                next_sleep = hint.1;
            }
            Ok(HandlerOutcome::NoOp) | Ok(HandlerOutcome::DataWritten) => {
                let _ = transport.set_rx();
                let hint = engine::sleep_hint(&buf, default_first_sleep);
                first_sleep = hint.0;
                next_sleep = hint.1;
            }
            Err(DriverError::UnknownDeviceId(id)) => {
                if !serial_configured {
                    log::error!("unexpected device id {id:#06x}; use the `serial` option if more than one USB transceiver is present");
                }
                let _ = transport.set_rx();
                let hint = engine::foreign_device_sleep_hint(len, serial_configured);
                first_sleep = hint.0;
                next_sleep = hint.1;
            }
            Err(DriverError::BadResponse(msg)) => {
                log::error!("generateResponse failed: {msg}");
                let _ = transport.set_rx();
            }
            Err(e) => {
                log::error!("frame handling failed: {e}");
                let _ = transport.set_rx();
            }
        }

        shared.paired.store(engine.is_paired(), Ordering::SeqCst);
        shared.current.store(Arc::new(engine.current().cloned()));
        shared.config.store(Arc::new(engine.station_config().cloned()));
        if let Some(cursor) = engine.history_cursor() {
            *shared.history.lock() = Some(cursor.clone());
            shared.num_history_scanned.store(cursor.num_scanned, Ordering::SeqCst);
        }
        {
            let mut stat = shared.last_stat.lock();
            stat.last_seen_ts = Some(now);
            if len > 4 {
                stat.last_link_quality = Some(buf[4] & 0x7f);
            }
            stat.last_weather_ts = engine.last_weather_ts();
            stat.last_history_index = engine.last_history_index();
            stat.latest_history_index = engine.latest_history_index();
        }
    }
}

/// Mirrors `doRFSetup`: reset the radio, park it in RX, twice (the original
/// driver does this because HeavyWeatherPro does, and repeating it makes
/// re-pairing after a factory reset more reliable).
fn rf_setup(transport: &mut dyn Transport) -> DriverResult<()> {
    transport.execute(5)?;
    transport.set_preamble(0xaa)?;
    transport.set_state(0)?;
    std::thread::sleep(Duration::from_secs(1));
    transport.set_rx()?;

    transport.set_preamble(0xaa)?;
    transport.set_state(0x1e)?;
    std::thread::sleep(Duration::from_secs(1));
    transport.set_rx()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usb::mock::MockTransport;

    fn mock_with_identity() -> MockTransport {
        let mut t = MockTransport::new();
        t.set_flash(0x1F5, &[0, 0, 0, 0]);
        t.set_flash(0x1F9, &[1, 2, 3, 4, 5, 0x12, 0x34]);
        t
    }

    #[test]
    fn start_reads_identity_and_is_present_until_stopped() {
        let mut t = mock_with_identity();
        t.push_state([0x00, 0x16]);
        t.push_frame(vec![0xAAu8; 7]); // will be rejected as bad response, harmless
        let config = DriverConfig::default();
        let mut driver = KlimaLoggDriver::start_with_transport(config, Box::new(t)).unwrap();
        assert_eq!(driver.get_device_id(), Some(0x1234));
        assert_eq!(driver.get_serial(), Some("01020304051852".to_string()));
        driver.stop();
        assert!(!driver.is_present());
    }

    #[test]
    fn history_accessors_are_empty_before_any_backfill_starts() {
        let mut t = mock_with_identity();
        t.push_state([0x00, 0x16]);
        t.push_frame(vec![0xAAu8; 7]);
        let driver = KlimaLoggDriver::start_with_transport(DriverConfig::default(), Box::new(t)).unwrap();
        assert!(driver.get_history_cache_records().is_empty());
        assert!(driver.get_uncached_history_count().is_none());
    }
}
