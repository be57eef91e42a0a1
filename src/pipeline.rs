//! The detection/update loop: capture → detect → resolve → ledger → pricing
//! → publish. Runs on its own thread; the API side only ever reads the
//! snapshot it publishes.

use crate::capture::FrameSource;
use crate::detect::Detector;
use crate::error::AppError;
use crate::ledger::DurationLedger;
use crate::lot::Spot;
use crate::occupancy::{self, DetectionFilter};
use crate::pricing::{self, PricingConfig};
use crate::state::{AppState, Snapshot};
use crate::store::LotStore;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant, SystemTime};
use tracing::{info, warn};

pub const DEFAULT_CYCLE_INTERVAL: Duration = Duration::from_secs(1);
const STORE_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Everything one cycle needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub spots: Vec<Spot>,
    pub filter: DetectionFilter,
    pub pricing: PricingConfig,
}

/// Run one observation cycle and publish the result.
///
/// Capture and detector failures abort the cycle (the last published
/// snapshot stays up). A persistence failure is downgraded: the cycle still
/// publishes the fresh occupancy vector, paired with the loop's last known
/// prices, and the ledger catches up on the next successful write.
pub fn run_detection_cycle(
    capture: &mut dyn FrameSource,
    detector: &mut dyn Detector,
    store: &mut dyn LotStore,
    ledger: &mut DurationLedger,
    settings: &CycleSettings,
    state: &Arc<RwLock<AppState>>,
    last_prices: &mut BTreeMap<String, f64>,
    now: SystemTime,
) -> Result<(), AppError> {
    let frame = capture.capture_frame()?;
    let detections = detector.detect(&frame)?;
    let occupancy = occupancy::resolve_occupancy(&detections, &settings.spots, &settings.filter);

    match persist_cycle(store, ledger, settings, &occupancy, now) {
        Ok(prices) => {
            last_prices.clear();
            last_prices.extend(prices);
        }
        Err(err) => {
            warn!(
                error = %err,
                "Persisting cycle failed; publishing occupancy with stale prices"
            );
        }
    }

    let snapshot = Snapshot {
        occupied_spots: occupancy,
        pricing: last_prices.clone(),
        timestamp: now,
    };
    let mut guard = state.write().map_err(|_| AppError::StateLock)?;
    guard.set_snapshot(snapshot)?;
    Ok(())
}

/// Ledger first, then pricing, each retried once. The stages retry
/// independently so a pricing failure never re-appends status records.
fn persist_cycle(
    store: &mut dyn LotStore,
    ledger: &mut DurationLedger,
    settings: &CycleSettings,
    occupancy: &[bool],
    now: SystemTime,
) -> Result<Vec<(String, f64)>, AppError> {
    retry_once(|| ledger.update(&mut *store, &settings.spots, occupancy, now))?;
    let records = retry_once(|| {
        pricing::update_prices(&mut *store, &settings.spots, occupancy, &settings.pricing, now)
    })?;
    Ok(records
        .into_iter()
        .map(|record| (record.spot_name, record.price))
        .collect())
}

fn retry_once<T>(mut operation: impl FnMut() -> Result<T, AppError>) -> Result<T, AppError> {
    match operation() {
        Ok(value) => Ok(value),
        Err(err) => {
            warn!(error = %err, "Store operation failed; retrying once");
            std::thread::sleep(STORE_RETRY_DELAY);
            operation()
        }
    }
}

/// Spawn the detection thread. It owns the capture source, the detector and
/// the store exclusively; everything it learns leaves through the snapshot.
pub fn spawn_detection_thread(
    mut capture: Box<dyn FrameSource + Send>,
    mut detector: Box<dyn Detector + Send>,
    mut store: Box<dyn LotStore + Send>,
    settings: CycleSettings,
    state: Arc<RwLock<AppState>>,
    interval: Duration,
    stop: Arc<AtomicBool>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let mut ledger = DurationLedger::new();
        let mut last_prices = initial_prices(store.as_mut(), &settings);
        info!(spots = settings.spots.len(), "Detection loop started");

        while !stop.load(Ordering::Relaxed) {
            let cycle_start = Instant::now();
            if let Err(err) = run_detection_cycle(
                capture.as_mut(),
                detector.as_mut(),
                store.as_mut(),
                &mut ledger,
                &settings,
                &state,
                &mut last_prices,
                SystemTime::now(),
            ) {
                warn!(error = %err, "Detection cycle failed; keeping last published snapshot");
            }
            sleep_with_stop(interval, &stop, cycle_start);
        }
        info!("Detection loop stopped");
    })
}

/// Seed the loop's price map from the store so a restart keeps serving the
/// persisted prices until the first cycle completes.
fn initial_prices(store: &mut dyn LotStore, settings: &CycleSettings) -> BTreeMap<String, f64> {
    let mut prices = BTreeMap::new();
    for spot in &settings.spots {
        let price = match store.latest_price(&spot.name) {
            Ok(Some(record)) => record.price,
            Ok(None) => settings.pricing.base_price,
            Err(err) => {
                warn!(spot = %spot.name, error = %err, "Failed to read persisted price; using base");
                settings.pricing.base_price
            }
        };
        prices.insert(spot.name.clone(), price);
    }
    prices
}

/// Sleep out the rest of the cycle, waking early when asked to stop. An
/// overrunning cycle just starts the next one late; cycles never overlap.
fn sleep_with_stop(duration: Duration, stop: &AtomicBool, start: Instant) {
    let elapsed = start.elapsed();
    if elapsed >= duration {
        return;
    }
    let remaining = duration - elapsed;
    let step = Duration::from_millis(100);
    let mut slept = Duration::ZERO;

    while slept < remaining {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        std::thread::sleep(step.min(remaining - slept));
        slept += step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::mock::{MockCaptureStep, MockFrameSource};
    use crate::detect::Detection;
    use crate::detect::mock::{MockDetectionStep, MockDetector};
    use crate::geometry::Rect;
    use crate::store::{PriceRecord, SqliteLotStore, StatusRecord, StoreError};
    use std::time::UNIX_EPOCH;

    fn settings() -> CycleSettings {
        CycleSettings {
            spots: vec![
                Spot {
                    name: "Slot1".to_string(),
                    rect: Rect::new(0, 0, 20, 20),
                },
                Spot {
                    name: "Slot2".to_string(),
                    rect: Rect::new(100, 0, 120, 20),
                },
            ],
            filter: DetectionFilter::default(),
            pricing: PricingConfig::default(),
        }
    }

    fn vehicle_on_slot1() -> Detection {
        Detection {
            rect: Rect::new(0, 0, 20, 20),
            class_id: 0,
            confidence: 0.9,
        }
    }

    fn at(seconds: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(seconds)
    }

    /// Store that refuses everything, for exercising the stale-price path.
    struct FailingStore;

    impl LotStore for FailingStore {
        fn append_status(&mut self, _record: &StatusRecord) -> Result<(), StoreError> {
            Err(StoreError::TimestampRange)
        }
        fn latest_status(&mut self, _spot_name: &str) -> Result<Option<StatusRecord>, StoreError> {
            Err(StoreError::TimestampRange)
        }
        fn append_price(&mut self, _record: &PriceRecord) -> Result<(), StoreError> {
            Err(StoreError::TimestampRange)
        }
        fn latest_price(&mut self, _spot_name: &str) -> Result<Option<PriceRecord>, StoreError> {
            Err(StoreError::TimestampRange)
        }
    }

    #[test]
    fn cycle_publishes_occupancy_and_prices() -> Result<(), AppError> {
        let mut capture = MockFrameSource::always_ok();
        let mut detector =
            MockDetector::with_steps(vec![MockDetectionStep::Detections(vec![vehicle_on_slot1()])]);
        let mut store = SqliteLotStore::open_in_memory().expect("open");
        let mut ledger = DurationLedger::new();
        let settings = settings();
        let state = Arc::new(RwLock::new(AppState::new(settings.spots.clone())));
        let mut last_prices = BTreeMap::new();

        run_detection_cycle(
            &mut capture,
            &mut detector,
            &mut store,
            &mut ledger,
            &settings,
            &state,
            &mut last_prices,
            at(60),
        )?;

        let guard = state.read().map_err(|_| AppError::StateLock)?;
        let snapshot = guard.snapshot().expect("snapshot published");
        assert_eq!(snapshot.occupied_spots, vec![true, false]);
        assert_eq!(snapshot.pricing.get("Slot1"), Some(&1.80));
        assert_eq!(snapshot.pricing.get("Slot2"), Some(&1.50));
        drop(guard);

        let status = store
            .latest_status("Slot1")
            .map_err(|err| AppError::Store(err.to_string()))?
            .expect("status appended");
        assert!(status.occupied);
        Ok(())
    }

    #[test]
    fn capture_failure_aborts_cycle_and_keeps_snapshot() -> Result<(), AppError> {
        let mut capture = MockFrameSource::with_steps(vec![
            MockCaptureStep::Frame(crate::capture::Frame::blank(8, 8)),
            MockCaptureStep::Fail,
        ]);
        let mut detector =
            MockDetector::with_steps(vec![MockDetectionStep::Detections(vec![vehicle_on_slot1()])]);
        let mut store = SqliteLotStore::open_in_memory().expect("open");
        let mut ledger = DurationLedger::new();
        let settings = settings();
        let state = Arc::new(RwLock::new(AppState::new(settings.spots.clone())));
        let mut last_prices = BTreeMap::new();

        run_detection_cycle(
            &mut capture,
            &mut detector,
            &mut store,
            &mut ledger,
            &settings,
            &state,
            &mut last_prices,
            at(60),
        )?;
        let first = {
            let guard = state.read().map_err(|_| AppError::StateLock)?;
            guard.snapshot().cloned().expect("snapshot")
        };

        let result = run_detection_cycle(
            &mut capture,
            &mut detector,
            &mut store,
            &mut ledger,
            &settings,
            &state,
            &mut last_prices,
            at(120),
        );

        assert!(matches!(result, Err(AppError::Capture(_))));
        let guard = state.read().map_err(|_| AppError::StateLock)?;
        assert_eq!(guard.snapshot(), Some(&first));
        Ok(())
    }

    #[test]
    fn store_failure_still_publishes_occupancy() -> Result<(), AppError> {
        let mut capture = MockFrameSource::always_ok();
        let mut detector =
            MockDetector::with_steps(vec![MockDetectionStep::Detections(vec![vehicle_on_slot1()])]);
        let mut store = FailingStore;
        let mut ledger = DurationLedger::new();
        let settings = settings();
        let state = Arc::new(RwLock::new(AppState::new(settings.spots.clone())));
        let mut last_prices = BTreeMap::from([
            ("Slot1".to_string(), 1.65),
            ("Slot2".to_string(), 1.50),
        ]);

        run_detection_cycle(
            &mut capture,
            &mut detector,
            &mut store,
            &mut ledger,
            &settings,
            &state,
            &mut last_prices,
            at(60),
        )?;

        let guard = state.read().map_err(|_| AppError::StateLock)?;
        let snapshot = guard.snapshot().expect("snapshot published");
        assert_eq!(snapshot.occupied_spots, vec![true, false]);
        assert_eq!(snapshot.pricing.get("Slot1"), Some(&1.65));
        Ok(())
    }

    #[test]
    fn initial_prices_fall_back_to_base() {
        let mut store = SqliteLotStore::open_in_memory().expect("open");
        let settings = settings();
        store
            .append_price(&PriceRecord {
                spot_name: "Slot1".to_string(),
                price: 2.1,
                timestamp: at(30),
            })
            .expect("append");

        let prices = initial_prices(&mut store, &settings);

        assert_eq!(prices.get("Slot1"), Some(&2.1));
        assert_eq!(prices.get("Slot2"), Some(&1.5));
    }
}
