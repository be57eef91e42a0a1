//! Append-only duration ledger.
//!
//! Occupied time is credited once, when a departure is observed: the
//! occupied→free record adds the span since the stay began. Consecutive
//! occupied records carry the total unchanged, so a vehicle that never
//! leaves contributes nothing for its current stay. Stay starts live in
//! memory; after a restart mid-stay only the span since the last persisted
//! record can be credited, which undercounts that stay.

use crate::error::AppError;
use crate::lot::Spot;
use crate::store::{LotStore, StatusRecord};
use std::collections::HashMap;
use std::time::SystemTime;
use tracing::warn;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Stateful ledger over the append-only status history. One instance per
/// detection loop; it is the sole writer of `spot_status`.
#[derive(Debug, Default)]
pub struct DurationLedger {
    stay_started: HashMap<String, SystemTime>,
}

impl DurationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the latest status per spot, fold in this cycle's occupancy vector
    /// and append one new record per spot. Returns the appended records in
    /// spot order.
    pub fn update<S: LotStore + ?Sized>(
        &mut self,
        store: &mut S,
        spots: &[Spot],
        occupancy: &[bool],
        now: SystemTime,
    ) -> Result<Vec<StatusRecord>, AppError> {
        debug_assert_eq!(spots.len(), occupancy.len());

        let mut records = Vec::with_capacity(spots.len());
        for (spot, &occupied_now) in spots.iter().zip(occupancy) {
            let previous = store
                .latest_status(&spot.name)
                .map_err(|err| AppError::Store(err.to_string()))?;
            let record = self.next_status(&spot.name, previous.as_ref(), occupied_now, now);
            store
                .append_status(&record)
                .map_err(|err| AppError::Store(err.to_string()))?;
            records.push(record);
        }
        Ok(records)
    }

    fn next_status(
        &mut self,
        spot_name: &str,
        previous: Option<&StatusRecord>,
        occupied_now: bool,
        now: SystemTime,
    ) -> StatusRecord {
        // First-ever observation counts as a free spot with zero history.
        let (last_occupied, last_cumulative) = previous
            .map(|last| (last.occupied, last.cumulative_occupied_hours))
            .unwrap_or((false, 0.0));

        let cumulative_occupied_hours = if last_occupied && !occupied_now {
            // Departure: credit the whole stay. Without an in-memory start
            // (process restarted mid-stay) fall back to the last record's
            // timestamp, crediting only the tail of the stay.
            let stay_start = self
                .stay_started
                .remove(spot_name)
                .or_else(|| previous.map(|last| last.timestamp));
            let credit = match stay_start {
                Some(start) => elapsed_hours(spot_name, start, now),
                None => 0.0,
            };
            last_cumulative + credit
        } else {
            last_cumulative
        };

        if occupied_now {
            let stay_start = match previous {
                Some(last) if last.occupied => last.timestamp,
                _ => now,
            };
            self.stay_started
                .entry(spot_name.to_string())
                .or_insert(stay_start);
        } else {
            self.stay_started.remove(spot_name);
        }

        StatusRecord {
            spot_name: spot_name.to_string(),
            occupied: occupied_now,
            timestamp: now,
            cumulative_occupied_hours,
        }
    }
}

fn elapsed_hours(spot_name: &str, earlier: SystemTime, now: SystemTime) -> f64 {
    match now.duration_since(earlier) {
        Ok(elapsed) => elapsed.as_secs_f64() / SECONDS_PER_HOUR,
        Err(_) => {
            warn!(
                spot = spot_name,
                "Clock moved backwards; treating elapsed time as zero"
            );
            0.0
        }
    }
}
