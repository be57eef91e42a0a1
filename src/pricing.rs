//! Bounded multiplicative price updates driven by instantaneous occupancy and
//! historical occupied duration.
//!
//! Occupied spots ratchet up fast, free spots decay slowly, and both ends are
//! clamped so the series stays inside the configured band. The clamp is
//! applied after the multiplicative step and rounding happens last.

use crate::error::AppError;
use crate::lot::Spot;
use crate::store::{LotStore, PriceRecord};
use std::time::SystemTime;

const RAISE_BASE: f64 = 1.05;
const OCCUPANCY_WEIGHT: f64 = 0.30;
const DURATION_WEIGHT: f64 = 0.15;
const DECAY: f64 = 0.95;

#[derive(Debug, Clone)]
pub struct PricingConfig {
    pub base_price: f64,
    pub min_price: f64,
    pub max_price: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_price: 1.5,
            min_price: 1.5,
            max_price: 3.0,
        }
    }
}

/// Compute and append one new price per spot from the current occupancy
/// vector, the just-updated cumulative durations and the last persisted
/// prices. Returns the appended records in spot order.
pub fn update_prices<S: LotStore + ?Sized>(
    store: &mut S,
    spots: &[Spot],
    occupancy: &[bool],
    config: &PricingConfig,
    now: SystemTime,
) -> Result<Vec<PriceRecord>, AppError> {
    debug_assert_eq!(spots.len(), occupancy.len());
    if spots.is_empty() {
        return Ok(Vec::new());
    }

    let occupied_count = occupancy.iter().filter(|&&occupied| occupied).count();
    let occupancy_ratio = occupied_count as f64 / spots.len() as f64;

    let mut durations = Vec::with_capacity(spots.len());
    for spot in spots {
        let duration = store
            .latest_status(&spot.name)
            .map_err(|err| AppError::Store(err.to_string()))?
            .map(|record| record.cumulative_occupied_hours)
            .unwrap_or(0.0);
        durations.push(duration);
    }
    // Floor of one hour so a lot with no history yet never divides by zero.
    let max_duration = durations.iter().copied().fold(0.0_f64, f64::max).max(1.0);

    let mut records = Vec::with_capacity(spots.len());
    for ((spot, &occupied), &duration) in spots.iter().zip(occupancy).zip(&durations) {
        let last_price = store
            .latest_price(&spot.name)
            .map_err(|err| AppError::Store(err.to_string()))?
            .map(|record| record.price)
            .unwrap_or(config.base_price);
        let duration_factor = duration / max_duration;
        let price = next_price(last_price, occupied, occupancy_ratio, duration_factor, config);
        let record = PriceRecord {
            spot_name: spot.name.clone(),
            price,
            timestamp: now,
        };
        store
            .append_price(&record)
            .map_err(|err| AppError::Store(err.to_string()))?;
        records.push(record);
    }
    Ok(records)
}

fn next_price(
    last_price: f64,
    occupied: bool,
    occupancy_ratio: f64,
    duration_factor: f64,
    config: &PricingConfig,
) -> f64 {
    let clamped = if occupied {
        let factor = RAISE_BASE + OCCUPANCY_WEIGHT * occupancy_ratio + DURATION_WEIGHT * duration_factor;
        (last_price * factor).min(config.max_price)
    } else {
        (last_price * DECAY).max(config.min_price)
    };
    round_to_cents(clamped)
}

fn round_to_cents(price: f64) -> f64 {
    (price * 100.0).round() / 100.0
}
