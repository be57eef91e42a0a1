//! Per-cycle occupancy resolution from raw detections.

use crate::detect::Detection;
use crate::geometry::is_occupying;
use crate::lot::Spot;

/// Which detections qualify as vehicles: class membership plus a strict
/// confidence threshold.
#[derive(Debug, Clone)]
pub struct DetectionFilter {
    pub class_ids: Vec<u32>,
    pub min_confidence: f32,
}

impl DetectionFilter {
    pub fn matches(&self, detection: &Detection) -> bool {
        self.class_ids.contains(&detection.class_id)
            && detection.confidence > self.min_confidence
    }
}

impl Default for DetectionFilter {
    fn default() -> Self {
        Self {
            class_ids: vec![0, 1],
            min_confidence: 0.5,
        }
    }
}

/// Recompute the occupancy vector from scratch: one entry per spot in spot
/// order, true iff ANY qualifying detection covers the spot. No memory of
/// previous cycles.
pub fn resolve_occupancy(
    detections: &[Detection],
    spots: &[Spot],
    filter: &DetectionFilter,
) -> Vec<bool> {
    let mut occupied = vec![false; spots.len()];
    for detection in detections {
        if !filter.matches(detection) {
            continue;
        }
        for (index, spot) in spots.iter().enumerate() {
            if is_occupying(&detection.rect, &spot.rect) {
                occupied[index] = true;
            }
        }
    }
    occupied
}
