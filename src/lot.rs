use crate::geometry::Rect;
use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;

/// One configured parking spot. The spot set is loaded once at startup and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spot {
    pub name: String,
    pub rect: Rect,
}

/// Raw `[[spots]]` entry as it appears in the config file.
#[derive(Debug, Deserialize, Clone)]
pub struct SpotSpec {
    pub name: String,
    /// Rectangle as [x1, y1, x2, y2] in source-frame pixels.
    pub rect: [i32; 4],
}

#[derive(Debug, Error)]
pub enum LotConfigError {
    #[error("duplicate spot name: {0}")]
    DuplicateName(String),
    #[error("spot {0} has a degenerate (zero-area) rectangle")]
    DegenerateRect(String),
}

/// Build the immutable spot list in config order, rejecting duplicate names
/// and zero-area rectangles.
pub fn build_spots(specs: &[SpotSpec]) -> Result<Vec<Spot>, LotConfigError> {
    let mut seen = HashSet::new();
    let mut spots = Vec::with_capacity(specs.len());
    for spec in specs {
        if !seen.insert(spec.name.clone()) {
            return Err(LotConfigError::DuplicateName(spec.name.clone()));
        }
        let rect = Rect::from_corners(spec.rect);
        if rect.area() <= 0 {
            return Err(LotConfigError::DegenerateRect(spec.name.clone()));
        }
        spots.push(Spot {
            name: spec.name.clone(),
            rect,
        });
    }
    Ok(spots)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str, rect: [i32; 4]) -> SpotSpec {
        SpotSpec {
            name: name.to_string(),
            rect,
        }
    }

    #[test]
    fn build_spots_preserves_config_order() -> Result<(), LotConfigError> {
        let spots = build_spots(&[
            spec("Slot2", [200, 1030, 220, 1050]),
            spec("Slot1", [100, 1000, 120, 1020]),
        ])?;

        assert_eq!(spots.len(), 2);
        assert_eq!(spots[0].name, "Slot2");
        assert_eq!(spots[1].name, "Slot1");
        assert_eq!(spots[1].rect, Rect::new(100, 1000, 120, 1020));
        Ok(())
    }

    #[test]
    fn duplicate_spot_name_is_rejected() {
        let result = build_spots(&[
            spec("Slot1", [0, 0, 10, 10]),
            spec("Slot1", [20, 0, 30, 10]),
        ]);

        assert!(matches!(result, Err(LotConfigError::DuplicateName(name)) if name == "Slot1"));
    }

    #[test]
    fn degenerate_rect_is_rejected() {
        let result = build_spots(&[spec("Slot1", [10, 10, 10, 20])]);

        assert!(matches!(result, Err(LotConfigError::DegenerateRect(name)) if name == "Slot1"));
    }

    #[test]
    fn inverted_rect_is_rejected() {
        let result = build_spots(&[spec("Slot1", [10, 10, 0, 0])]);

        assert!(matches!(result, Err(LotConfigError::DegenerateRect(_))));
    }
}
