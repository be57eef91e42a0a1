use crate::state::Snapshot;
use serde::Serialize;
use std::collections::BTreeMap;

/// Wire payload pushed to each streaming subscriber once per tick.
/// `occupied_spots` is in configured spot order.
#[derive(Debug, Serialize, PartialEq)]
pub struct StreamFrame {
    pub occupied_spots: Vec<bool>,
    pub pricing: BTreeMap<String, f64>,
}

impl From<&Snapshot> for StreamFrame {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            occupied_spots: snapshot.occupied_spots.clone(),
            pricing: snapshot.pricing.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct LotSuccessResponse {
    pub occupied_spots: Vec<bool>,
    pub pricing: BTreeMap<String, f64>,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct LotErrorResponse {
    pub error_code: LotErrorCode,
    pub error_message: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LotErrorCode {
    NoData,
    InternalError,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
    Ko,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthSuccessResponse {
    pub status: HealthStatus,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthErrorResponse {
    pub error_code: HealthErrorCode,
    pub error_message: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthErrorCode {
    InternalError,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SpotResponse {
    pub name: String,
    pub rect: [i32; 4],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SpotsSuccessResponse {
    pub spots: Vec<SpotResponse>,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SpotsErrorResponse {
    pub error_code: SpotsErrorCode,
    pub error_message: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpotsErrorCode {
    InternalError,
}
