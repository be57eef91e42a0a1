use crate::api::ApiState;
use crate::api::responses::{
    HealthErrorCode, HealthErrorResponse, HealthStatus, HealthSuccessResponse, LotErrorCode,
    LotErrorResponse, LotSuccessResponse, SpotResponse, SpotsErrorCode, SpotsErrorResponse,
    SpotsSuccessResponse, StreamFrame,
};
use crate::state::Snapshot;
use axum::Json;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::fmt;
use std::time::{Duration, SystemTime};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error};

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// A snapshot older than this counts as stale for health reporting.
const STALE_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug)]
enum TimestampError {
    Format(time::error::Format),
}

impl fmt::Display for TimestampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestampError::Format(err) => write!(f, "timestamp format error: {err}"),
        }
    }
}

pub enum LotResponse {
    Success(LotSuccessResponse),
    Error {
        status: StatusCode,
        body: LotErrorResponse,
    },
}

impl IntoResponse for LotResponse {
    fn into_response(self) -> Response {
        match self {
            LotResponse::Success(body) => (StatusCode::OK, Json(body)).into_response(),
            LotResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub async fn get_lot(State(context): State<ApiState>) -> impl IntoResponse {
    build_lot_response(&context)
}

pub enum HealthResponse {
    Success {
        status: StatusCode,
        body: HealthSuccessResponse,
    },
    Error {
        status: StatusCode,
        body: HealthErrorResponse,
    },
}

impl IntoResponse for HealthResponse {
    fn into_response(self) -> Response {
        match self {
            HealthResponse::Success { status, body } => (status, Json(body)).into_response(),
            HealthResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub async fn get_health(State(context): State<ApiState>) -> impl IntoResponse {
    build_health_response(&context, SystemTime::now())
}

pub enum SpotsResponse {
    Success(SpotsSuccessResponse),
    Error {
        status: StatusCode,
        body: SpotsErrorResponse,
    },
}

impl IntoResponse for SpotsResponse {
    fn into_response(self) -> Response {
        match self {
            SpotsResponse::Success(body) => (StatusCode::OK, Json(body)).into_response(),
            SpotsResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub async fn get_spots(State(context): State<ApiState>) -> impl IntoResponse {
    build_spots_response(&context, SystemTime::now())
}

/// Upgrade to a WebSocket and push the latest snapshot on every tick.
pub async fn get_stream(State(context): State<ApiState>, upgrade: WebSocketUpgrade) -> Response {
    let receiver = match context.state.read() {
        Ok(guard) => guard.subscribe_snapshot(),
        Err(_) => {
            error!("State lock poisoned while subscribing to snapshots");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let tick = context.tick;
    upgrade.on_upgrade(move |socket| stream_snapshots(socket, receiver, tick))
}

/// Per-subscriber send loop. Each subscriber ticks on its own cadence and
/// always receives the most recently completed snapshot; a failed send drops
/// only this subscriber.
async fn stream_snapshots(
    mut socket: WebSocket,
    receiver: watch::Receiver<Option<Snapshot>>,
    tick: Duration,
) {
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let frame = receiver.borrow().as_ref().map(StreamFrame::from);
        // Nothing published yet: skip this tick rather than send a partial view.
        let Some(frame) = frame else { continue };
        let text = match serde_json::to_string(&frame) {
            Ok(text) => text,
            Err(err) => {
                error!(error = %err, "Failed to serialize stream frame");
                continue;
            }
        };
        if socket.send(Message::Text(text.into())).await.is_err() {
            debug!("Stream subscriber disconnected");
            return;
        }
    }
}

fn build_lot_response(context: &ApiState) -> LotResponse {
    let guard = match context.state.read() {
        Ok(guard) => guard,
        Err(_) => {
            return lot_internal_error("state lock poisoned while reading snapshot");
        }
    };
    let snapshot = guard.snapshot().cloned();
    drop(guard);

    match snapshot {
        Some(snapshot) => match format_timestamp(snapshot.timestamp) {
            Ok(formatted) => LotResponse::Success(LotSuccessResponse {
                occupied_spots: snapshot.occupied_spots,
                pricing: snapshot.pricing,
                timestamp: formatted,
            }),
            Err(_err) => lot_internal_error("timestamp formatting failure"),
        },
        None => no_data_response(SystemTime::now()),
    }
}

fn no_data_response(timestamp: SystemTime) -> LotResponse {
    match format_timestamp(timestamp) {
        Ok(formatted) => LotResponse::Error {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: LotErrorResponse {
                error_code: LotErrorCode::NoData,
                error_message: "No snapshot available yet".to_string(),
                timestamp: formatted,
            },
        },
        Err(_err) => lot_internal_error("timestamp formatting failure"),
    }
}

fn lot_internal_error(message: &str) -> LotResponse {
    error!(message = message, "Internal error while handling /api/lot");
    LotResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: LotErrorResponse {
            error_code: LotErrorCode::InternalError,
            error_message: INTERNAL_ERROR_MESSAGE.to_string(),
            timestamp: fallback_timestamp(),
        },
    }
}

fn build_health_response(context: &ApiState, now: SystemTime) -> HealthResponse {
    let guard = match context.state.read() {
        Ok(guard) => guard,
        Err(_) => {
            return health_internal_error("state lock poisoned while reading snapshot");
        }
    };
    let status = derive_health_status(guard.snapshot(), now);
    drop(guard);

    let timestamp = match format_timestamp(now) {
        Ok(formatted) => formatted,
        Err(_) => {
            return health_internal_error("timestamp formatting failure");
        }
    };

    let status_code = match status {
        HealthStatus::Ko => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Ok | HealthStatus::Degraded => StatusCode::OK,
    };

    HealthResponse::Success {
        status: status_code,
        body: HealthSuccessResponse { status, timestamp },
    }
}

fn derive_health_status(snapshot: Option<&Snapshot>, now: SystemTime) -> HealthStatus {
    match snapshot {
        None => HealthStatus::Ko,
        Some(snapshot) => match now.duration_since(snapshot.timestamp) {
            Ok(age) if age > STALE_AFTER => HealthStatus::Degraded,
            _ => HealthStatus::Ok,
        },
    }
}

fn health_internal_error(message: &str) -> HealthResponse {
    error!(message = message, "Internal error while handling /api/health");
    HealthResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: HealthErrorResponse {
            error_code: HealthErrorCode::InternalError,
            error_message: INTERNAL_ERROR_MESSAGE.to_string(),
            timestamp: fallback_timestamp(),
        },
    }
}

fn build_spots_response(context: &ApiState, now: SystemTime) -> SpotsResponse {
    let guard = match context.state.read() {
        Ok(guard) => guard,
        Err(_) => {
            return spots_internal_error("state lock poisoned while reading spots");
        }
    };
    let spots = guard
        .spots()
        .iter()
        .map(|spot| SpotResponse {
            name: spot.name.clone(),
            rect: spot.rect.corners(),
        })
        .collect();
    drop(guard);

    match format_timestamp(now) {
        Ok(formatted) => SpotsResponse::Success(SpotsSuccessResponse {
            spots,
            timestamp: formatted,
        }),
        Err(_) => spots_internal_error("timestamp formatting failure"),
    }
}

fn spots_internal_error(message: &str) -> SpotsResponse {
    error!(message = message, "Internal error while handling /api/spots");
    SpotsResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: SpotsErrorResponse {
            error_code: SpotsErrorCode::InternalError,
            error_message: INTERNAL_ERROR_MESSAGE.to_string(),
            timestamp: fallback_timestamp(),
        },
    }
}

fn format_timestamp(timestamp: SystemTime) -> Result<String, TimestampError> {
    let datetime = OffsetDateTime::from(timestamp);
    datetime.format(&Rfc3339).map_err(TimestampError::Format)
}

fn fallback_timestamp() -> String {
    format_timestamp(SystemTime::now()).unwrap_or_else(|err| {
        error!(error = %err, "Failed to format error timestamp");
        "1970-01-01T00:00:00Z".to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::lot::Spot;
    use crate::state::AppState;
    use std::collections::BTreeMap;
    use std::sync::{Arc, RwLock};
    use std::time::UNIX_EPOCH;

    fn context_with_spots(spots: Vec<Spot>) -> ApiState {
        ApiState {
            state: Arc::new(RwLock::new(AppState::new(spots))),
            tick: Duration::from_secs(1),
        }
    }

    fn snapshot(seconds: u64) -> Snapshot {
        Snapshot {
            occupied_spots: vec![true, false],
            pricing: BTreeMap::from([
                ("Slot1".to_string(), 1.8),
                ("Slot2".to_string(), 1.5),
            ]),
            timestamp: UNIX_EPOCH + Duration::from_secs(seconds),
        }
    }

    #[test]
    fn lot_response_reports_no_data_before_first_cycle() {
        let context = context_with_spots(Vec::new());

        let response = build_lot_response(&context);

        match response {
            LotResponse::Error { status, body } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(body.error_code, LotErrorCode::NoData);
            }
            LotResponse::Success(_) => panic!("expected error response"),
        }
    }

    #[test]
    fn lot_response_carries_latest_snapshot() {
        let context = context_with_spots(Vec::new());
        {
            let mut guard = context.state.write().expect("lock");
            guard.set_snapshot(snapshot(1_000)).expect("watch open");
        }

        let response = build_lot_response(&context);

        match response {
            LotResponse::Success(body) => {
                assert_eq!(body.occupied_spots, vec![true, false]);
                assert_eq!(body.pricing.get("Slot1"), Some(&1.8));
            }
            LotResponse::Error { .. } => panic!("expected success response"),
        }
    }

    #[test]
    fn health_is_ko_without_snapshot_and_ok_with_fresh_one() {
        let now = UNIX_EPOCH + Duration::from_secs(2_000);

        assert_eq!(derive_health_status(None, now), HealthStatus::Ko);

        let fresh = snapshot(1_990);
        assert_eq!(derive_health_status(Some(&fresh), now), HealthStatus::Ok);
    }

    #[test]
    fn health_degrades_when_snapshot_goes_stale() {
        let now = UNIX_EPOCH + Duration::from_secs(2_000);
        let stale = snapshot(1_000);

        assert_eq!(
            derive_health_status(Some(&stale), now),
            HealthStatus::Degraded
        );
    }

    #[test]
    fn spots_response_lists_configured_spots() {
        let context = context_with_spots(vec![Spot {
            name: "Slot1".to_string(),
            rect: Rect::new(100, 1000, 120, 1020),
        }]);

        let response = build_spots_response(&context, UNIX_EPOCH + Duration::from_secs(60));

        match response {
            SpotsResponse::Success(body) => {
                assert_eq!(body.spots.len(), 1);
                assert_eq!(body.spots[0].name, "Slot1");
                assert_eq!(body.spots[0].rect, [100, 1000, 120, 1020]);
            }
            SpotsResponse::Error { .. } => panic!("expected success response"),
        }
    }
}
