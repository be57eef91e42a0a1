use crate::error::AppError;
use crate::lot::Spot;
use std::collections::BTreeMap;
use std::time::SystemTime;
use tokio::sync::watch;

/// The single published view of the lot: occupancy vector in spot order plus
/// the current price per spot. Replaced wholesale each detection cycle;
/// subscribers only ever see completed snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub occupied_spots: Vec<bool>,
    pub pricing: BTreeMap<String, f64>,
    pub timestamp: SystemTime,
}

/// Shared application state. The detection loop is the sole writer; API
/// handlers and stream subscribers are readers only.
#[derive(Debug)]
pub struct AppState {
    spots: Vec<Spot>,
    snapshot: Option<Snapshot>,
    snapshot_tx: watch::Sender<Option<Snapshot>>,
    snapshot_rx: watch::Receiver<Option<Snapshot>>,
}

impl AppState {
    pub fn new(spots: Vec<Spot>) -> Self {
        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        Self {
            spots,
            snapshot: None,
            snapshot_tx,
            snapshot_rx,
        }
    }

    pub fn spots(&self) -> &[Spot] {
        &self.spots
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    /// Hand out a receiver that always holds the most recently published
    /// snapshot. Late subscribers see the current value immediately.
    pub fn subscribe_snapshot(&self) -> watch::Receiver<Option<Snapshot>> {
        self.snapshot_rx.clone()
    }

    pub fn set_snapshot(&mut self, snapshot: Snapshot) -> Result<(), AppError> {
        self.snapshot = Some(snapshot.clone());
        self.snapshot_tx
            .send(Some(snapshot))
            .map_err(|_| AppError::WatchSend)
    }
}
