use lotwatch::{api, capture, config, detect, pipeline, state, store};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

fn init_tracing(level: &str) {
    let level = level.parse().unwrap_or(tracing::Level::INFO);
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_default()?;
    init_tracing(&config.logging.level);
    tracing::info!(
        config_path = config::DEFAULT_CONFIG_PATH,
        "lotwatch starting"
    );

    let spots = config.spots()?;
    tracing::info!(count = spots.len(), "Parking spots loaded");

    let state = Arc::new(RwLock::new(state::AppState::new(spots.clone())));

    let store = store::SqliteLotStore::open(config.storage_path())?;
    tracing::info!(path = %config.storage_path().display(), "Status/pricing store opened");

    // No real capture backend is wired in; the stub pairs with the replay
    // detector, which ignores frame content.
    tracing::warn!("No capture backend configured; using blank stub frames");
    let frame_source: Box<dyn capture::FrameSource + Send> =
        Box::new(capture::StubFrameSource::default());

    let detector = detect::create_detector(config.detector_source(), config.replay_path())?;
    tracing::info!(source = config.detector_source(), "Detector ready");

    let stop = Arc::new(AtomicBool::new(false));
    let settings = pipeline::CycleSettings {
        spots,
        filter: config.detection_filter(),
        pricing: config.pricing(),
    };
    tracing::info!(
        interval_ms = config.cycle_interval().as_millis(),
        "Starting detection loop"
    );
    let detection_handle = pipeline::spawn_detection_thread(
        frame_source,
        detector,
        Box::new(store),
        settings,
        Arc::clone(&state),
        config.cycle_interval(),
        Arc::clone(&stop),
    );

    let app = api::router(Arc::clone(&state), config.tick_interval());
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port()));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Signal the detection loop to stop and wait for the in-flight cycle.
    stop.store(true, Ordering::Relaxed);
    if detection_handle.join().is_err() {
        tracing::warn!("Detection thread panicked during shutdown");
    }
    tracing::info!("lotwatch stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
    }
}
