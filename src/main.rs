use signal_equity::simulation::{TelemetrySimulator, spawn_simulation};
use signal_equity::state::AppState;
use signal_equity::{api, config};
use std::net::SocketAddr;
use std::sync::Arc;

fn init_tracing(level: tracing::Level) {
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_default()?;
    init_tracing(config.log_level());
    tracing::info!(
        config_path = config::DEFAULT_CONFIG_PATH,
        app = %config.app.name,
        "signal-equity starting"
    );

    let state = AppState::new().into_shared();

    let settings = config.simulation_settings();
    let simulator = TelemetrySimulator::new(&settings);
    let simulation = spawn_simulation(Arc::clone(&state), simulator, &settings);

    let app = api::router(api::ApiState {
        shared: Arc::clone(&state),
        scenario_profile: config.scenario_profile(),
    });
    let port = config.server_port();
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    simulation.stop().await;
    served?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
