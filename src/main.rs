//! aqi-monitor: air quality dashboard and forecast service.
//!
//! Single-binary Tokio application that:
//! 1. Loads per-city pollutant series (station CSVs, synthetic fallback)
//! 2. Serves dashboard aggregates and forecasts over HTTP
//! 3. Sweeps expired cache entries in the background

mod config;
mod server;

use std::future::IntoFuture;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use common::config::MAX_SYNTHETIC_SAMPLES;
use common::{SharedClock, SystemClock};
use dashboard::{spawn_sweep_task, DashboardRequest};

/// Air quality dashboard and forecast service
#[derive(Parser)]
#[command(name = "aqi-monitor", about = "Air quality dashboard and forecast service")]
struct Cli {
    /// Config file (defaults to ./config.toml when present).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print the dashboard JSON for one city and exit.
    #[arg(long, value_name = "CITY")]
    once: Option<String>,

    /// Write one synthetic CSV per known city into DIR and exit. Also writes
    /// Stations_Info.csv when no station directory is configured.
    #[arg(long, value_name = "DIR")]
    write_samples: Option<PathBuf>,

    /// Hourly readings per file for --write-samples.
    #[arg(long, default_value_t = 5000)]
    samples: usize,
}

#[tokio::main]
async fn main() {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "aqi_monitor=info,dashboard=info,station_data=info,client_log=info".into()
            }),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    info!("AQI monitor starting up...");

    // Load configuration.
    let cfg = match config::load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let clock: SharedClock = Arc::new(SystemClock);
    let state = server::AppState::new(&cfg, clock);

    // ── One-shot modes ───────────────────────────────────────────────
    if let Some(dir) = cli.write_samples {
        if cli.samples == 0 || cli.samples > MAX_SYNTHETIC_SAMPLES {
            error!("--samples must be between 1 and {}", MAX_SYNTHETIC_SAMPLES);
            std::process::exit(1);
        }
        match state.aggregator.write_samples(&dir, cli.samples) {
            Ok(paths) => info!("Wrote {} sample files to {}", paths.len(), dir.display()),
            Err(e) => {
                error!("Failed to write samples: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    if let Some(city) = cli.once {
        let request = DashboardRequest {
            city: Some(city),
            ..DashboardRequest::default()
        };
        let rendered = state
            .aggregator
            .dashboard(&request)
            .and_then(|payload| serde_json::to_string_pretty(&payload).map_err(Into::into));
        match rendered {
            Ok(json) => println!("{json}"),
            Err(e) => {
                error!("Dashboard failed [{}]: {}", e.code(), e);
                std::process::exit(1);
            }
        }
        return;
    }

    // ── Background sweep ─────────────────────────────────────────────
    let mut sweep_handle = spawn_sweep_task(
        state.cache.clone(),
        Duration::from_secs(cfg.cache.sweep_interval_secs),
        cfg.cache.max_age_secs,
    );
    info!(
        "Background cleanup task started (every {}s, max age {}s)",
        cfg.cache.sweep_interval_secs, cfg.cache.max_age_secs
    );

    // ── HTTP server ──────────────────────────────────────────────────
    let addr = format!("{}:{}", cfg.server.host, cfg.server.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    info!("Listening on http://{}", addr);

    let app = server::router(state);
    let serve = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
        })
        .into_future();

    // ── Wait for shutdown ────────────────────────────────────────────
    tokio::select! {
        r = serve => {
            if let Err(e) = r {
                error!("HTTP server error: {}", e);
            }
        }
        r = &mut sweep_handle => {
            error!("Cache sweep task exited: {:?}", r);
        }
    }

    sweep_handle.abort();
    info!("AQI monitor stopped");
}
