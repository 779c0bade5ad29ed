use anyhow::{Context, Result};

use fanrelay::config::Config;
use fanrelay::metrics;
use fanrelay::server::RelayServer;

/// Run the relay server until Ctrl+C or SIGTERM
pub async fn serve(mut config: Config, bind: Option<String>) -> Result<()> {
    if let Some(bind) = bind {
        config.server.bind_address = bind
            .parse()
            .with_context(|| format!("Invalid bind address: {bind}"))?;
    }
    config.validate().context("Invalid configuration")?;

    if let Err(e) = metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics initialization failed, continuing without metrics");
    }

    let server = RelayServer::new(config.clone()).context("Failed to create relay server")?;

    println!("Starting Relay Server");
    println!("=====================");
    println!("{}", server.info().display());
    println!("  Worker Threads: {}", config.runtime.worker_threads);
    println!("  Backend Service: {}", config.handler.backend_service);
    let mut services: Vec<_> = config.services.iter().collect();
    services.sort_by(|a, b| a.0.cmp(b.0));
    for (service, locations) in services {
        let locations: Vec<String> = locations.iter().map(ToString::to_string).collect();
        println!("  Service {service}: {}", locations.join(" -> "));
    }
    println!();
    println!("API Endpoints:");
    println!("  GET /brave/echo/{{text}}      - Echo text three times");
    println!("  GET /brave/delay/{{age}}      - Answer after a delay");
    println!("  GET /brave/call/{{how_many}}  - Fan out echo calls (default 3)");
    println!("  GET /health                 - Health check");
    println!("  GET /metrics                - Prometheus metrics endpoint");
    println!();
    println!("Relay server listening on http://{}", config.server.bind_address);
    println!("Press Ctrl+C to stop.\n");

    let result = server.start_with_shutdown(shutdown_signal()).await;

    // pending scheduled work is cancelled, in-flight work is not awaited
    server.shutdown();
    result.context("Relay server failed")?;

    println!("Relay server stopped.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received Ctrl+C, shutting down..."),
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C"),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
                tracing::info!("Received SIGTERM, shutting down...");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
