use freshcart_api::{
    config::{init_tracing, load_config},
    db::establish_connection_from_app_config,
    events::{process_events, EventSender},
    payments::{HostedPaymentClient, PaymentGateway},
    services::AppServices,
    AppState,
};
use axum::{http::StatusCode, routing::get, Router};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = load_config()?;
    init_tracing(cfg.log_level(), cfg.log_json);

    let config = Arc::new(cfg);

    let db = Arc::new(establish_connection_from_app_config(&config).await?);

    // Domain event channel with a logging consumer.
    let (event_tx, event_rx) = tokio::sync::mpsc::channel(1024);
    let event_sender = Arc::new(EventSender::new(event_tx));
    tokio::spawn(process_events(event_rx));

    let gateway: Arc<dyn PaymentGateway> = Arc::new(HostedPaymentClient::new(
        config.payment_gateway_url.clone(),
        config.payment_gateway_secret.clone(),
    ));

    let services = AppServices::new(
        db.clone(),
        event_sender.clone(),
        gateway,
        config.clone(),
    );

    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        event_sender,
        services,
    });

    // Reservation expiry sweep: releases checkouts whose payment sheet was
    // abandoned past the configured TTL.
    let sweeper = state.services.checkout.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(60));
        loop {
            tick.tick().await;
            match sweeper.release_expired().await {
                Ok(0) => {}
                Ok(n) => info!(released = n, "Expired checkout sessions released"),
                Err(e) => tracing::warn!("Checkout expiry sweep failed: {}", e),
            }
        }
    });

    let app = Router::new()
        .route("/", get(|| async { "freshcart-api up" }))
        .route("/health", get(|| async { StatusCode::OK }))
        .nest("/api/v1", freshcart_api::api_v1_routes())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let addr = SocketAddr::new(config.host.parse()?, config.port);
    info!("freshcart-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => tracing::error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
