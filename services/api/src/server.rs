use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryCheckinLedger};
use crate::routes::with_checkin_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use venue_checkin::checkin::CheckinApp;
use venue_checkin::config::AppConfig;
use venue_checkin::error::AppError;
use venue_checkin::telemetry;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let ledger = Arc::new(InMemoryCheckinLedger::default());
    let checkin_app = CheckinApp::new(config.tokens.ttl_minutes, ledger);

    let app = with_checkin_routes(checkin_app)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "venue check-in coordinator ready");

    axum::serve(listener, app).await?;
    Ok(())
}
