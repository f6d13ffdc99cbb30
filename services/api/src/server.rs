use crate::cli::ServeArgs;
use crate::infra::{
    AppState, DeterministicAppointmentBook, InMemoryPermitRepository, SimulatedCardGateway,
    StaticZoneDirectory,
};
use crate::routes::with_permit_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use permit_flow::config::AppConfig;
use permit_flow::error::AppError;
use permit_flow::telemetry;
use permit_flow::workflows::permit::PermitWorkflowService;
use std::sync::atomic::Ordering;
use std::sync::Arc;
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

    let repository = Arc::new(InMemoryPermitRepository::default());
    let gateway = Arc::new(SimulatedCardGateway::default());
    let appointments = Arc::new(DeterministicAppointmentBook::default());
    let zones = Arc::new(StaticZoneDirectory::default());
    let permit_service = Arc::new(PermitWorkflowService::new(
        repository,
        gateway,
        appointments,
        zones,
        config.workflow.clone(),
    ));

    let app = with_permit_routes(permit_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "business permit back office ready");

    axum::serve(listener, app).await?;
    Ok(())
}
