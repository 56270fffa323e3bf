use crate::cli::ServeArgs;
use crate::infra::{default_eligibility_config, AppState, LoggingEventPublisher};
use crate::routes::with_operational_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use eligibility_engine::clock::SystemClock;
use eligibility_engine::config::AppConfig;
use eligibility_engine::error::AppError;
use eligibility_engine::telemetry;
use eligibility_engine::workflows::orchestrator::{
    workflow_router, EventDispatcher, MemoryWorkflowRepository, WorkflowOrchestrator,
};
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

    let orchestrator = Arc::new(WorkflowOrchestrator::new(
        Arc::new(MemoryWorkflowRepository::new()),
        Arc::new(SystemClock),
        config.workflow,
        default_eligibility_config(),
    ));
    let dispatcher = Arc::new(EventDispatcher::new(Arc::new(LoggingEventPublisher)));

    let app = with_operational_routes(workflow_router(orchestrator, dispatcher))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        verification_period_days = config.workflow.verification_period_days,
        "eligibility engine ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
