use chrono::NaiveDate;
use eligibility_engine::workflows::eligibility::EligibilityConfig;
use eligibility_engine::workflows::orchestrator::{
    IntegrationEvent, IntegrationEventPublisher, PublishError,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Publishes integration events to the service log until a broker is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct LoggingEventPublisher;

impl IntegrationEventPublisher for LoggingEventPublisher {
    fn publish(&self, event: &IntegrationEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_string(event)
            .map_err(|err| PublishError::Transport(err.to_string()))?;
        info!(event = event.name(), %payload, "integration event published");
        Ok(())
    }
}

pub(crate) fn default_eligibility_config() -> EligibilityConfig {
    EligibilityConfig::default()
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
