use std::sync::Arc;

use tracing::{debug, warn};

use super::events::IntegrationEvent;

/// Delivery seam for outbound events (message bus, webhook, log sink).
pub trait IntegrationEventPublisher: Send + Sync {
    fn publish(&self, event: &IntegrationEvent) -> Result<(), PublishError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("transport failure: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Delivers committed events after the orchestrator call has returned. A failed delivery
/// is reported, never rolled back into workflow state.
pub struct EventDispatcher<P> {
    publisher: Arc<P>,
}

impl<P> EventDispatcher<P>
where
    P: IntegrationEventPublisher,
{
    pub fn new(publisher: Arc<P>) -> Self {
        Self { publisher }
    }

    pub fn publisher(&self) -> &Arc<P> {
        &self.publisher
    }

    pub fn dispatch(&self, events: &[IntegrationEvent]) -> DispatchReport {
        let mut report = DispatchReport::default();
        for event in events {
            match self.publisher.publish(event) {
                Ok(()) => {
                    debug!(event = event.name(), "integration event delivered");
                    report.delivered += 1;
                }
                Err(err) => {
                    warn!(event = event.name(), error = %err, "integration event delivery failed");
                    report.failed += 1;
                }
            }
        }
        report
    }
}
