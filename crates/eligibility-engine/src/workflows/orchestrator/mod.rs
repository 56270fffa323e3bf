//! Coordinates the verification and enrollment machines per consumer, commits their
//! results atomically and hands outbound events to the dispatcher.

mod dispatch;
mod events;
mod locks;
mod memory;
mod repository;
pub mod router;
mod service;

pub use dispatch::{DispatchReport, EventDispatcher, IntegrationEventPublisher, PublishError};
pub use events::{
    AdminVerificationOverride, ConsumerRegistration, CoveragePurchased, EnrollmentAction,
    EnrollmentActionKind, EnrollmentActionParams, EnrollmentRequest, IntegrationEvent,
    OverrideAction, SensitiveFieldChanged, VerificationResponse, VerificationResponseReceived,
    WorkflowOutcome,
};
pub use locks::EntityLocks;
pub use memory::MemoryWorkflowRepository;
pub use repository::{
    AwaitingUpstream, CommitBatch, ConsumerRecord, ConsumerStatusView, EnrollmentRecord,
    EnrollmentStatusView, PendingRequest, RepositoryError, VersionedWrite, WorkflowRepository,
};
pub use router::workflow_router;
pub use service::{WorkflowError, WorkflowOrchestrator};

#[cfg(test)]
mod tests;
