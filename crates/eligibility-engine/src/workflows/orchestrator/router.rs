use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};

use super::dispatch::{EventDispatcher, IntegrationEventPublisher};
use super::events::{
    AdminVerificationOverride, ConsumerRegistration, CoveragePurchased, EnrollmentAction,
    EnrollmentRequest, SensitiveFieldChanged, VerificationResponseReceived, WorkflowOutcome,
};
use super::service::{WorkflowError, WorkflowOrchestrator};
use super::WorkflowRepository;
use crate::workflows::audit::EntityKind;
use crate::workflows::enrollment::EnrollmentId;
use crate::workflows::verification::ConsumerId;

const DEFAULT_SWEEP_LIMIT: usize = 500;

/// Shared handler state: the orchestrator plus the dispatcher that delivers its events.
pub struct WorkflowState<R, P> {
    orchestrator: Arc<WorkflowOrchestrator<R>>,
    dispatcher: Arc<EventDispatcher<P>>,
}

impl<R, P> Clone for WorkflowState<R, P> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: Arc::clone(&self.orchestrator),
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }
}

/// Router builder exposing the consumer, enrollment and audit endpoints.
pub fn workflow_router<R, P>(
    orchestrator: Arc<WorkflowOrchestrator<R>>,
    dispatcher: Arc<EventDispatcher<P>>,
) -> Router
where
    R: WorkflowRepository + 'static,
    P: IntegrationEventPublisher + 'static,
{
    Router::new()
        .route("/api/v1/consumers", post(register_consumer_handler::<R, P>))
        .route(
            "/api/v1/consumers/:consumer_id",
            get(consumer_status_handler::<R, P>),
        )
        .route(
            "/api/v1/consumers/:consumer_id/coverage-purchases",
            post(coverage_purchase_handler::<R, P>),
        )
        .route(
            "/api/v1/consumers/:consumer_id/verification-responses",
            post(verification_response_handler::<R, P>),
        )
        .route(
            "/api/v1/consumers/:consumer_id/admin-overrides",
            post(admin_override_handler::<R, P>),
        )
        .route(
            "/api/v1/consumers/:consumer_id/sensitive-fields",
            post(sensitive_field_handler::<R, P>),
        )
        .route("/api/v1/enrollments", post(open_enrollment_handler::<R, P>))
        .route(
            "/api/v1/enrollments/:enrollment_id",
            get(enrollment_status_handler::<R, P>),
        )
        .route(
            "/api/v1/enrollments/:enrollment_id/actions",
            post(enrollment_action_handler::<R, P>),
        )
        .route(
            "/api/v1/audit/:entity_kind/:entity_id",
            get(audit_trail_handler::<R, P>),
        )
        .route(
            "/api/v1/verification-periods/expirations",
            post(expiration_sweep_handler::<R, P>),
        )
        .with_state(WorkflowState {
            orchestrator,
            dispatcher,
        })
}

/// Status code for a workflow failure.
pub fn status_for(error: &WorkflowError) -> StatusCode {
    match error {
        WorkflowError::ConsumerNotFound(_) | WorkflowError::EnrollmentNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        WorkflowError::InvalidTransition { .. }
        | WorkflowError::ConcurrentModification { .. }
        | WorkflowError::StaleIdentity { .. } => StatusCode::CONFLICT,
        WorkflowError::InconsistentLedger { .. }
        | WorkflowError::InvalidIdentity(_)
        | WorkflowError::MissingParameter { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        WorkflowError::AdminRequired { .. } => StatusCode::FORBIDDEN,
        WorkflowError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: &WorkflowError) -> Response {
    let payload = json!({
        "error": error.to_string(),
    });
    (status_for(error), axum::Json(payload)).into_response()
}

fn unprocessable(message: String) -> Response {
    let payload = json!({
        "error": message,
    });
    (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
}

/// Merge the path identifier into the request body, then decode the inbound message.
fn decode_with_path_id<T>(mut body: Value, key: &str, id: String) -> Result<T, Response>
where
    T: DeserializeOwned,
{
    match body.as_object_mut() {
        Some(object) => {
            object.insert(key.to_string(), Value::String(id));
        }
        None => return Err(unprocessable("request body must be a JSON object".to_string())),
    }
    serde_json::from_value(body).map_err(|err| unprocessable(err.to_string()))
}

fn mutation_response<P>(
    dispatcher: &EventDispatcher<P>,
    result: Result<WorkflowOutcome, WorkflowError>,
    success: StatusCode,
) -> Response
where
    P: IntegrationEventPublisher,
{
    match result {
        Ok(outcome) => {
            dispatcher.dispatch(&outcome.events);
            (success, axum::Json(outcome)).into_response()
        }
        Err(error) => error_response(&error),
    }
}

fn view_response<T: Serialize>(result: Result<T, WorkflowError>) -> Response {
    match result {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => error_response(&error),
    }
}

pub(crate) async fn register_consumer_handler<R, P>(
    State(state): State<WorkflowState<R, P>>,
    axum::Json(registration): axum::Json<ConsumerRegistration>,
) -> Response
where
    R: WorkflowRepository + 'static,
    P: IntegrationEventPublisher + 'static,
{
    let result = state.orchestrator.register_consumer(registration);
    mutation_response(&state.dispatcher, result, StatusCode::CREATED)
}

pub(crate) async fn consumer_status_handler<R, P>(
    State(state): State<WorkflowState<R, P>>,
    Path(consumer_id): Path<String>,
) -> Response
where
    R: WorkflowRepository + 'static,
    P: IntegrationEventPublisher + 'static,
{
    view_response(state.orchestrator.consumer_status(&ConsumerId(consumer_id)))
}

pub(crate) async fn coverage_purchase_handler<R, P>(
    State(state): State<WorkflowState<R, P>>,
    Path(consumer_id): Path<String>,
    axum::Json(body): axum::Json<Value>,
) -> Response
where
    R: WorkflowRepository + 'static,
    P: IntegrationEventPublisher + 'static,
{
    let purchase: CoveragePurchased = match decode_with_path_id(body, "consumer_id", consumer_id) {
        Ok(purchase) => purchase,
        Err(response) => return response,
    };
    let result = state.orchestrator.purchase_coverage(purchase);
    mutation_response(&state.dispatcher, result, StatusCode::OK)
}

pub(crate) async fn verification_response_handler<R, P>(
    State(state): State<WorkflowState<R, P>>,
    Path(consumer_id): Path<String>,
    axum::Json(body): axum::Json<Value>,
) -> Response
where
    R: WorkflowRepository + 'static,
    P: IntegrationEventPublisher + 'static,
{
    let message: VerificationResponseReceived =
        match decode_with_path_id(body, "consumer_id", consumer_id) {
            Ok(message) => message,
            Err(response) => return response,
        };
    let result = state.orchestrator.handle_verification_response(message);
    mutation_response(&state.dispatcher, result, StatusCode::OK)
}

pub(crate) async fn admin_override_handler<R, P>(
    State(state): State<WorkflowState<R, P>>,
    Path(consumer_id): Path<String>,
    axum::Json(body): axum::Json<Value>,
) -> Response
where
    R: WorkflowRepository + 'static,
    P: IntegrationEventPublisher + 'static,
{
    let message: AdminVerificationOverride =
        match decode_with_path_id(body, "consumer_id", consumer_id) {
            Ok(message) => message,
            Err(response) => return response,
        };
    let result = state.orchestrator.handle_admin_override(message);
    mutation_response(&state.dispatcher, result, StatusCode::OK)
}

pub(crate) async fn sensitive_field_handler<R, P>(
    State(state): State<WorkflowState<R, P>>,
    Path(consumer_id): Path<String>,
    axum::Json(body): axum::Json<Value>,
) -> Response
where
    R: WorkflowRepository + 'static,
    P: IntegrationEventPublisher + 'static,
{
    let message: SensitiveFieldChanged =
        match decode_with_path_id(body, "consumer_id", consumer_id) {
            Ok(message) => message,
            Err(response) => return response,
        };
    let result = state.orchestrator.handle_sensitive_field_change(message);
    mutation_response(&state.dispatcher, result, StatusCode::OK)
}

pub(crate) async fn open_enrollment_handler<R, P>(
    State(state): State<WorkflowState<R, P>>,
    axum::Json(request): axum::Json<EnrollmentRequest>,
) -> Response
where
    R: WorkflowRepository + 'static,
    P: IntegrationEventPublisher + 'static,
{
    let result = state.orchestrator.open_enrollment(request);
    mutation_response(&state.dispatcher, result, StatusCode::CREATED)
}

pub(crate) async fn enrollment_status_handler<R, P>(
    State(state): State<WorkflowState<R, P>>,
    Path(enrollment_id): Path<String>,
) -> Response
where
    R: WorkflowRepository + 'static,
    P: IntegrationEventPublisher + 'static,
{
    view_response(
        state
            .orchestrator
            .enrollment_status(&EnrollmentId(enrollment_id)),
    )
}

pub(crate) async fn enrollment_action_handler<R, P>(
    State(state): State<WorkflowState<R, P>>,
    Path(enrollment_id): Path<String>,
    axum::Json(body): axum::Json<Value>,
) -> Response
where
    R: WorkflowRepository + 'static,
    P: IntegrationEventPublisher + 'static,
{
    let action: EnrollmentAction = match decode_with_path_id(body, "enrollment_id", enrollment_id)
    {
        Ok(action) => action,
        Err(response) => return response,
    };
    let result = state.orchestrator.handle_enrollment_action(action);
    mutation_response(&state.dispatcher, result, StatusCode::OK)
}

pub(crate) async fn audit_trail_handler<R, P>(
    State(state): State<WorkflowState<R, P>>,
    Path((entity_kind, entity_id)): Path<(String, String)>,
) -> Response
where
    R: WorkflowRepository + 'static,
    P: IntegrationEventPublisher + 'static,
{
    let kind: EntityKind = match entity_kind.parse() {
        Ok(kind) => kind,
        Err(error) => {
            let payload = json!({
                "error": format!("{error}"),
            });
            return (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response();
        }
    };
    view_response(state.orchestrator.audit_trail(kind, &entity_id))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SweepParams {
    limit: Option<usize>,
}

pub(crate) async fn expiration_sweep_handler<R, P>(
    State(state): State<WorkflowState<R, P>>,
    Query(params): Query<SweepParams>,
) -> Response
where
    R: WorkflowRepository + 'static,
    P: IntegrationEventPublisher + 'static,
{
    let limit = params.limit.unwrap_or(DEFAULT_SWEEP_LIMIT);
    match state.orchestrator.expire_verification_periods(limit) {
        Ok(outcomes) => {
            for outcome in &outcomes {
                state.dispatcher.dispatch(&outcome.events);
            }
            let expired: Vec<_> = outcomes
                .iter()
                .filter_map(|outcome| outcome.consumer.as_ref())
                .map(|record| record.consumer_id.clone())
                .collect();
            let payload = json!({
                "expired": expired,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(&error),
    }
}
