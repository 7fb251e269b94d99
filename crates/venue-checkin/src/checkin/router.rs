use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::broadcast::StatusBroadcaster;
use super::coordinator::{CheckinCoordinator, CheckinRequest, CoordinatorError};
use super::domain::{
    CandidateId, CheckinOutcome, ReleaseOutcome, Role, ScheduleId, VenueDefinition, VenueId,
    VenueStatus,
};
use super::ledger::{CheckinLedger, LedgerError};
use super::queue::QueueManager;
use super::registry::{RegistryError, VenueRegistry};
use super::token::{QrTokenService, TokenError};

/// Wiring for the HTTP surface: every component the handlers touch, behind
/// one shared state value.
pub struct CheckinApp<L: CheckinLedger> {
    pub registry: Arc<VenueRegistry>,
    pub queues: Arc<QueueManager>,
    pub tokens: Arc<QrTokenService>,
    pub coordinator: Arc<CheckinCoordinator<L>>,
    pub broadcaster: Arc<StatusBroadcaster>,
}

impl<L: CheckinLedger + 'static> CheckinApp<L> {
    /// Assemble the coordination core. The broadcaster subscribes to venue
    /// status changes so snapshot revisions advance with every transition.
    pub fn new(token_ttl_minutes: i64, ledger: Arc<L>) -> Arc<Self> {
        let registry = Arc::new(VenueRegistry::new());
        let queues = Arc::new(QueueManager::new());
        let tokens = Arc::new(QrTokenService::new(token_ttl_minutes));

        let broadcaster = Arc::new(StatusBroadcaster::new(registry.clone(), queues.clone()));
        registry.subscribe(broadcaster.clone());

        let coordinator = Arc::new(CheckinCoordinator::new(
            registry.clone(),
            queues.clone(),
            tokens.clone(),
            ledger,
        ));

        Arc::new(Self {
            registry,
            queues,
            tokens,
            coordinator,
            broadcaster,
        })
    }
}

/// Router builder exposing the check-in coordination endpoints.
pub fn checkin_router<L: CheckinLedger + 'static>(app: Arc<CheckinApp<L>>) -> Router {
    Router::new()
        .route(
            "/api/v1/public/venues/status",
            get(venues_status_handler::<L>),
        )
        .route("/api/v1/checkin", post(checkin_handler::<L>))
        .route(
            "/api/v1/candidates/:candidate_id/queue-position",
            get(queue_position_handler::<L>),
        )
        .route(
            "/api/v1/candidates/:candidate_id/qrcode",
            get(qrcode_handler::<L>),
        )
        .route("/api/v1/venues", post(register_venue_handler::<L>))
        .route(
            "/api/v1/venues/:venue_id/status",
            put(set_status_handler::<L>),
        )
        .route(
            "/api/v1/venues/:venue_id/release",
            post(release_handler::<L>),
        )
        .with_state(app)
}

/// Bearer token and role claim attached by the upstream identity service.
/// Identity issuance is external; this service only enforces role gates.
struct AuthContext {
    bearer: Option<String>,
    role: Option<Role>,
}

impl AuthContext {
    fn authenticated(&self) -> bool {
        self.bearer.is_some()
    }

    fn is_staff(&self) -> bool {
        self.authenticated() && self.role == Some(Role::Staff)
    }
}

fn auth_context(headers: &HeaderMap) -> AuthContext {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    let role = headers
        .get("x-auth-role")
        .and_then(|value| value.to_str().ok())
        .and_then(Role::from_claim);

    AuthContext { bearer, role }
}

fn error_body(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    let payload = json!({
        "code": code,
        "message": message.into(),
    });
    (status, Json(payload)).into_response()
}

fn unauthorized() -> Response {
    error_body(
        StatusCode::UNAUTHORIZED,
        "auth_required",
        "a bearer token is required",
    )
}

fn staff_required() -> Response {
    error_body(
        StatusCode::FORBIDDEN,
        "staff_role_required",
        "the staff role is required for this operation",
    )
}

fn coordinator_error(err: CoordinatorError) -> Response {
    let message = err.to_string();
    match err {
        CoordinatorError::Token(TokenError::Expired { .. }) => {
            error_body(StatusCode::UNAUTHORIZED, "token_expired", message)
        }
        CoordinatorError::Token(TokenError::AlreadyConsumed { .. }) => {
            error_body(StatusCode::CONFLICT, "already_consumed", message)
        }
        CoordinatorError::Token(TokenError::Unknown) => {
            error_body(StatusCode::UNAUTHORIZED, "token_unknown", message)
        }
        CoordinatorError::StaffOnly => {
            error_body(StatusCode::FORBIDDEN, "staff_role_required", message)
        }
        CoordinatorError::VenueUnavailable => {
            error_body(StatusCode::CONFLICT, "venue_unavailable", message)
        }
        CoordinatorError::AlreadyQueued => {
            error_body(StatusCode::CONFLICT, "already_queued", message)
        }
        CoordinatorError::AlreadyCheckedIn => {
            error_body(StatusCode::CONFLICT, "already_checked_in", message)
        }
        CoordinatorError::NotOccupied => {
            error_body(StatusCode::CONFLICT, "venue_not_occupied", message)
        }
        CoordinatorError::VenueNotFound => {
            error_body(StatusCode::NOT_FOUND, "venue_not_found", message)
        }
        CoordinatorError::Ledger(LedgerError::Unavailable(_)) => {
            error_body(StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable", message)
        }
    }
}

fn registry_error(err: RegistryError) -> Response {
    let message = err.to_string();
    match err {
        RegistryError::NotFound => error_body(StatusCode::NOT_FOUND, "venue_not_found", message),
        RegistryError::AlreadyRegistered => {
            error_body(StatusCode::CONFLICT, "venue_exists", message)
        }
        RegistryError::ZeroCapacity => {
            error_body(StatusCode::BAD_REQUEST, "invalid_capacity", message)
        }
        RegistryError::OccupiedIsDerived => {
            error_body(StatusCode::CONFLICT, "occupied_is_derived", message)
        }
        RegistryError::VenueDisabled => error_body(StatusCode::CONFLICT, "venue_disabled", message),
        RegistryError::OccupantPresent => {
            error_body(StatusCode::CONFLICT, "occupant_present", message)
        }
    }
}

pub(crate) async fn venues_status_handler<L>(
    State(app): State<Arc<CheckinApp<L>>>,
    headers: HeaderMap,
) -> Response
where
    L: CheckinLedger + 'static,
{
    let auth = auth_context(&headers);
    let snapshot = app.broadcaster.snapshot();
    let snapshot = if auth.is_staff() {
        snapshot
    } else {
        snapshot.redacted()
    };
    (StatusCode::OK, Json(snapshot)).into_response()
}

#[derive(Debug, Deserialize)]
pub(crate) struct CheckinSubmission {
    pub(crate) venue_id: String,
    #[serde(default)]
    pub(crate) token: Option<String>,
    #[serde(default)]
    pub(crate) candidate_id: Option<String>,
    #[serde(default)]
    pub(crate) schedule_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CheckinResponse {
    pub(crate) success: bool,
    pub(crate) message: String,
    pub(crate) new_status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) position: Option<usize>,
}

pub(crate) async fn checkin_handler<L>(
    State(app): State<Arc<CheckinApp<L>>>,
    headers: HeaderMap,
    Json(submission): Json<CheckinSubmission>,
) -> Response
where
    L: CheckinLedger + 'static,
{
    let auth = auth_context(&headers);
    if !auth.authenticated() {
        return unauthorized();
    }
    let caller = auth.role.unwrap_or(Role::Candidate);

    if submission.venue_id.trim().is_empty() {
        return error_body(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "venue_id must not be empty",
        );
    }
    let venue_id = VenueId(submission.venue_id);

    let request = match (
        submission.token,
        submission.candidate_id,
        submission.schedule_id,
    ) {
        (Some(raw), None, None) => CheckinRequest::Token { raw },
        (None, Some(candidate_id), Some(schedule_id)) => CheckinRequest::Manual {
            candidate_id: CandidateId(candidate_id),
            schedule_id: ScheduleId(schedule_id),
        },
        _ => {
            return error_body(
                StatusCode::BAD_REQUEST,
                "validation_error",
                "provide either a token, or a candidate_id plus schedule_id",
            )
        }
    };

    match app.coordinator.perform_checkin(request, &venue_id, caller) {
        Ok(CheckinOutcome::CheckedIn { venue }) => {
            let response = CheckinResponse {
                success: true,
                message: format!("checked in to {}", venue.name),
                new_status: venue.status.label(),
                position: None,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(CheckinOutcome::Queued { venue, position }) => {
            let response = CheckinResponse {
                success: true,
                message: format!("venue occupied; waiting at position {position}"),
                new_status: venue.status.label(),
                position: Some(position),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => coordinator_error(err),
    }
}

pub(crate) async fn queue_position_handler<L>(
    State(app): State<Arc<CheckinApp<L>>>,
    headers: HeaderMap,
    Path(candidate_id): Path<String>,
) -> Response
where
    L: CheckinLedger + 'static,
{
    let auth = auth_context(&headers);
    if !auth.authenticated() {
        return unauthorized();
    }

    let candidate_id = CandidateId(candidate_id);
    let payload = match app.coordinator.queue_position(&candidate_id) {
        Some((venue_id, position)) => json!({
            "candidate_id": candidate_id,
            "venue_id": venue_id,
            "position": position,
        }),
        None => json!({
            "candidate_id": candidate_id,
            "venue_id": serde_json::Value::Null,
            "position": serde_json::Value::Null,
        }),
    };
    (StatusCode::OK, Json(payload)).into_response()
}

#[derive(Debug, Deserialize)]
pub(crate) struct QrCodeParams {
    #[serde(default)]
    pub(crate) schedule_id: Option<String>,
}

pub(crate) async fn qrcode_handler<L>(
    State(app): State<Arc<CheckinApp<L>>>,
    headers: HeaderMap,
    Path(candidate_id): Path<String>,
    Query(params): Query<QrCodeParams>,
) -> Response
where
    L: CheckinLedger + 'static,
{
    let auth = auth_context(&headers);
    if !auth.authenticated() {
        return unauthorized();
    }

    let schedule_id = match params.schedule_id {
        Some(schedule_id) if !schedule_id.trim().is_empty() => schedule_id,
        _ => {
            return error_body(
                StatusCode::BAD_REQUEST,
                "validation_error",
                "schedule_id query parameter is required",
            )
        }
    };

    let issued = app
        .tokens
        .issue(&CandidateId(candidate_id), &ScheduleId(schedule_id));
    let payload = json!({
        "token": issued.token,
        "expires_at": issued.expires_at,
    });
    (StatusCode::OK, Json(payload)).into_response()
}

pub(crate) async fn register_venue_handler<L>(
    State(app): State<Arc<CheckinApp<L>>>,
    headers: HeaderMap,
    Json(definition): Json<VenueDefinition>,
) -> Response
where
    L: CheckinLedger + 'static,
{
    let auth = auth_context(&headers);
    if !auth.authenticated() {
        return unauthorized();
    }
    if !auth.is_staff() {
        return staff_required();
    }

    if definition.id.0.trim().is_empty() || definition.name.trim().is_empty() {
        return error_body(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "venue id and name must not be empty",
        );
    }

    match app.registry.register(definition) {
        Ok(venue) => (StatusCode::CREATED, Json(venue)).into_response(),
        Err(err) => registry_error(err),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SetStatusRequest {
    pub(crate) status: VenueStatus,
}

pub(crate) async fn set_status_handler<L>(
    State(app): State<Arc<CheckinApp<L>>>,
    headers: HeaderMap,
    Path(venue_id): Path<String>,
    Json(body): Json<SetStatusRequest>,
) -> Response
where
    L: CheckinLedger + 'static,
{
    let auth = auth_context(&headers);
    if !auth.authenticated() {
        return unauthorized();
    }
    if !auth.is_staff() {
        return staff_required();
    }

    match app.registry.set_status(&VenueId(venue_id), body.status) {
        Ok(venue) => (StatusCode::OK, Json(venue)).into_response(),
        Err(err) => registry_error(err),
    }
}

pub(crate) async fn release_handler<L>(
    State(app): State<Arc<CheckinApp<L>>>,
    headers: HeaderMap,
    Path(venue_id): Path<String>,
) -> Response
where
    L: CheckinLedger + 'static,
{
    let auth = auth_context(&headers);
    if !auth.authenticated() {
        return unauthorized();
    }
    if !auth.is_staff() {
        return staff_required();
    }

    match app.coordinator.release(&VenueId(venue_id)) {
        Ok(ReleaseOutcome::Promoted {
            venue,
            candidate_id,
        }) => {
            let payload = json!({
                "success": true,
                "message": format!("promoted {} from the queue", candidate_id.0),
                "new_status": venue.status.label(),
                "promoted_candidate": candidate_id,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Ok(ReleaseOutcome::Vacated { venue }) => {
            let payload = json!({
                "success": true,
                "message": "venue released".to_string(),
                "new_status": venue.status.label(),
                "promoted_candidate": serde_json::Value::Null,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => coordinator_error(err),
    }
}
