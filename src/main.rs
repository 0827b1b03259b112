//! CareSync coordination server.
//!
//! Runs the HTTP API and the WebSocket notification endpoint in one process,
//! plus the periodic escalation sweeper. HTTP handlers translate requests
//! into core status-engine calls, persist the result, and hand the resulting
//! fan-out instruction to the dispatcher; notification delivery is
//! best-effort and never affects the outcome of the originating action.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::{Json, Response},
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use caresync_core::{
    sweeper, ActorIdentity, ActorRole, ChannelType, Consultation, ConsultationAction,
    CoordinationError, EntityStore, Feedback, FeedbackKind, HealthReport, MemoryStore, Ratings,
    Referral, ReferralPriority, ReportStatus, ReportUrgency, Severity, UrgencyLevel,
};
use caresync_realtime::{Dispatcher, IdentityResolver, RoomRegistry, TokenTable};

/// Outbound queue depth per WebSocket connection. A connection that falls
/// this far behind starts shedding events rather than stalling dispatch.
const EVENT_QUEUE_DEPTH: usize = 64;

/// Application state shared across handlers.
///
/// The room registry is a single explicit service object injected into both
/// the connection-accepting WebSocket handler and (through the dispatcher)
/// every transition-calling handler.
#[derive(Clone)]
struct AppState {
    store: Arc<MemoryStore>,
    registry: Arc<RoomRegistry>,
    dispatcher: Dispatcher,
    resolver: Arc<TokenTable>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        create_consultation,
        respond_consultation,
        cancel_consultation,
        complete_consultation,
        create_referral,
        accept_referral,
        start_referral,
        complete_referral,
        cancel_referral,
        add_referral_note,
        create_report,
        set_report_status,
        set_report_scores,
        create_feedback,
        respond_feedback,
    ),
    components(schemas(
        CreateConsultationReq,
        RespondConsultationReq,
        ActorReq,
        CreateReferralReq,
        ProviderReq,
        AddNoteReq,
        CreateReportReq,
        SetReportStatusReq,
        SetReportScoresReq,
        CreateFeedbackReq,
        RespondFeedbackReq,
    ))
)]
struct ApiDoc;

/// Main entry point for the CareSync server.
///
/// # Environment Variables
/// - `CARESYNC_ADDR`: server address (default: "0.0.0.0:3000")
/// - `CARESYNC_SWEEP_INTERVAL_SECS`: escalation sweeper cadence (default: 60)
/// - `CARESYNC_TOKENS`: comma-separated `token:uuid:role:Display Name`
///   entries loaded into the identity token table at startup
///
/// # Errors
/// Returns an error if the tracing configuration cannot be initialised or
/// the server address cannot be bound.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("caresync_run=info".parse()?)
                .add_directive("caresync_core=info".parse()?)
                .add_directive("caresync_realtime=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("CARESYNC_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let sweep_interval = std::env::var("CARESYNC_SWEEP_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(60);

    tracing::info!("++ Starting CareSync on {}", addr);

    let resolver = Arc::new(load_token_table(
        &std::env::var("CARESYNC_TOKENS").unwrap_or_default(),
    ));
    let registry = Arc::new(RoomRegistry::new());
    let state = AppState {
        store: Arc::new(MemoryStore::new()),
        registry: registry.clone(),
        dispatcher: Dispatcher::new(registry),
        resolver,
    };

    let sweeper_state = state.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(sweep_interval));
        loop {
            ticker.tick().await;
            run_sweep(&sweeper_state);
        }
    });

    let app = Router::new()
        .route("/health", get(health))
        .route("/consultations", post(create_consultation))
        .route("/consultations/:id/respond", post(respond_consultation))
        .route("/consultations/:id/cancel", post(cancel_consultation))
        .route("/consultations/:id/complete", post(complete_consultation))
        .route("/referrals", post(create_referral))
        .route("/referrals/:id/accept", post(accept_referral))
        .route("/referrals/:id/start", post(start_referral))
        .route("/referrals/:id/complete", post(complete_referral))
        .route("/referrals/:id/cancel", post(cancel_referral))
        .route("/referrals/:id/notes", post(add_referral_note))
        .route("/reports", post(create_report))
        .route("/reports/:id/status", put(set_report_status))
        .route("/reports/:id/scores", put(set_report_scores))
        .route("/feedback", post(create_feedback))
        .route("/feedback/:id/response", post(respond_feedback))
        .route("/ws", get(ws_connect))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// One pass of the escalation sweeper.
///
/// Auto-completes scheduled consultations past their end and escalates
/// overdue pending referrals one step, dispatching the matching events.
/// Failures to persist are logged and retried on the next tick.
fn run_sweep(state: &AppState) {
    let now = Utc::now();

    for consultation in state.store.list_consultations() {
        if let Some(completed) = sweeper::sweep_consultation(&consultation, now) {
            match state.store.save_consultation(completed) {
                Ok(saved) => {
                    state.dispatcher.dispatch(
                        saved.patient,
                        "consultation:completed",
                        json!({ "consultation": saved }),
                        "Your consultation has ended",
                    );
                }
                Err(e) => tracing::error!("Sweep save consultation error: {:?}", e),
            }
        }
    }

    for referral in state.store.list_referrals() {
        if let Some(escalated) = sweeper::sweep_referral(&referral, now) {
            match state.store.save_referral(escalated) {
                Ok(saved) => {
                    state.dispatcher.dispatch(
                        saved.referring_provider,
                        "referral:escalated",
                        json!({ "referral": saved }),
                        &format!(
                            "Referral escalated to {} priority, {} urgency",
                            saved.priority.as_str(),
                            saved.urgency.as_str()
                        ),
                    );
                }
                Err(e) => tracing::error!("Sweep save referral error: {:?}", e),
            }
        }
    }
}

/// Maps a core error to an HTTP rejection. Transition violations are
/// conflicts; delivery problems never show up here because dispatch failures
/// do not propagate.
fn reject(context: &str, e: CoordinationError) -> (StatusCode, String) {
    let status = match e {
        CoordinationError::InvalidTransition { .. } => StatusCode::CONFLICT,
        CoordinationError::NotFound { .. } => StatusCode::NOT_FOUND,
        CoordinationError::InvalidInput(_)
        | CoordinationError::InvalidScheduleWindow
        | CoordinationError::RatingOutOfRange => StatusCode::BAD_REQUEST,
    };
    if status == StatusCode::CONFLICT {
        tracing::warn!("{context}: {e}");
    } else {
        tracing::error!("{context}: {e}");
    }
    (status, e.to_string())
}

/// Parses a snake_case enum value the same way the entity serialisation
/// writes it.
fn parse_enum<T: serde::de::DeserializeOwned>(value: &str) -> Option<T> {
    serde_json::from_value(Value::String(value.to_string())).ok()
}

fn parse_enum_or_400<T: serde::de::DeserializeOwned>(
    field: &str,
    value: &str,
) -> Result<T, (StatusCode, String)> {
    parse_enum(value).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            format!("invalid {field}: {value}"),
        )
    })
}

/// Loads the identity token table from its configuration string. Entries are
/// `token:uuid:role:Display Name`, comma-separated; malformed entries are
/// logged and skipped.
fn load_token_table(value: &str) -> TokenTable {
    let table = TokenTable::new();
    for entry in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let mut parts = entry.splitn(4, ':');
        let parsed = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(token), Some(id), Some(role), Some(name)) => Uuid::parse_str(id)
                .ok()
                .zip(parse_enum::<ActorRole>(role))
                .map(|(id, role)| (token, ActorIdentity::new(id, role, name))),
            _ => None,
        };
        match parsed {
            Some((token, identity)) => table.insert(token, identity),
            None => tracing::warn!("skipping malformed token entry"),
        }
    }
    table
}

// ---------------------------------------------------------------------------
// WebSocket endpoint
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct WsQuery {
    token: Option<String>,
}

/// Accepts a notification WebSocket connection.
///
/// The identity token is resolved once, before the upgrade, and must not
/// block establishment: a missing or unresolvable token degrades the
/// connection to anonymous instead of rejecting it. Anonymous connections
/// are registered but receive nothing, since every event is targeted.
async fn ws_connect(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    upgrade: WebSocketUpgrade,
) -> Response {
    let identity = query
        .token
        .as_deref()
        .and_then(|token| state.resolver.from_token(token));
    if identity.is_none() {
        tracing::info!("unresolved identity, accepting connection as anonymous");
    }
    upgrade.on_upgrade(move |socket| pump_events(socket, state, identity))
}

/// Registers the connection and pumps queued events to the socket until
/// either side closes. Unregistration is idempotent, so any exit path may
/// run it.
async fn pump_events(mut socket: WebSocket, state: AppState, identity: Option<ActorIdentity>) {
    let (tx, mut events) = mpsc::channel(EVENT_QUEUE_DEPTH);
    let identity_id = identity.map(|i| i.id);
    let connection = state.registry.register(identity_id, tx);

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let Ok(text) = serde_json::to_string(&event) else {
                    tracing::warn!(%connection, "failed to serialise event, dropping");
                    continue;
                };
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            inbound = socket.recv() => {
                match inbound {
                    // Inbound frames are ignored; the stream is server-to-client.
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }

    state.registry.unregister(identity_id, connection);
    tracing::debug!(%connection, "connection closed");
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response")
    )
)]
/// Health check endpoint used for monitoring and load balancer checks.
async fn health(State(_state): State<AppState>) -> Json<Value> {
    Json(json!({ "ok": true, "message": "CareSync is alive" }))
}

// ---------------------------------------------------------------------------
// Consultations
// ---------------------------------------------------------------------------

#[derive(Deserialize, ToSchema)]
struct CreateConsultationReq {
    patient_id: Uuid,
    patient_name: String,
    provider_id: Uuid,
    /// One of "video", "audio", "chat".
    channel: String,
    scheduled_start: Option<DateTime<Utc>>,
    scheduled_end: Option<DateTime<Utc>>,
}

#[derive(Deserialize, ToSchema)]
struct RespondConsultationReq {
    provider_id: Uuid,
    provider_name: String,
    accept: bool,
}

/// Acting-actor fields carried on generic transition requests.
#[derive(Deserialize, ToSchema)]
struct ActorReq {
    actor_id: Uuid,
    /// One of "patient", "provider", "reporter".
    actor_role: String,
    actor_name: String,
}

impl ActorReq {
    fn identity(&self) -> Result<ActorIdentity, (StatusCode, String)> {
        let role = parse_enum_or_400::<ActorRole>("actor_role", &self.actor_role)?;
        Ok(ActorIdentity::new(self.actor_id, role, self.actor_name.clone()))
    }
}

#[utoipa::path(
    post,
    path = "/consultations",
    request_body = CreateConsultationReq,
    responses(
        (status = 200, description = "Consultation requested"),
        (status = 400, description = "Bad request")
    )
)]
/// Creates a consultation request on behalf of a patient and notifies the
/// provider.
async fn create_consultation(
    State(state): State<AppState>,
    Json(req): Json<CreateConsultationReq>,
) -> Result<Json<Consultation>, (StatusCode, String)> {
    let channel = parse_enum_or_400::<ChannelType>("channel", &req.channel)?;
    let patient = ActorIdentity::new(req.patient_id, ActorRole::Patient, req.patient_name);

    let (consultation, notify) = Consultation::request(
        &patient,
        req.provider_id,
        channel,
        req.scheduled_start,
        req.scheduled_end,
        Utc::now(),
    )
    .map_err(|e| reject("Create consultation", e))?;

    let saved = state
        .store
        .save_consultation(consultation)
        .map_err(|e| reject("Save consultation", e))?;
    state
        .dispatcher
        .dispatch_notify(&notify, json!({ "consultation": saved }));
    Ok(Json(saved))
}

#[utoipa::path(
    post,
    path = "/consultations/{id}/respond",
    request_body = RespondConsultationReq,
    responses(
        (status = 200, description = "Consultation responded"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Invalid transition")
    )
)]
/// Provider accepts or denies a requested consultation; the patient is
/// notified either way.
async fn respond_consultation(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
    Json(req): Json<RespondConsultationReq>,
) -> Result<Json<Consultation>, (StatusCode, String)> {
    let provider = ActorIdentity::new(req.provider_id, ActorRole::Provider, req.provider_name);
    let action = if req.accept {
        ConsultationAction::RespondAccept
    } else {
        ConsultationAction::RespondDeny
    };
    apply_consultation(&state, id, action, &provider).await
}

#[utoipa::path(
    post,
    path = "/consultations/{id}/cancel",
    request_body = ActorReq,
    responses(
        (status = 200, description = "Consultation cancelled"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Invalid transition")
    )
)]
/// Either participant cancels a consultation that is not yet terminal.
async fn cancel_consultation(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
    Json(req): Json<ActorReq>,
) -> Result<Json<Consultation>, (StatusCode, String)> {
    let actor = req.identity()?;
    apply_consultation(&state, id, ConsultationAction::Cancel, &actor).await
}

#[utoipa::path(
    post,
    path = "/consultations/{id}/complete",
    request_body = RespondConsultationReq,
    responses(
        (status = 200, description = "Consultation completed"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Invalid transition")
    )
)]
/// Provider explicitly marks a scheduled consultation as completed.
async fn complete_consultation(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
    Json(req): Json<RespondConsultationReq>,
) -> Result<Json<Consultation>, (StatusCode, String)> {
    let provider = ActorIdentity::new(req.provider_id, ActorRole::Provider, req.provider_name);
    apply_consultation(&state, id, ConsultationAction::MarkCompleted, &provider).await
}

/// Shared load-transition-save-dispatch path for consultation actions.
async fn apply_consultation(
    state: &AppState,
    id: Uuid,
    action: ConsultationAction,
    actor: &ActorIdentity,
) -> Result<Json<Consultation>, (StatusCode, String)> {
    let consultation = state
        .store
        .load_consultation(id)
        .map_err(|e| reject("Load consultation", e))?;
    let (next, notify) = consultation
        .transition(action, actor, Utc::now())
        .map_err(|e| reject("Consultation transition", e))?;
    let saved = state
        .store
        .save_consultation(next)
        .map_err(|e| reject("Save consultation", e))?;
    state
        .dispatcher
        .dispatch_notify(&notify, json!({ "consultation": saved }));
    Ok(Json(saved))
}

// ---------------------------------------------------------------------------
// Referrals
// ---------------------------------------------------------------------------

#[derive(Deserialize, ToSchema)]
struct CreateReferralReq {
    patient_id: Uuid,
    referring_provider_id: Uuid,
    referring_provider_name: String,
    referred_to_provider_id: Option<Uuid>,
    kind: String,
    specialty: String,
    /// One of "routine", "urgent", "emergency".
    priority: String,
    /// One of "low", "medium", "high", "critical".
    urgency: String,
    deadline: Option<DateTime<Utc>>,
}

#[derive(Deserialize, ToSchema)]
struct ProviderReq {
    provider_id: Uuid,
    provider_name: String,
}

impl ProviderReq {
    fn identity(&self) -> ActorIdentity {
        ActorIdentity::new(self.provider_id, ActorRole::Provider, self.provider_name.clone())
    }
}

#[derive(Deserialize, ToSchema)]
struct AddNoteReq {
    actor_id: Uuid,
    actor_role: String,
    actor_name: String,
    body: String,
}

#[utoipa::path(
    post,
    path = "/referrals",
    request_body = CreateReferralReq,
    responses(
        (status = 200, description = "Referral created"),
        (status = 400, description = "Bad request")
    )
)]
/// Raises a referral; a named receiving provider is notified immediately.
async fn create_referral(
    State(state): State<AppState>,
    Json(req): Json<CreateReferralReq>,
) -> Result<Json<Referral>, (StatusCode, String)> {
    let priority = parse_enum_or_400::<ReferralPriority>("priority", &req.priority)?;
    let urgency = parse_enum_or_400::<UrgencyLevel>("urgency", &req.urgency)?;
    let referring = ActorIdentity::new(
        req.referring_provider_id,
        ActorRole::Provider,
        req.referring_provider_name,
    );

    let (referral, notify) = Referral::create(
        &referring,
        req.patient_id,
        req.referred_to_provider_id,
        req.kind,
        req.specialty,
        priority,
        urgency,
        req.deadline,
        Utc::now(),
    );
    let saved = state
        .store
        .save_referral(referral)
        .map_err(|e| reject("Save referral", e))?;
    if let Some(notify) = notify {
        state
            .dispatcher
            .dispatch_notify(&notify, json!({ "referral": saved }));
    }
    Ok(Json(saved))
}

#[utoipa::path(
    post,
    path = "/referrals/{id}/accept",
    request_body = ProviderReq,
    responses(
        (status = 200, description = "Referral accepted"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Invalid transition")
    )
)]
/// Receiving provider accepts a pending referral.
async fn accept_referral(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
    Json(req): Json<ProviderReq>,
) -> Result<Json<Referral>, (StatusCode, String)> {
    let actor = req.identity();
    let referral = state
        .store
        .load_referral(id)
        .map_err(|e| reject("Load referral", e))?;
    let (next, notify) = referral
        .accept(&actor, Utc::now())
        .map_err(|e| reject("Accept referral", e))?;
    save_and_notify_referral(&state, next, Some(notify))
}

#[utoipa::path(
    post,
    path = "/referrals/{id}/start",
    request_body = ProviderReq,
    responses(
        (status = 200, description = "Referral started"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Invalid transition")
    )
)]
/// Accepting provider starts work on an accepted referral.
async fn start_referral(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
    Json(req): Json<ProviderReq>,
) -> Result<Json<Referral>, (StatusCode, String)> {
    let actor = req.identity();
    let referral = state
        .store
        .load_referral(id)
        .map_err(|e| reject("Load referral", e))?;
    let (next, notify) = referral
        .start(&actor, Utc::now())
        .map_err(|e| reject("Start referral", e))?;
    save_and_notify_referral(&state, next, Some(notify))
}

#[utoipa::path(
    post,
    path = "/referrals/{id}/complete",
    request_body = ProviderReq,
    responses(
        (status = 200, description = "Referral completed"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Invalid transition")
    )
)]
/// Accepting provider completes the referral.
async fn complete_referral(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
    Json(req): Json<ProviderReq>,
) -> Result<Json<Referral>, (StatusCode, String)> {
    let actor = req.identity();
    let referral = state
        .store
        .load_referral(id)
        .map_err(|e| reject("Load referral", e))?;
    let (next, notify) = referral
        .complete(&actor, Utc::now())
        .map_err(|e| reject("Complete referral", e))?;
    save_and_notify_referral(&state, next, Some(notify))
}

#[utoipa::path(
    post,
    path = "/referrals/{id}/cancel",
    request_body = ProviderReq,
    responses(
        (status = 200, description = "Referral cancelled"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Invalid transition")
    )
)]
/// Referring provider cancels a referral that is not yet terminal.
async fn cancel_referral(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
    Json(req): Json<ProviderReq>,
) -> Result<Json<Referral>, (StatusCode, String)> {
    let actor = req.identity();
    let referral = state
        .store
        .load_referral(id)
        .map_err(|e| reject("Load referral", e))?;
    let (next, notify) = referral
        .cancel(&actor, Utc::now())
        .map_err(|e| reject("Cancel referral", e))?;
    save_and_notify_referral(&state, next, notify)
}

#[utoipa::path(
    post,
    path = "/referrals/{id}/notes",
    request_body = AddNoteReq,
    responses(
        (status = 200, description = "Note appended"),
        (status = 400, description = "Bad request"),
        (status = 404, description = "Not found")
    )
)]
/// Appends a note to the referral's append-only note log.
async fn add_referral_note(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
    Json(req): Json<AddNoteReq>,
) -> Result<Json<Referral>, (StatusCode, String)> {
    let role = parse_enum_or_400::<ActorRole>("actor_role", &req.actor_role)?;
    let actor = ActorIdentity::new(req.actor_id, role, req.actor_name);
    let referral = state
        .store
        .load_referral(id)
        .map_err(|e| reject("Load referral", e))?;
    let next = referral
        .add_note(&actor, req.body, Utc::now())
        .map_err(|e| reject("Add referral note", e))?;
    save_and_notify_referral(&state, next, None)
}

fn save_and_notify_referral(
    state: &AppState,
    referral: Referral,
    notify: Option<caresync_core::Notify>,
) -> Result<Json<Referral>, (StatusCode, String)> {
    let saved = state
        .store
        .save_referral(referral)
        .map_err(|e| reject("Save referral", e))?;
    if let Some(notify) = notify {
        state
            .dispatcher
            .dispatch_notify(&notify, json!({ "referral": saved }));
    }
    Ok(Json(saved))
}

// ---------------------------------------------------------------------------
// Health reports
// ---------------------------------------------------------------------------

#[derive(Deserialize, ToSchema)]
struct CreateReportReq {
    reporter_id: Uuid,
    reporter_name: String,
    kind: String,
    /// One of "low", "medium", "high", "critical".
    severity: String,
    /// One of "routine", "urgent", "emergency".
    urgency: String,
}

#[derive(Deserialize, ToSchema)]
struct SetReportStatusReq {
    actor_id: Uuid,
    actor_name: String,
    /// One of "pending", "investigating", "confirmed", "resolved",
    /// "false_alarm".
    status: String,
    notes: Option<String>,
}

#[derive(Deserialize, ToSchema)]
struct SetReportScoresReq {
    actor_id: Uuid,
    actor_name: String,
    severity: Option<String>,
    urgency: Option<String>,
}

#[utoipa::path(
    post,
    path = "/reports",
    request_body = CreateReportReq,
    responses(
        (status = 200, description = "Report created"),
        (status = 400, description = "Bad request")
    )
)]
/// Files a community health report; priority is derived from severity and
/// urgency, and the reporter gets a receipt event.
async fn create_report(
    State(state): State<AppState>,
    Json(req): Json<CreateReportReq>,
) -> Result<Json<HealthReport>, (StatusCode, String)> {
    let severity = parse_enum_or_400::<Severity>("severity", &req.severity)?;
    let urgency = parse_enum_or_400::<ReportUrgency>("urgency", &req.urgency)?;
    let reporter = ActorIdentity::new(req.reporter_id, ActorRole::Reporter, req.reporter_name);

    let (report, notify) = HealthReport::create(&reporter, req.kind, severity, urgency, Utc::now());
    let saved = state
        .store
        .save_report(report)
        .map_err(|e| reject("Save report", e))?;
    state
        .dispatcher
        .dispatch_notify(&notify, json!({ "report": saved }));
    Ok(Json(saved))
}

#[utoipa::path(
    put,
    path = "/reports/{id}/status",
    request_body = SetReportStatusReq,
    responses(
        (status = 200, description = "Report status updated"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Invalid transition")
    )
)]
/// Moves a report through its investigation lifecycle, including the
/// explicitly supported resolved-to-pending undo.
async fn set_report_status(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
    Json(req): Json<SetReportStatusReq>,
) -> Result<Json<HealthReport>, (StatusCode, String)> {
    let status = parse_enum_or_400::<ReportStatus>("status", &req.status)?;
    let actor = ActorIdentity::new(req.actor_id, ActorRole::Provider, req.actor_name);
    let report = state
        .store
        .load_report(id)
        .map_err(|e| reject("Load report", e))?;
    let (next, notify) = report
        .set_status(status, &actor, req.notes, Utc::now())
        .map_err(|e| reject("Set report status", e))?;
    let saved = state
        .store
        .save_report(next)
        .map_err(|e| reject("Save report", e))?;
    state
        .dispatcher
        .dispatch_notify(&notify, json!({ "report": saved }));
    Ok(Json(saved))
}

#[utoipa::path(
    put,
    path = "/reports/{id}/scores",
    request_body = SetReportScoresReq,
    responses(
        (status = 200, description = "Report severity/urgency updated"),
        (status = 400, description = "Bad request"),
        (status = 404, description = "Not found")
    )
)]
/// Updates severity and/or urgency; the derived priority is recomputed as
/// part of the same change.
async fn set_report_scores(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
    Json(req): Json<SetReportScoresReq>,
) -> Result<Json<HealthReport>, (StatusCode, String)> {
    let actor = ActorIdentity::new(req.actor_id, ActorRole::Provider, req.actor_name);
    let mut report = state
        .store
        .load_report(id)
        .map_err(|e| reject("Load report", e))?;

    if let Some(severity) = req.severity.as_deref() {
        let severity = parse_enum_or_400::<Severity>("severity", severity)?;
        report = report.set_severity(severity, &actor, Utc::now());
    }
    if let Some(urgency) = req.urgency.as_deref() {
        let urgency = parse_enum_or_400::<ReportUrgency>("urgency", urgency)?;
        report = report.set_urgency(urgency, &actor, Utc::now());
    }

    let saved = state
        .store
        .save_report(report)
        .map_err(|e| reject("Save report", e))?;
    Ok(Json(saved))
}

// ---------------------------------------------------------------------------
// Feedback
// ---------------------------------------------------------------------------

#[derive(Deserialize, ToSchema)]
struct CreateFeedbackReq {
    patient_id: Uuid,
    patient_name: String,
    provider_id: Option<Uuid>,
    /// One of "medication", "care_quality", "service", "facility", "other".
    kind: String,
    rating_overall: u8,
    rating_communication: Option<u8>,
    rating_timeliness: Option<u8>,
    rating_professionalism: Option<u8>,
    rating_effectiveness: Option<u8>,
}

#[derive(Deserialize, ToSchema)]
struct RespondFeedbackReq {
    responder_id: Uuid,
    responder_name: String,
    content: String,
}

#[utoipa::path(
    post,
    path = "/feedback",
    request_body = CreateFeedbackReq,
    responses(
        (status = 200, description = "Feedback created"),
        (status = 400, description = "Bad request")
    )
)]
/// Submits patient feedback; priority is derived from the ratings.
async fn create_feedback(
    State(state): State<AppState>,
    Json(req): Json<CreateFeedbackReq>,
) -> Result<Json<Feedback>, (StatusCode, String)> {
    let kind = parse_enum_or_400::<FeedbackKind>("kind", &req.kind)?;
    let ratings = Ratings::new(
        req.rating_overall,
        req.rating_communication,
        req.rating_timeliness,
        req.rating_professionalism,
        req.rating_effectiveness,
    )
    .map_err(|e| reject("Create feedback", e))?;
    let patient = ActorIdentity::new(req.patient_id, ActorRole::Patient, req.patient_name);

    let feedback = Feedback::create(&patient, req.provider_id, kind, ratings, Utc::now());
    let saved = state
        .store
        .save_feedback(feedback)
        .map_err(|e| reject("Save feedback", e))?;
    Ok(Json(saved))
}

#[utoipa::path(
    post,
    path = "/feedback/{id}/response",
    request_body = RespondFeedbackReq,
    responses(
        (status = 200, description = "Feedback responded"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Invalid transition")
    )
)]
/// Records a provider response, moving the feedback to addressed and
/// notifying the patient.
async fn respond_feedback(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
    Json(req): Json<RespondFeedbackReq>,
) -> Result<Json<Feedback>, (StatusCode, String)> {
    let responder = ActorIdentity::new(req.responder_id, ActorRole::Provider, req.responder_name);
    let feedback = state
        .store
        .load_feedback(id)
        .map_err(|e| reject("Load feedback", e))?;
    let (next, notify) = feedback
        .respond(&responder, req.content, Utc::now())
        .map_err(|e| reject("Respond feedback", e))?;
    let saved = state
        .store
        .save_feedback(next)
        .map_err(|e| reject("Save feedback", e))?;
    state
        .dispatcher
        .dispatch_notify(&notify, json!({ "feedback": saved }));
    Ok(Json(saved))
}
