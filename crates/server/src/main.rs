use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use shared::{
    domain::{ComplaintId, MemberId, NoticeId, PaymentId, SocietyId},
    protocol::{
        AmenityView, ApplicantView, ComplaintPatch, ComplaintRequest, ComplaintView,
        InitiatePaymentRequest, LoginRequest, LoginResponse, MaintenanceSettingsRequest,
        MaintenanceView, NoticeRequest, NoticeView, PaymentStatusUpdate, PaymentView,
        PendingPaymentView, RegisterRequest, Registration, ResidentPatch, ResidentView,
        SaveAmenitiesRequest, SetupStatus, SocietyDetailsRequest, SocietyView,
    },
};
use society_api::{ApiContext, Argon2JwtCredentials};
use storage::Storage;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;

use app_state::{reject, AppState, HttpError, Session};
use config::{load_settings, prepare_database_url, DEV_JWT_SECRET};

type HttpResult<T> = Result<Json<T>, HttpError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetupStatusQuery {
    secretary_id: Option<MemberId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryQuery {
    resident_id: Option<MemberId>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings();
    if settings.jwt_secret == DEV_JWT_SECRET {
        warn!("JWT_SECRET is not set; using the development signing secret");
    }

    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let api = ApiContext {
        storage,
        credentials: Arc::new(Argon2JwtCredentials::new(
            settings.jwt_secret,
            settings.token_ttl_seconds,
        )),
    };

    let app = build_router(Arc::new(AppState { api }), settings.max_body_bytes);

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/societies", get(list_societies))
        .route("/api/societies/setup-status", get(setup_status))
        .route("/api/societies/by-secretary", get(my_society))
        .route("/api/societies/details", post(save_society_details))
        .route("/api/societies/maintenance", post(save_maintenance))
        .route("/api/societies/amenities", post(save_amenities))
        .route("/api/societies/:society_id/maintenance", get(maintenance))
        .route("/api/societies/:society_id/amenities", get(amenities))
        .route("/api/societies/:society_id/residents", get(residents))
        .route("/api/residents/:resident_id", put(update_resident))
        .route("/api/pending-users", get(pending_users))
        .route("/api/pending-users/:applicant_id/approve", post(approve))
        .route("/api/pending-users/:applicant_id/reject", post(reject_applicant))
        .route("/api/payments/initiate", post(initiate_payment))
        .route("/api/payments/pending", get(pending_payments))
        .route("/api/payments/history", get(payment_history))
        .route("/api/payments/:payment_id/status", put(set_payment_status))
        .route("/api/notices", post(create_notice).get(list_notices))
        .route(
            "/api/notices/:notice_id",
            put(update_notice).delete(delete_notice),
        )
        .route("/api/complaints", post(create_complaint).get(list_complaints))
        .route(
            "/api/complaints/:complaint_id",
            put(update_complaint).delete(delete_complaint),
        )
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    match state.api.storage.health_check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(error) => {
            error!(%error, "health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "storage unavailable")
        }
    }
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Registration>), HttpError> {
    let registration = society_api::register(&state.api, &req)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(registration)))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> HttpResult<LoginResponse> {
    society_api::login(&state.api, &req)
        .await
        .map(Json)
        .map_err(reject)
}

async fn list_societies(State(state): State<Arc<AppState>>) -> HttpResult<Vec<SocietyView>> {
    society_api::list_societies(&state.api)
        .await
        .map(Json)
        .map_err(reject)
}

async fn setup_status(
    State(state): State<Arc<AppState>>,
    Session(actor): Session,
    Query(q): Query<SetupStatusQuery>,
) -> HttpResult<SetupStatus> {
    let secretary_id = q.secretary_id.unwrap_or(actor.member_id);
    society_api::setup_status(&state.api, &actor, secretary_id)
        .await
        .map(Json)
        .map_err(reject)
}

async fn my_society(
    State(state): State<Arc<AppState>>,
    Session(actor): Session,
) -> HttpResult<SocietyView> {
    society_api::society_for_secretary(&state.api, &actor)
        .await
        .map(Json)
        .map_err(reject)
}

async fn save_society_details(
    State(state): State<Arc<AppState>>,
    Session(actor): Session,
    Json(req): Json<SocietyDetailsRequest>,
) -> HttpResult<SocietyView> {
    society_api::save_society_details(&state.api, &actor, &req)
        .await
        .map(Json)
        .map_err(reject)
}

async fn save_maintenance(
    State(state): State<Arc<AppState>>,
    Session(actor): Session,
    Json(req): Json<MaintenanceSettingsRequest>,
) -> HttpResult<MaintenanceView> {
    society_api::save_maintenance_settings(&state.api, &actor, &req)
        .await
        .map(Json)
        .map_err(reject)
}

async fn save_amenities(
    State(state): State<Arc<AppState>>,
    Session(actor): Session,
    Json(req): Json<SaveAmenitiesRequest>,
) -> HttpResult<Vec<AmenityView>> {
    society_api::save_amenities(&state.api, &actor, req)
        .await
        .map(Json)
        .map_err(reject)
}

async fn maintenance(
    State(state): State<Arc<AppState>>,
    Session(actor): Session,
    Path(society_id): Path<SocietyId>,
) -> HttpResult<MaintenanceView> {
    society_api::maintenance_settings(&state.api, &actor, society_id)
        .await
        .map(Json)
        .map_err(reject)
}

async fn amenities(
    State(state): State<Arc<AppState>>,
    Session(actor): Session,
    Path(society_id): Path<SocietyId>,
) -> HttpResult<Vec<AmenityView>> {
    society_api::list_amenities(&state.api, &actor, society_id)
        .await
        .map(Json)
        .map_err(reject)
}

async fn residents(
    State(state): State<Arc<AppState>>,
    Session(actor): Session,
    Path(society_id): Path<SocietyId>,
) -> HttpResult<Vec<ResidentView>> {
    society_api::list_residents(&state.api, &actor, society_id)
        .await
        .map(Json)
        .map_err(reject)
}

async fn update_resident(
    State(state): State<Arc<AppState>>,
    Session(actor): Session,
    Path(resident_id): Path<MemberId>,
    Json(patch): Json<ResidentPatch>,
) -> HttpResult<ResidentView> {
    society_api::update_resident(&state.api, &actor, resident_id, &patch)
        .await
        .map(Json)
        .map_err(reject)
}

async fn pending_users(
    State(state): State<Arc<AppState>>,
    Session(actor): Session,
) -> HttpResult<Vec<ApplicantView>> {
    society_api::list_applicants(&state.api, &actor)
        .await
        .map(Json)
        .map_err(reject)
}

async fn approve(
    State(state): State<Arc<AppState>>,
    Session(actor): Session,
    Path(applicant_id): Path<MemberId>,
) -> HttpResult<ResidentView> {
    society_api::admit_applicant(&state.api, &actor, applicant_id)
        .await
        .map(Json)
        .map_err(reject)
}

async fn reject_applicant(
    State(state): State<Arc<AppState>>,
    Session(actor): Session,
    Path(applicant_id): Path<MemberId>,
) -> Result<StatusCode, HttpError> {
    society_api::reject_applicant(&state.api, &actor, applicant_id)
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn initiate_payment(
    State(state): State<Arc<AppState>>,
    Session(actor): Session,
    Json(req): Json<InitiatePaymentRequest>,
) -> Result<(StatusCode, Json<PaymentView>), HttpError> {
    let payment = society_api::initiate_payment(&state.api, &actor, &req)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(payment)))
}

async fn set_payment_status(
    State(state): State<Arc<AppState>>,
    Session(actor): Session,
    Path(payment_id): Path<PaymentId>,
    Json(update): Json<PaymentStatusUpdate>,
) -> HttpResult<PaymentView> {
    society_api::set_payment_status(&state.api, &actor, payment_id, update.status)
        .await
        .map(Json)
        .map_err(reject)
}

async fn pending_payments(
    State(state): State<Arc<AppState>>,
    Session(actor): Session,
) -> HttpResult<Vec<PendingPaymentView>> {
    society_api::list_pending_payments(&state.api, &actor)
        .await
        .map(Json)
        .map_err(reject)
}

async fn payment_history(
    State(state): State<Arc<AppState>>,
    Session(actor): Session,
    Query(q): Query<HistoryQuery>,
) -> HttpResult<Vec<PaymentView>> {
    let resident_id = q.resident_id.unwrap_or(actor.member_id);
    society_api::payment_history(&state.api, &actor, resident_id)
        .await
        .map(Json)
        .map_err(reject)
}

async fn create_notice(
    State(state): State<Arc<AppState>>,
    Session(actor): Session,
    Json(req): Json<NoticeRequest>,
) -> Result<(StatusCode, Json<NoticeView>), HttpError> {
    let notice = society_api::create_notice(&state.api, &actor, &req)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(notice)))
}

async fn list_notices(
    State(state): State<Arc<AppState>>,
    Session(actor): Session,
) -> HttpResult<Vec<NoticeView>> {
    society_api::list_notices(&state.api, &actor)
        .await
        .map(Json)
        .map_err(reject)
}

async fn update_notice(
    State(state): State<Arc<AppState>>,
    Session(actor): Session,
    Path(notice_id): Path<NoticeId>,
    Json(req): Json<NoticeRequest>,
) -> HttpResult<NoticeView> {
    society_api::update_notice(&state.api, &actor, notice_id, &req)
        .await
        .map(Json)
        .map_err(reject)
}

async fn delete_notice(
    State(state): State<Arc<AppState>>,
    Session(actor): Session,
    Path(notice_id): Path<NoticeId>,
) -> Result<StatusCode, HttpError> {
    society_api::delete_notice(&state.api, &actor, notice_id)
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_complaint(
    State(state): State<Arc<AppState>>,
    Session(actor): Session,
    Json(req): Json<ComplaintRequest>,
) -> Result<(StatusCode, Json<ComplaintView>), HttpError> {
    let complaint = society_api::create_complaint(&state.api, &actor, &req)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(complaint)))
}

async fn list_complaints(
    State(state): State<Arc<AppState>>,
    Session(actor): Session,
) -> HttpResult<Vec<ComplaintView>> {
    society_api::list_complaints(&state.api, &actor)
        .await
        .map(Json)
        .map_err(reject)
}

async fn update_complaint(
    State(state): State<Arc<AppState>>,
    Session(actor): Session,
    Path(complaint_id): Path<ComplaintId>,
    Json(patch): Json<ComplaintPatch>,
) -> HttpResult<ComplaintView> {
    society_api::update_complaint(&state.api, &actor, complaint_id, &patch)
        .await
        .map(Json)
        .map_err(reject)
}

async fn delete_complaint(
    State(state): State<Arc<AppState>>,
    Session(actor): Session,
    Path(complaint_id): Path<ComplaintId>,
) -> Result<StatusCode, HttpError> {
    society_api::delete_complaint(&state.api, &actor, complaint_id)
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
