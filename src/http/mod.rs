//! JSON-over-HTTP boundary (axum).
//!
//! Every handler forwards to one [`JobController`] operation and maps the
//! result; errors become `application/problem+json` bodies via [`ApiError`].
//!
//! ```no_run
//! use repair_kit::{http, JobController, MemoryStore};
//!
//! # async fn run() -> std::io::Result<()> {
//! let app = http::router(JobController::new(MemoryStore::new()));
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8000").await?;
//! axum::serve(listener, app).await
//! # }
//! ```
//!
//! Request bodies are read as raw bytes and decoded here, so a malformed
//! body is reported as a 400 like any other validation failure.

pub mod error;

pub use error::{ApiError, ApiResult, ErrorBody};

use crate::controller::JobController;
use crate::entity::{JobId, OwnerId};
use crate::input::{CarFields, ComponentInput, LaborInput, OwnerFields};
use crate::money::NumericInput;
use crate::store::MemoryStore;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub controller: JobController<MemoryStore>,
}

/// Body of `POST /registrations`.
#[derive(Debug, Default, Deserialize)]
pub struct RegistrationRequest {
    #[serde(default)]
    pub owner: OwnerFields,
    #[serde(default)]
    pub car: CarFields,
}

/// Body of `POST /jobs/{id}/profit`.
#[derive(Debug, Default, Deserialize)]
pub struct ProfitRequest {
    #[serde(default)]
    pub payment: NumericInput,
}

/// Build the router over a controller.
pub fn router(controller: JobController<MemoryStore>) -> Router {
    let state = AppState { controller };

    Router::new()
        .route("/health", get(health))
        .route("/registrations", post(register))
        .route("/jobs", get(list_jobs))
        .route("/jobs/{id}", get(get_job).delete(delete_job))
        .route("/jobs/{id}/labors", put(replace_labors))
        .route("/jobs/{id}/components", post(add_component))
        .route("/jobs/{id}/profit", post(calculate_profit))
        .route("/owners", get(list_owners))
        .route("/owners/{id}", delete(delete_owner))
        .route("/owners/{id}/cars", post(register_car))
        .route("/cars", get(list_cars))
        .route("/owners-with-cars", get(list_owners_with_cars))
        .with_state(state)
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> ApiResult<T> {
    Ok(serde_json::from_slice(body)?)
}

/// A path id that is not a number names no record.
fn parse_id<T: From<u64>>(entity: &str, raw: &str) -> ApiResult<T> {
    raw.parse::<u64>()
        .map(T::from)
        .map_err(|_| ApiError::not_found(format!("Not found: {} {}", entity, raw)))
}

fn parse_job_id(raw: &str) -> ApiResult<JobId> {
    parse_id("job", raw)
}

fn parse_owner_id(raw: &str) -> ApiResult<OwnerId> {
    parse_id("owner", raw)
}

/// Health check endpoint
async fn health(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    state.controller.health_check().await?;

    Ok(Json(json!({
        "status": "healthy",
        "service": "repair-kit",
        "version": crate::VERSION,
    })))
}

async fn register(State(state): State<AppState>, body: Bytes) -> ApiResult<impl IntoResponse> {
    let request: RegistrationRequest = parse_body(&body)?;
    let registration = state
        .controller
        .register_owner_and_car(request.owner, request.car)
        .await?;

    Ok((StatusCode::CREATED, Json(registration)))
}

async fn register_car(
    Path(id): Path<String>,
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let owner_id = parse_owner_id(&id)?;
    let car: CarFields = parse_body(&body)?;
    let registration = state.controller.register_car(owner_id, car).await?;

    Ok((StatusCode::CREATED, Json(registration)))
}

async fn replace_labors(
    Path(id): Path<String>,
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let job_id = parse_job_id(&id)?;
    let labors: Vec<LaborInput> = parse_body(&body)?;
    let items = state.controller.replace_labors(job_id, labors).await?;

    Ok(Json(items))
}

async fn add_component(
    Path(id): Path<String>,
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let job_id = parse_job_id(&id)?;
    let component: ComponentInput = parse_body(&body)?;
    let item = state.controller.add_component(job_id, component).await?;

    Ok((StatusCode::CREATED, Json(item)))
}

async fn calculate_profit(
    Path(id): Path<String>,
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let job_id = parse_job_id(&id)?;
    let request: ProfitRequest = parse_body(&body)?;
    let quote = state
        .controller
        .calculate_profit(job_id, request.payment)
        .await?;

    Ok(Json(quote))
}

async fn get_job(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<impl IntoResponse> {
    let job_id = parse_job_id(&id)?;
    let job = state.controller.get_job_full(job_id).await?;

    Ok(Json(job))
}

async fn delete_job(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<impl IntoResponse> {
    let job_id = parse_job_id(&id)?;
    state.controller.delete_job(job_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn list_jobs(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.controller.list_jobs().await?))
}

async fn delete_owner(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<impl IntoResponse> {
    let owner_id = parse_owner_id(&id)?;
    state.controller.delete_owner(owner_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn list_owners(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.controller.list_owners().await?))
}

async fn list_cars(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.controller.list_cars().await?))
}

async fn list_owners_with_cars(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.controller.list_owners_with_cars().await?))
}
