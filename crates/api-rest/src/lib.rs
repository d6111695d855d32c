//! # API REST
//!
//! REST API over the patient flow store.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, status codes)
//! - the Server-Sent Events change feed for dashboards
//!
//! Status codes:
//! - `400` for caller misuse (blank fields, unknown stage, malformed id)
//! - `404` when reading a single record that does not exist
//! - `204` when a mutation targets an id that does not exist (nothing changes)
//! - `500` when the backing store is unavailable

#![warn(rust_2018_idioms)]

pub mod dto;
pub mod events;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use flow_core::{FlowConfig, FlowError, FlowPatient, FlowStore, PatientId, Stage};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use dto::{
    AddPrescriptionReq, AddTestResultReq, AssignDepartmentReq, AssignDoctorReq, FlowEventRes,
    HealthRes, ListPatientsQuery, ListPatientsRes, MoveStageReq, PatientRes, RegisterPatientReq,
    StageRes,
};
pub use events::{spawn_sync_task, ChangeFeed};

/// Capacity of the SSE broadcast channel. Slow clients past this just see one `changed`.
const FEED_CAPACITY: usize = 64;

/// Application state shared across REST API handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<FlowStore>,
    pub feed: ChangeFeed,
}

impl AppState {
    pub fn new(store: Arc<FlowStore>) -> Self {
        let feed = ChangeFeed::attach(&store, FEED_CAPACITY);
        Self { store, feed }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        list_stages,
        list_patients,
        get_patient,
        register_patient,
        move_stage,
        assign_department,
        assign_doctor,
        add_test_result,
        add_prescription,
        events::events,
    ),
    components(schemas(
        HealthRes,
        StageRes,
        FlowEventRes,
        PatientRes,
        ListPatientsRes,
        RegisterPatientReq,
        MoveStageReq,
        AssignDepartmentReq,
        AssignDoctorReq,
        AddTestResultReq,
        AddPrescriptionReq,
    ))
)]
pub struct ApiDoc;

/// Builds the REST router over `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stages", get(list_stages))
        .route("/patients", get(list_patients).post(register_patient))
        .route("/patients/:id", get(get_patient))
        .route("/patients/:id/stage", post(move_stage))
        .route("/patients/:id/department", post(assign_department))
        .route("/patients/:id/doctor", post(assign_doctor))
        .route("/patients/:id/tests", post(add_test_result))
        .route("/patients/:id/prescriptions", post(add_prescription))
        .route("/events", get(events::events))
        .merge(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Opens the store described by `cfg`, starts the external-write poller and serves the API
/// on `addr` until the server fails.
///
/// # Errors
/// Returns an error if:
/// - the store cannot be opened,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
pub async fn serve(cfg: FlowConfig, addr: &str) -> anyhow::Result<()> {
    let store = Arc::new(FlowStore::open(&cfg)?);
    let sync_task = spawn_sync_task(Arc::clone(&store), cfg.sync_interval());
    let app = router(AppState::new(store));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("-- Serving patient flow REST API on {}", listener.local_addr()?);
    let result = axum::serve(listener, app).await;

    sync_task.abort();
    result.map_err(anyhow::Error::from)
}

type ApiError = (StatusCode, String);

fn map_flow_error(e: FlowError) -> ApiError {
    match e {
        FlowError::InvalidInput(_) | FlowError::UnknownStage(_) | FlowError::Uuid(_) => {
            (StatusCode::BAD_REQUEST, e.to_string())
        }
        other => {
            tracing::error!("Flow store error: {:?}", other);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into())
        }
    }
}

fn parse_id(raw: &str) -> Result<PatientId, ApiError> {
    PatientId::parse(raw).map_err(|e| map_flow_error(e.into()))
}

fn mutation_response(updated: Option<FlowPatient>) -> Response {
    match updated {
        Some(patient) => (StatusCode::OK, Json(PatientRes::from(&patient))).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
#[axum::debug_handler]
async fn health() -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "Patient flow REST API is alive".into(),
    })
}

#[utoipa::path(
    get,
    path = "/stages",
    responses(
        (status = 200, description = "Stage vocabulary with display labels", body = [StageRes])
    )
)]
#[axum::debug_handler]
async fn list_stages() -> Json<Vec<StageRes>> {
    Json(Stage::ALL.into_iter().map(StageRes::from).collect())
}

#[utoipa::path(
    get,
    path = "/patients",
    params(ListPatientsQuery),
    responses(
        (status = 200, description = "Patients, newest registration first", body = ListPatientsRes),
        (status = 400, description = "Unknown stage"),
        (status = 500, description = "Internal server error")
    )
)]
/// List patients, optionally only those at one stage.
#[axum::debug_handler]
async fn list_patients(
    State(state): State<AppState>,
    Query(query): Query<ListPatientsQuery>,
) -> Result<Json<ListPatientsRes>, ApiError> {
    let patients = match query.stage.as_deref() {
        Some(stage) => {
            let stage: Stage = stage.parse().map_err(map_flow_error)?;
            state.store.by_stage(stage)
        }
        None => state.store.get_all(),
    }
    .map_err(map_flow_error)?;

    Ok(Json(ListPatientsRes {
        patients: patients.iter().map(PatientRes::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/patients/{id}",
    params(("id" = String, Path, description = "Patient id (32 lowercase hex characters)")),
    responses(
        (status = 200, description = "Patient", body = PatientRes),
        (status = 400, description = "Malformed id"),
        (status = 404, description = "No such patient")
    )
)]
#[axum::debug_handler]
async fn get_patient(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PatientRes>, ApiError> {
    let id = parse_id(&id)?;
    match state.store.get(&id).map_err(map_flow_error)? {
        Some(patient) => Ok(Json(PatientRes::from(&patient))),
        None => Err((StatusCode::NOT_FOUND, format!("no patient with id {id}"))),
    }
}

#[utoipa::path(
    post,
    path = "/patients",
    request_body = RegisterPatientReq,
    responses(
        (status = 201, description = "Patient registered at reception", body = PatientRes),
        (status = 400, description = "Bad request"),
        (status = 500, description = "Internal server error")
    )
)]
/// Register a new patient at reception.
#[axum::debug_handler]
async fn register_patient(
    State(state): State<AppState>,
    Json(req): Json<RegisterPatientReq>,
) -> Result<(StatusCode, Json<PatientRes>), ApiError> {
    let patient = state
        .store
        .register_at_reception(&req.name, req.email.as_deref())
        .map_err(map_flow_error)?;
    Ok((StatusCode::CREATED, Json(PatientRes::from(&patient))))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/stage",
    params(("id" = String, Path, description = "Patient id")),
    request_body = MoveStageReq,
    responses(
        (status = 200, description = "Patient moved", body = PatientRes),
        (status = 204, description = "No such patient; nothing changed"),
        (status = 400, description = "Bad request"),
        (status = 500, description = "Internal server error")
    )
)]
/// Move a patient to another stage
///
/// Records `action` (and optional `notes`) as the newest history entry for the target stage.
/// Any stage may follow any other.
///
/// # Arguments
/// * `id` - Patient id from the path
/// * `req` - Target stage name, action and optional notes
///
/// # Returns
/// * `200` with the updated patient, or `204` if no patient has this id
///
/// # Errors
/// Returns `400 Bad Request` for a malformed id, unknown stage or blank action, and
/// `500 Internal Server Error` if the flow slot cannot be read or written.
#[axum::debug_handler]
async fn move_stage(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<MoveStageReq>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let stage: Stage = req.stage.parse().map_err(map_flow_error)?;
    let updated = state
        .store
        .move_stage(&id, stage, &req.action, req.notes.as_deref())
        .map_err(map_flow_error)?;
    Ok(mutation_response(updated))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/department",
    params(("id" = String, Path, description = "Patient id")),
    request_body = AssignDepartmentReq,
    responses(
        (status = 200, description = "Patient routed to consultation", body = PatientRes),
        (status = 204, description = "No such patient; nothing changed"),
        (status = 400, description = "Bad request"),
        (status = 500, description = "Internal server error")
    )
)]
/// Route a patient to a consultation department
///
/// Moves the patient to `consultation` and logs the department in the history notes.
///
/// # Arguments
/// * `id` - Patient id from the path
/// * `req` - Department name
///
/// # Returns
/// * `200` with the updated patient, or `204` if no patient has this id
///
/// # Errors
/// Returns `400 Bad Request` for a malformed id or blank department, and
/// `500 Internal Server Error` if the flow slot cannot be read or written.
#[axum::debug_handler]
async fn assign_department(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AssignDepartmentReq>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let updated = state
        .store
        .assign_consultation_department(&id, &req.department)
        .map_err(map_flow_error)?;
    Ok(mutation_response(updated))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/doctor",
    params(("id" = String, Path, description = "Patient id")),
    request_body = AssignDoctorReq,
    responses(
        (status = 200, description = "Doctor assigned", body = PatientRes),
        (status = 204, description = "No such patient; nothing changed"),
        (status = 400, description = "Bad request"),
        (status = 500, description = "Internal server error")
    )
)]
/// Assign the doctor seeing a patient
///
/// The patient's stage is left as it is.
///
/// # Returns
/// * `200` with the updated patient, or `204` if no patient has this id
///
/// # Errors
/// Returns `400 Bad Request` for a malformed id or blank doctor name, and
/// `500 Internal Server Error` on storage failure.
#[axum::debug_handler]
async fn assign_doctor(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AssignDoctorReq>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let updated = state
        .store
        .assign_doctor(&id, &req.doctor)
        .map_err(map_flow_error)?;
    Ok(mutation_response(updated))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/tests",
    params(("id" = String, Path, description = "Patient id")),
    request_body = AddTestResultReq,
    responses(
        (status = 200, description = "Test result recorded", body = PatientRes),
        (status = 204, description = "No such patient; nothing changed"),
        (status = 400, description = "Bad request"),
        (status = 500, description = "Internal server error")
    )
)]
/// Record a lab test result
///
/// Adds the result to the patient's tests and logs a `lab` history entry without moving the
/// patient.
///
/// # Returns
/// * `200` with the updated patient, or `204` if no patient has this id
///
/// # Errors
/// Returns `400 Bad Request` for a malformed id or blank result, and
/// `500 Internal Server Error` on storage failure.
#[axum::debug_handler]
async fn add_test_result(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AddTestResultReq>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let updated = state
        .store
        .add_test_result(&id, &req.result)
        .map_err(map_flow_error)?;
    Ok(mutation_response(updated))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/prescriptions",
    params(("id" = String, Path, description = "Patient id")),
    request_body = AddPrescriptionReq,
    responses(
        (status = 200, description = "Prescription recorded", body = PatientRes),
        (status = 204, description = "No such patient; nothing changed"),
        (status = 400, description = "Bad request"),
        (status = 500, description = "Internal server error")
    )
)]
/// Record a prescription
///
/// # Returns
/// * `200` with the updated patient, or `204` if no patient has this id
///
/// # Errors
/// Returns `400 Bad Request` for a malformed id or blank prescription, and
/// `500 Internal Server Error` on storage failure.
#[axum::debug_handler]
async fn add_prescription(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AddPrescriptionReq>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let updated = state
        .store
        .add_prescription(&id, &req.prescription)
        .map_err(map_flow_error)?;
    Ok(mutation_response(updated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use flow_core::MemoryBackend;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_app() -> (Router, Arc<FlowStore>) {
        let store = Arc::new(FlowStore::new(MemoryBackend::new()).unwrap());
        (router(AppState::new(Arc::clone(&store))), store)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (app, _) = test_app();
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
    }

    #[tokio::test]
    async fn stages_list_every_stage_with_labels() {
        let (app, _) = test_app();
        let (status, body) = send(&app, "GET", "/stages", None).await;
        assert_eq!(status, StatusCode::OK);

        let stages = body.as_array().unwrap();
        assert_eq!(stages.len(), Stage::ALL.len());
        assert_eq!(stages[3]["stage"], "lab");
        assert_eq!(stages[3]["label"], "Laboratory");
        assert_eq!(stages[6]["terminal"], true);
    }

    #[tokio::test]
    async fn register_then_read_back() {
        let (app, _) = test_app();
        let (status, created) = send(
            &app,
            "POST",
            "/patients",
            Some(json!({"name": "Jane Doe", "email": "jane@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["currentStage"], "reception");
        assert_eq!(created["consultationDepartment"], Value::Null);
        assert_eq!(created["consultationDepartmentLabel"], "Unassigned");
        assert_eq!(created["history"][0]["action"], "Registered at reception");

        let id = created["id"].as_str().unwrap();
        let (status, fetched) = send(&app, "GET", &format!("/patients/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn register_rejects_blank_name() {
        let (app, store) = test_app();
        let (status, _) = send(&app, "POST", "/patients", Some(json!({"name": "  "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(store.get_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn move_stage_and_filter_by_stage() {
        let (app, store) = test_app();
        let jane = store.register_at_reception("Jane Doe", None).unwrap();
        store.register_at_reception("John Roe", None).unwrap();

        let (status, moved) = send(
            &app,
            "POST",
            &format!("/patients/{}/stage", jane.id()),
            Some(json!({"stage": "lab", "action": "Sent to lab", "notes": "fasting required"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(moved["currentStage"], "lab");
        assert_eq!(moved["currentStageLabel"], "Laboratory");
        assert_eq!(moved["history"][0]["notes"], "fasting required");

        let (status, lab) = send(&app, "GET", "/patients?stage=lab", None).await;
        assert_eq!(status, StatusCode::OK);
        let patients = lab["patients"].as_array().unwrap();
        assert_eq!(patients.len(), 1);
        assert_eq!(patients[0]["name"], "Jane Doe");

        let (status, all) = send(&app, "GET", "/patients", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(all["patients"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unknown_stage_is_a_bad_request() {
        let (app, store) = test_app();
        let jane = store.register_at_reception("Jane Doe", None).unwrap();

        let (status, _) = send(&app, "GET", "/patients?stage=radiology", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            "POST",
            &format!("/patients/{}/stage", jane.id()),
            Some(json!({"stage": "radiology", "action": "Sent"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn annotations_keep_stage() {
        let (app, store) = test_app();
        let id = store.register_at_reception("Jane Doe", None).unwrap().id().to_string();

        let (status, body) = send(
            &app,
            "POST",
            &format!("/patients/{id}/department"),
            Some(json!({"department": "Cardiology"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["currentStage"], "consultation");
        assert_eq!(body["consultationDepartmentLabel"], "Cardiology");

        let (_, body) = send(
            &app,
            "POST",
            &format!("/patients/{id}/doctor"),
            Some(json!({"doctor": "Dr. Mensah"})),
        )
        .await;
        assert_eq!(body["assignedDoctor"], "Dr. Mensah");

        let (_, body) = send(
            &app,
            "POST",
            &format!("/patients/{id}/tests"),
            Some(json!({"result": "CBC normal"})),
        )
        .await;
        assert_eq!(body["tests"], json!(["CBC normal"]));
        assert_eq!(body["currentStage"], "consultation");
        assert_eq!(body["history"][0]["stage"], "lab");

        let (_, body) = send(
            &app,
            "POST",
            &format!("/patients/{id}/prescriptions"),
            Some(json!({"prescription": "Aspirin 75mg"})),
        )
        .await;
        assert_eq!(body["prescriptions"], json!(["Aspirin 75mg"]));
        assert_eq!(body["history"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn unknown_patient_reads_404_and_mutations_204() {
        let (app, _) = test_app();
        let ghost = PatientId::new();

        let (status, _) = send(&app, "GET", &format!("/patients/{ghost}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(
            &app,
            "POST",
            &format!("/patients/{ghost}/tests"),
            Some(json!({"result": "CBC normal"})),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, Value::Null);
    }

    #[tokio::test]
    async fn malformed_id_is_a_bad_request() {
        let (app, _) = test_app();
        let (status, _) = send(&app, "GET", "/patients/not-an-id", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn mutations_reach_the_change_feed() {
        let store = Arc::new(FlowStore::new(MemoryBackend::new()).unwrap());
        let state = AppState::new(Arc::clone(&store));
        let mut rx = state.feed.subscribe();
        let app = router(state);

        let (status, _) = send(&app, "POST", "/patients", Some(json!({"name": "Jane Doe"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        rx.recv().await.expect("feed should relay the registration");
    }

    #[test]
    fn openapi_documents_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/stages",
            "/patients",
            "/patients/{id}",
            "/patients/{id}/stage",
            "/patients/{id}/department",
            "/patients/{id}/doctor",
            "/patients/{id}/tests",
            "/patients/{id}/prescriptions",
            "/events",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path} missing from OpenAPI");
        }
    }
}
