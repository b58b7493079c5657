use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::error;

use orgchart_core::types::{
    Compensation, Employee, NewCompensation, NewEmployee, ReportingStructure,
};
use orgchart_storage::Database;

use crate::compensation::{CompensationService, CompensationServiceError};
use crate::directory::{DirectoryError, DirectoryService};
use crate::problem::ProblemResponse;
use crate::telemetry;

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    directory: DirectoryService,
    compensations: CompensationService,
}

impl AppState {
    pub fn new(metrics: PrometheusHandle, storage: Database) -> Self {
        let clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync> = Arc::new(Utc::now);
        let directory = DirectoryService::new(storage.clone(), clock.clone());
        let compensations = CompensationService::new(storage, clock);
        Self {
            metrics,
            directory,
            compensations,
        }
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn directory(&self) -> &DirectoryService {
        &self.directory
    }

    pub fn compensations(&self) -> &CompensationService {
        &self.compensations
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/employees", post(create_employee))
        .route("/employees/:id", get(read_employee).put(update_employee))
        .route("/employees/:id/reporting-structure", get(reporting_structure))
        .route(
            "/employees/:id/compensation",
            post(create_compensation).get(read_compensation),
        )
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = telemetry::render_metrics(state.metrics());
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
        .body(Body::from(body))
        .unwrap()
}

async fn create_employee(
    State(state): State<AppState>,
    Json(input): Json<NewEmployee>,
) -> Result<(StatusCode, Json<Employee>), ProblemResponse> {
    let employee = state
        .directory()
        .create(input)
        .await
        .map_err(directory_problem)?;
    Ok((StatusCode::CREATED, Json(employee)))
}

async fn read_employee(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Employee>, ProblemResponse> {
    let employee = state
        .directory()
        .read(&id)
        .await
        .map_err(directory_problem)?;
    Ok(Json(employee))
}

async fn update_employee(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<NewEmployee>,
) -> Result<Json<Employee>, ProblemResponse> {
    let employee = state
        .directory()
        .update(&id, input)
        .await
        .map_err(directory_problem)?;
    Ok(Json(employee))
}

async fn reporting_structure(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ReportingStructure>, ProblemResponse> {
    let structure = state
        .directory()
        .reporting_structure(&id)
        .await
        .map_err(directory_problem)?;
    Ok(Json(structure))
}

async fn create_compensation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<NewCompensation>,
) -> Result<(StatusCode, Json<Compensation>), ProblemResponse> {
    let compensation = state
        .compensations()
        .create(&id, input)
        .await
        .map_err(compensation_problem)?;
    Ok((StatusCode::CREATED, Json(compensation)))
}

async fn read_compensation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Compensation>, ProblemResponse> {
    let compensation = state
        .compensations()
        .read(&id)
        .await
        .map_err(compensation_problem)?;
    Ok(Json(compensation))
}

fn directory_problem(err: DirectoryError) -> ProblemResponse {
    match err {
        DirectoryError::NotFound(id) => ProblemResponse::not_found(
            "employee_not_found",
            format!("no employee record for id {id}"),
        ),
        DirectoryError::Store(err) => {
            error!(stage = "directory", error = %err, "employee store failure");
            ProblemResponse::internal("employee_store")
        }
    }
}

fn compensation_problem(err: CompensationServiceError) -> ProblemResponse {
    match err {
        CompensationServiceError::NotFound(id) => ProblemResponse::not_found(
            "compensation_not_found",
            format!("no compensation record for employee {id}"),
        ),
        CompensationServiceError::AlreadyExists(id) => ProblemResponse::conflict(
            "compensation_exists",
            format!("compensation already recorded for employee {id}"),
        ),
        CompensationServiceError::Store(err) => {
            error!(stage = "compensation", error = %err, "compensation store failure");
            ProblemResponse::internal("compensation_store")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn setup_app() -> Router {
        let metrics = telemetry::init_metrics().expect("metrics init");
        let database = Database::connect("sqlite::memory:?cache=shared")
            .await
            .expect("connect");
        database.run_migrations().await.expect("migrations");
        app_router(AppState::new(metrics, database))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = match body {
            Some(value) => Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(value.to_string()))
                .unwrap(),
            None => Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        };

        let response = app
            .clone()
            .oneshot(request)
            .await
            .expect("handler should respond");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should read")
            .to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    fn employee_payload(first_name: &str, position: &str, reports: Value) -> Value {
        json!({
            "first_name": first_name,
            "last_name": "Toadstool",
            "position": position,
            "department": "Engineering",
            "direct_reports": reports,
        })
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        let app = setup_app().await;
        let (status, _) = send(&app, "GET", "/healthz", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_exports_build_info() {
        let app = setup_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("handler should respond");

        assert_eq!(response.status(), StatusCode::OK);
        let collected = response
            .into_body()
            .collect()
            .await
            .expect("body should read");
        let body = String::from_utf8(collected.to_bytes().to_vec()).expect("utf-8");
        assert!(body.contains("app_build_info"));
        assert!(body.contains("app_uptime_seconds"));
    }

    #[tokio::test]
    async fn create_then_read_round_trips_over_http() {
        let app = setup_app().await;

        let payload = employee_payload("Mario", "Plumber", json!([]));
        let (status, created) = send(&app, "POST", "/employees", Some(payload.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().expect("assigned id").to_string();
        assert_eq!(created["first_name"], payload["first_name"]);
        assert_eq!(created["position"], payload["position"]);

        let (status, found) = send(&app, "GET", &format!("/employees/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found, created);
    }

    #[tokio::test]
    async fn read_unknown_employee_returns_problem() {
        let app = setup_app().await;
        let (status, body) = send(&app, "GET", "/employees/nobody-here", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["type"], "employee_not_found");
    }

    #[tokio::test]
    async fn update_replaces_record_over_http() {
        let app = setup_app().await;

        let (_, created) = send(
            &app,
            "POST",
            "/employees",
            Some(employee_payload("Mario", "Plumber", json!([]))),
        )
        .await;
        let id = created["id"].as_str().expect("assigned id").to_string();

        let (status, updated) = send(
            &app,
            "PUT",
            &format!("/employees/{id}"),
            Some(employee_payload("Mario", "Head Plumber", json!([]))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["id"].as_str(), Some(id.as_str()));
        assert_eq!(updated["position"], "Head Plumber");

        let (_, found) = send(&app, "GET", &format!("/employees/{id}"), None).await;
        assert_eq!(found["position"], "Head Plumber");
    }

    #[tokio::test]
    async fn reporting_structure_counts_direct_report() {
        let app = setup_app().await;

        // Mario has no reports of his own.
        let (_, mario) = send(
            &app,
            "POST",
            "/employees",
            Some(employee_payload("Mario", "Plumber", json!([]))),
        )
        .await;
        let mario_id = mario["id"].as_str().expect("assigned id").to_string();

        let (status, structure) = send(
            &app,
            "GET",
            &format!("/employees/{mario_id}/reporting-structure"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(structure["number_of_reports"], 0);

        // Peach manages Mario via an identifier-only stub.
        let (_, peach) = send(
            &app,
            "POST",
            "/employees",
            Some(employee_payload(
                "Peach",
                "Manager",
                json!([{"id": mario_id}]),
            )),
        )
        .await;
        let peach_id = peach["id"].as_str().expect("assigned id").to_string();

        let (status, structure) = send(
            &app,
            "GET",
            &format!("/employees/{peach_id}/reporting-structure"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(structure["number_of_reports"], 1);
        assert_eq!(structure["employee"]["id"].as_str(), Some(peach_id.as_str()));
    }

    #[tokio::test]
    async fn reporting_structure_of_unknown_root_returns_problem() {
        let app = setup_app().await;
        let (status, body) = send(
            &app,
            "GET",
            "/employees/nobody-here/reporting-structure",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["type"], "employee_not_found");
    }

    #[tokio::test]
    async fn compensation_round_trips_over_http() {
        let app = setup_app().await;

        let (_, created) = send(
            &app,
            "POST",
            "/employees",
            Some(employee_payload("Somebody", "Developer", json!([]))),
        )
        .await;
        let id = created["id"].as_str().expect("assigned id").to_string();

        let payload = json!({"salary": 100_000, "effective_date": "2025-06-01"});
        let (status, compensation) = send(
            &app,
            "POST",
            &format!("/employees/{id}/compensation"),
            Some(payload),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(compensation["employee_id"].as_str(), Some(id.as_str()));

        let (status, found) = send(
            &app,
            "GET",
            &format!("/employees/{id}/compensation"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found["salary"], 100_000);
        assert_eq!(found["effective_date"], "2025-06-01");
    }

    #[tokio::test]
    async fn missing_compensation_returns_problem() {
        let app = setup_app().await;
        let (status, body) = send(
            &app,
            "GET",
            "/employees/nobody-here/compensation",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["type"], "compensation_not_found");
    }

    #[tokio::test]
    async fn duplicate_compensation_returns_conflict() {
        let app = setup_app().await;

        let (_, created) = send(
            &app,
            "POST",
            "/employees",
            Some(employee_payload("Somebody", "Developer", json!([]))),
        )
        .await;
        let id = created["id"].as_str().expect("assigned id").to_string();

        let payload = json!({"salary": 90_000, "effective_date": "2025-01-01"});
        let (status, _) = send(
            &app,
            "POST",
            &format!("/employees/{id}/compensation"),
            Some(payload.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(
            &app,
            "POST",
            &format!("/employees/{id}/compensation"),
            Some(payload),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["type"], "compensation_exists");
    }

    #[tokio::test]
    async fn employee_payload_missing_fields_is_rejected() {
        let app = setup_app().await;
        let (status, _) = send(
            &app,
            "POST",
            "/employees",
            Some(json!({"first_name": "Only"})),
        )
        .await;
        assert!(status.is_client_error());
    }
}
