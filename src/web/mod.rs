//! HTTP serving shell.
//!
//! Routes:
//! - `GET /`: input form
//! - `POST /predict`: urlencoded form in, `text/plain` risk string out
//! - `POST /api/predict`: JSON object in, JSON assessment out
//! - `GET /health`: liveness probe
//!
//! The pipeline is synchronous (the deriver holds a mutex around its
//! connection), so every prediction runs on the blocking pool.

mod form;

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Serialize;

use crate::application::PredictionService;
use crate::config::ServeConfig;
use crate::domain::{RawInput, RawValue, RiskAssessment};
use crate::ports::{Classifier, FeatureDeriver};
use crate::HfriskError;

type SharedService<D, C> = Arc<PredictionService<D, C>>;

/// JSON body returned by `POST /api/predict` on success.
#[derive(Debug, Serialize)]
pub struct PredictionBody {
    pub probability: f64,
    pub threshold: f64,
    pub at_risk: bool,
    pub label: String,
    pub text: String,
}

impl From<RiskAssessment> for PredictionBody {
    fn from(assessment: RiskAssessment) -> Self {
        Self {
            probability: assessment.probability,
            threshold: assessment.threshold,
            at_risk: assessment.is_at_risk(),
            label: assessment.level.to_string(),
            text: assessment.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// A failed request: status plus the single message shown to the caller.
struct Failure {
    status: StatusCode,
    message: String,
}

impl From<HfriskError> for Failure {
    fn from(err: HfriskError) -> Self {
        let status = if err.is_user_error() {
            StatusCode::UNPROCESSABLE_ENTITY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

/// Build the router around a loaded service.
pub fn router<D, C>(service: SharedService<D, C>) -> Router
where
    D: FeatureDeriver + 'static,
    C: Classifier + 'static,
{
    Router::new()
        .route("/", get(index))
        .route("/predict", post(predict_form::<D, C>))
        .route("/api/predict", post(predict_json::<D, C>))
        .route("/health", get(health))
        .with_state(service)
}

/// Bind `config.socket_addr()` and serve until Ctrl-C.
///
/// # Errors
/// Returns error if the address cannot be bound or the server fails.
pub async fn serve<D, C>(config: &ServeConfig, service: SharedService<D, C>) -> std::io::Result<()>
where
    D: FeatureDeriver + 'static,
    C: Classifier + 'static,
{
    let listener = tokio::net::TcpListener::bind(config.socket_addr()).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

async fn run_blocking<D, C>(
    service: SharedService<D, C>,
    raw: RawInput,
) -> Result<RiskAssessment, Failure>
where
    D: FeatureDeriver + 'static,
    C: Classifier + 'static,
{
    match tokio::task::spawn_blocking(move || service.predict(&raw)).await {
        Ok(result) => result.map_err(Failure::from),
        Err(e) => {
            tracing::error!("Prediction task aborted: {}", e);
            Err(Failure {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "Prediction task aborted".to_string(),
            })
        }
    }
}

async fn index() -> Html<String> {
    Html(form::render())
}

async fn health() -> &'static str {
    "ok"
}

async fn predict_form<D, C>(
    State(service): State<SharedService<D, C>>,
    form: Result<Form<HashMap<String, String>>, FormRejection>,
) -> Response
where
    D: FeatureDeriver + 'static,
    C: Classifier + 'static,
{
    let Form(fields) = match form {
        Ok(form) => form,
        Err(rejection) => {
            return (StatusCode::UNPROCESSABLE_ENTITY, rejection.body_text()).into_response()
        }
    };

    let raw: RawInput = fields
        .iter()
        .map(|(name, value)| (name.clone(), RawValue::from_form_text(value)))
        .collect();

    match run_blocking(service, raw).await {
        Ok(assessment) => assessment.to_string().into_response(),
        Err(failure) => (failure.status, failure.message).into_response(),
    }
}

async fn predict_json<D, C>(
    State(service): State<SharedService<D, C>>,
    body: Result<Json<RawInput>, JsonRejection>,
) -> Response
where
    D: FeatureDeriver + 'static,
    C: Classifier + 'static,
{
    let raw = match body {
        Ok(Json(raw)) => raw,
        Err(rejection) => {
            let error = ErrorBody {
                error: rejection.body_text(),
            };
            return (StatusCode::UNPROCESSABLE_ENTITY, Json(error)).into_response();
        }
    };

    match run_blocking(service, raw).await {
        Ok(assessment) => Json(PredictionBody::from(assessment)).into_response(),
        Err(failure) => {
            let error = ErrorBody {
                error: failure.message,
            };
            (failure.status, Json(error)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use tower::ServiceExt;

    use crate::adapters::gbdt::GbdtClassifier;
    use crate::adapters::sqlite::SqliteDeriver;

    const REFERENCE_FORM: &str = "age=60&anaemia=0&diabetes=0&high_blood_pressure=0&sex=1\
        &smoking=0&creatinine_phosphokinase=250&ejection_fraction=35&platelets=250000\
        &serum_creatinine=1.1&serum_sodium=138";

    fn app() -> Router {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("artifacts");
        let service: PredictionService<SqliteDeriver, GbdtClassifier> =
            PredictionService::from_artifacts(&dir).expect("Should load");
        router(Arc::new(service))
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Should read body");
        String::from_utf8(bytes.to_vec()).expect("utf8 body")
    }

    fn form_request(body: &str) -> Request<Body> {
        Request::post("/predict")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .expect("Valid request")
    }

    fn json_request(body: &str) -> Request<Body> {
        Request::post("/api/predict")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("Valid request")
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).expect("Valid request"))
            .await
            .expect("Should respond");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "ok");
    }

    #[tokio::test]
    async fn test_index_lists_every_field() {
        let response = app()
            .oneshot(Request::get("/").body(Body::empty()).expect("Valid request"))
            .await
            .expect("Should respond");
        assert_eq!(response.status(), StatusCode::OK);

        let html = body_string(response).await;
        for field in crate::domain::FIELD_NAMES {
            assert!(html.contains(&format!("name=\"{field}\"")), "form lacks {field}");
        }
    }

    #[tokio::test]
    async fn test_form_prediction() {
        let response = app()
            .oneshot(form_request(REFERENCE_FORM))
            .await
            .expect("Should respond");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "20.6% — Low risk");
    }

    #[tokio::test]
    async fn test_form_validation_error_is_422() {
        let body = REFERENCE_FORM.replace("sex=1", "sex=2");
        let response = app()
            .oneshot(form_request(&body))
            .await
            .expect("Should respond");
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body_string(response).await.starts_with("sex:"));
    }

    #[tokio::test]
    async fn test_json_prediction() {
        let body = r#"{"age": 60, "anaemia": 0, "diabetes": 0, "high_blood_pressure": 0,
            "sex": 1, "smoking": 0, "creatinine_phosphokinase": 250,
            "ejection_fraction": 35, "platelets": 250000, "serum_creatinine": 1.1,
            "serum_sodium": 138}"#;
        let response = app()
            .oneshot(json_request(body))
            .await
            .expect("Should respond");
        assert_eq!(response.status(), StatusCode::OK);

        let json: serde_json::Value =
            serde_json::from_str(&body_string(response).await).expect("JSON body");
        assert_eq!(json["text"], "20.6% — Low risk");
        assert_eq!(json["label"], "Low risk");
        assert_eq!(json["at_risk"], false);
        assert_eq!(json["threshold"], 0.4891);
    }

    #[tokio::test]
    async fn test_json_validation_error() {
        let response = app()
            .oneshot(json_request(r#"{"age": 60, "sex": true}"#))
            .await
            .expect("Should respond");
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let json: serde_json::Value =
            serde_json::from_str(&body_string(response).await).expect("JSON body");
        assert!(json["error"].as_str().is_some_and(|e| !e.is_empty()));
    }

    #[tokio::test]
    async fn test_malformed_json_is_422() {
        let response = app()
            .oneshot(json_request("not json"))
            .await
            .expect("Should respond");
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
