//! Route dispatch and the JSON bodies of each endpoint.

use std::sync::Arc;

use chrono::Utc;
use gs_optimizer::{ContinueRequest, InitRequest, OptimizationResponse, Orchestrator};
use gs_types::{internal_error, ErrorKind, GsError, GsResult};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::config::ServiceConfig;
use crate::http::{Request, Response};
use crate::rate_limit::RateLimiter;

pub const USER_HEADER: &str = "X-User-Email";

/// Shared across connections.  The rate limiter is the only mutable part.
pub struct AppState {
    pub config: ServiceConfig,
    pub orchestrator: Orchestrator,
    pub limiter: RateLimiter,
}

impl AppState {
    pub fn new(config: ServiceConfig) -> Self {
        let orchestrator = Orchestrator::new(
            config.limits.clone(),
            config.history_policy,
            config.padding_policy,
        );
        let limiter = RateLimiter::new(config.rate_limit_window, config.rate_limit_max_requests);
        Self {
            config,
            orchestrator,
            limiter,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Ping,
    TestConnection,
    InitOptimization,
    ContinueOptimization,
}

impl Route {
    fn from_path(path: &str) -> Option<Self> {
        match path.trim_end_matches('/') {
            "/ping" => Some(Self::Ping),
            "/test-connection" => Some(Self::TestConnection),
            "/init-optimization" => Some(Self::InitOptimization),
            "/continue-optimization" => Some(Self::ContinueOptimization),
            _ => None,
        }
    }
}

pub fn error_body(message: &str, field: Option<&str>) -> Value {
    let mut body = json!({"status": "error", "message": message});
    if let Some(field) = field {
        body["field"] = Value::from(field);
    }
    body
}

fn error_response(err: &GsError) -> Response {
    let status = match err.kind() {
        ErrorKind::Client => 400,
        ErrorKind::Server => 500,
    };
    if status == 500 {
        error!(error = %err, "optimization failed");
    } else {
        warn!(error = %err, field = err.field().unwrap_or("-"), "request rejected");
    }
    Response::json(status, &error_body(&err.to_string(), err.field()))
}

pub async fn handle(state: &Arc<AppState>, request: Request) -> Response {
    let Some(route) = Route::from_path(&request.path) else {
        return Response::json(404, &error_body(&format!("no route for {}", request.path), None));
    };
    if !request.method.eq_ignore_ascii_case("POST") {
        return Response::json(405, &error_body("only POST is supported", None));
    }
    let Some(user) = request.header(USER_HEADER) else {
        return Response::json(403, &error_body("authentication required", None));
    };
    if !state.limiter.check(user) {
        warn!(user, "rate limit exceeded");
        return Response::json(429, &error_body("rate limit exceeded", None));
    }

    match route {
        Route::Ping => Response::json(
            200,
            &json!({
                "status": "success",
                "timestamp": Utc::now().to_rfc3339(),
                "commit": state.config.commit,
            }),
        ),
        Route::TestConnection => Response::json(
            200,
            &json!({"status": "success", "authenticated_user": user}),
        ),
        Route::InitOptimization => {
            let result = match decode::<InitRequest>(&request.body) {
                Ok(req) => run_blocking(state, move |o| o.initialize(req)).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(response) => Response::json(200, &init_body(response)),
                Err(e) => error_response(&e),
            }
        }
        Route::ContinueOptimization => {
            let result = match decode::<ContinueRequest>(&request.body) {
                Ok(req) => run_blocking(state, move |o| o.continue_optimization(req)).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(response) => Response::json(200, &continue_body(response)),
                Err(e) => error_response(&e),
            }
        }
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> GsResult<T> {
    Ok(serde_json::from_slice(body)?)
}

async fn run_blocking<F>(state: &Arc<AppState>, work: F) -> GsResult<OptimizationResponse>
where
    F: FnOnce(&Orchestrator) -> GsResult<OptimizationResponse> + Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || work(&state.orchestrator))
        .await
        .map_err(|e| internal_error!("optimization task failed: {e}"))?
}

fn init_body(response: OptimizationResponse) -> Value {
    json!({
        "status": "success",
        "backend": response.backend,
        "data": response.points,
    })
}

fn continue_body(response: OptimizationResponse) -> Value {
    json!({
        "status": "success",
        "backend": response.backend,
        "data": response.points,
        "accepted": response.report.accepted,
        "pending": response.report.pending,
        "rejected": response.report.rejected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn state(max_requests: usize) -> Arc<AppState> {
        Arc::new(AppState::new(ServiceConfig {
            commit: "abc123".to_string(),
            rate_limit_window: Duration::from_secs(60),
            rate_limit_max_requests: max_requests,
            ..ServiceConfig::default()
        }))
    }

    fn post(path: &str, body: Value) -> Request {
        Request::new("POST", path)
            .with_header(USER_HEADER, "test@example.com")
            .with_body(body.to_string())
    }

    fn settings(estimator: &str) -> Value {
        json!({
            "base_estimator": estimator,
            "acquisition_function": "EI",
            "acq_optimizer": "auto",
            "acq_func_kwargs": {},
            "num_params": 2,
            "param_names": ["x", "y"],
            "param_mins": [0.0, 0.0],
            "param_maxes": [1.0, 1.0],
            "num_init_points": 3,
            "batch_size": 2,
            "random_state": 11
        })
    }

    #[tokio::test]
    async fn test_ping_requires_a_user() {
        let state = state(10);
        let ok = handle(&state, Request::new("POST", "/ping").with_header(USER_HEADER, "u@x")).await;
        assert_eq!(ok.status, 200);
        let body = ok.body_json().unwrap();
        assert_eq!(body["status"], "success");
        assert_eq!(body["commit"], "abc123");
        assert!(body["timestamp"].is_string());

        let denied = handle(&state, Request::new("POST", "/ping")).await;
        assert_eq!(denied.status, 403);
        assert_eq!(denied.body_json().unwrap()["status"], "error");
    }

    #[tokio::test]
    async fn test_eleventh_ping_is_rate_limited() {
        let state = state(10);
        for _ in 0..10 {
            let r = handle(&state, Request::new("POST", "/ping").with_header(USER_HEADER, "rate@x")).await;
            assert_eq!(r.status, 200);
        }
        let r = handle(&state, Request::new("POST", "/ping").with_header(USER_HEADER, "rate@x")).await;
        assert_eq!(r.status, 429);
    }

    #[tokio::test]
    async fn test_connection_echoes_user() {
        let response = handle(&state(10), post("/test-connection", Value::Null)).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body_json().unwrap()["authenticated_user"], "test@example.com");
    }

    #[tokio::test]
    async fn test_unknown_route_and_method() {
        let state = state(10);
        assert_eq!(handle(&state, post("/plot", json!({}))).await.status, 404);
        let get = Request::new("GET", "/ping").with_header(USER_HEADER, "u@x");
        assert_eq!(handle(&state, get).await.status, 405);
    }

    #[tokio::test]
    async fn test_init_then_continue() {
        let state = state(10);
        let init = handle(&state, post("/init-optimization", json!({"settings": settings("SKOPT-GP")}))).await;
        assert_eq!(init.status, 200);
        let body = init.body_json().unwrap();
        assert_eq!(body["backend"], "SKOPT-GP");
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 3);
        assert_eq!(data[0]["objective"], "");

        let history: Vec<Value> = vec![json!({"x": 0.5, "y": 0.5, "objective": 0.1}), data[0].clone()];
        let next = handle(
            &state,
            post(
                "/continue-optimization",
                json!({"settings": settings("SKOPT-GP"), "existing_data": history}),
            ),
        )
        .await;
        assert_eq!(next.status, 200);
        let body = next.body_json().unwrap();
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
        assert_eq!(body["accepted"], 1);
        assert_eq!(body["pending"], 1);
        assert_eq!(body["rejected"], 0);
    }

    #[tokio::test]
    async fn test_client_errors_are_400_with_field() {
        let state = state(10);

        let mut bad_bounds = settings("RANDOM");
        bad_bounds["param_mins"] = json!([0.0, 2.0]);
        let r = handle(&state, post("/init-optimization", json!({"settings": bad_bounds}))).await;
        assert_eq!(r.status, 400);
        assert_eq!(r.body_json().unwrap()["field"], "param_mins[1]");

        let r = handle(&state, post("/init-optimization", json!({"settings": settings("TPE")}))).await;
        assert_eq!(r.status, 400);
        assert!(r.body_json().unwrap()["message"].as_str().unwrap().contains("TPE"));

        let mut too_many = settings("RANDOM");
        too_many["batch_size"] = json!(100_000);
        let r = handle(
            &state,
            post("/continue-optimization", json!({"settings": too_many, "existing_data": []})),
        )
        .await;
        assert_eq!(r.status, 400);
        assert_eq!(r.body_json().unwrap()["field"], "batch_size");

        let garbage = Request::new("POST", "/init-optimization")
            .with_header(USER_HEADER, "u@x")
            .with_body("{not json");
        assert_eq!(handle(&state, garbage).await.status, 400);
    }
}
