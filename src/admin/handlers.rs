use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::config::schema::default_weight;
use crate::load_balancer::{backend::Backend, backend::BackendSnapshot, decision::Decision};

use super::AdminState;

#[derive(Debug, Deserialize)]
pub struct AddBackendRequest {
    pub address: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub current_algo: &'static str,
    pub adaptive_reason: &'static str,
    pub selected_backend: Option<String>,
    pub backends: Vec<BackendSnapshot>,
    pub decision_log: Vec<Decision>,
}

/// Append a backend, alive from the start. Duplicates are not rejected.
pub async fn add_backend(
    State(state): State<AdminState>,
    payload: Result<Json<AddBackendRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Malformed add request");
            return (StatusCode::BAD_REQUEST, rejection.body_text()).into_response();
        }
    };

    let backend = state.pool.add_server(Backend::new(request.address, request.weight));
    (StatusCode::CREATED, Json(backend.snapshot())).into_response()
}

pub async fn get_metrics(State(state): State<AdminState>) -> Json<Vec<BackendSnapshot>> {
    Json(state.pool.snapshots())
}

pub async fn get_status(State(state): State<AdminState>) -> Json<StatusReport> {
    let (routing, decision_log) = state.strategy.report();
    Json(StatusReport {
        current_algo: routing.algorithm,
        adaptive_reason: routing.reason,
        selected_backend: routing.last_picked,
        backends: state.pool.snapshots(),
        decision_log,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    use super::*;
    use crate::admin::setup_admin_router;
    use crate::config::{AdaptiveConfig, Algorithm};
    use crate::load_balancer::{pool::ServerPool, Strategy};

    fn state(api_key: Option<&str>) -> AdminState {
        let pool = Arc::new(ServerPool::new());
        let strategy = Arc::new(Strategy::from_algorithm(
            Algorithm::Adaptive,
            pool.clone(),
            AdaptiveConfig::default(),
        ));
        AdminState::new(pool, strategy, api_key.map(str::to_string))
    }

    fn add_request(body: &str) -> Request<Body> {
        Request::post("/admin/add")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_add_backend_created_and_alive() {
        let state = state(None);
        let pool = state.pool.clone();
        let response = setup_admin_router(state)
            .oneshot(add_request(r#"{"address":"127.0.0.1:9001"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let servers = pool.get_servers();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].address(), "127.0.0.1:9001");
        assert_eq!(servers[0].weight(), 1);
        assert!(servers[0].is_alive());
    }

    #[tokio::test]
    async fn test_add_backend_malformed_json_is_bad_request() {
        let state = state(None);
        let pool = state.pool.clone();
        let response = setup_admin_router(state)
            .oneshot(add_request("{not json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn test_status_reports_routing_state() {
        let state = state(None);
        state.pool.add_server(Backend::new("127.0.0.1:9001", 1));
        if let Some(router) = state.strategy.as_adaptive() {
            let _ = router.pick();
        }

        let response = setup_admin_router(state)
            .oneshot(Request::get("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["current_algo"], "roundrobin");
        assert_eq!(json["adaptive_reason"], "normal_conditions");
        assert_eq!(json["selected_backend"], "127.0.0.1:9001");
        assert_eq!(json["backends"].as_array().unwrap().len(), 1);
        assert_eq!(json["decision_log"][0]["algo"], "roundrobin");
    }

    #[tokio::test]
    async fn test_bearer_token_required_when_configured() {
        let app = setup_admin_router(state(Some("s3cret")));

        let denied = app
            .clone()
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

        let allowed = app
            .oneshot(
                Request::get("/metrics")
                    .header("authorization", "Bearer s3cret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(allowed.status(), StatusCode::OK);
    }
}
