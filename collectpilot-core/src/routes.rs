use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, patch, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::{accounts, dso, outcomes, recommendations, sync, workflow};

/// Health check endpoint.
///
/// Returns a simple JSON response indicating the server is running.
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "collectpilot-core",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Store health check endpoint.
async fn db_health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    state.store.ping().await.map_err(|e| {
        tracing::error!("Database health check failed: {}", e);
        StatusCode::SERVICE_UNAVAILABLE
    })?;

    Ok(Json(serde_json::json!({
        "status": "ok",
        "database": "connected"
    })))
}

/// Creates the main application router with every engine endpoint.
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/sync", post(sync::sync_handler))
        .route("/sync/status", get(sync::status_handler))
        .route("/customers", get(accounts::list_customers_handler))
        .route("/customers/:id", get(accounts::get_customer_handler))
        .route(
            "/customers/:id/deactivate",
            post(accounts::deactivate_customer_handler),
        )
        .route("/invoices", get(accounts::list_invoices_handler))
        .route(
            "/invoices/:id",
            get(accounts::get_invoice_handler).patch(accounts::update_invoice_handler),
        )
        .route("/dso", get(dso::current_handler))
        .route("/dso/recalculate", post(dso::recalculate_handler))
        .route("/dso/history", get(dso::history_handler))
        .route(
            "/recommendations",
            get(recommendations::list_handler).post(recommendations::create_handler),
        )
        .route(
            "/recommendations/generate",
            post(recommendations::generate_handler),
        )
        .route(
            "/recommendations/:id",
            get(recommendations::get_handler).patch(recommendations::update_handler),
        )
        .route(
            "/recommendations/:id/decision",
            post(workflow::decision_handler),
        )
        .route("/recommendations/:id/execute", post(workflow::execute_handler))
        .route(
            "/recommendations/:id/approvals",
            get(workflow::approvals_handler),
        )
        .route(
            "/outcomes",
            get(outcomes::list_handler).post(outcomes::record_handler),
        )
        .route("/outcomes/analytics", get(outcomes::analytics_handler))
        .route("/outcomes/:id", patch(outcomes::update_handler));

    Router::new()
        .route("/health", get(health_check))
        .route("/health/db", get(db_health_check))
        .nest("/api", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use rust_decimal::Decimal;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::models::{AccountHealth, Source};
    use crate::store::Store;
    use crate::test_support::{
        adapters_with, memory_store, seed_customer, seed_invoice, test_config, FakeAdapter,
        FakeScorer,
    };

    fn app(store: Arc<dyn Store>) -> (Router, Arc<FakeAdapter>) {
        let crm = Arc::new(FakeAdapter::new(Source::Crm));
        let state = AppState::new(
            store,
            adapters_with(crm.clone(), None),
            Arc::new(FakeScorer::new(88)),
            &test_config(),
        );
        (create_router(state), crm)
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(v) => Body::from(v.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let (app, _) = app(memory_store());

        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, _) = send(&app, Method::GET, "/health/db", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_recommendation_returns_stable_error() {
        let (app, _) = app(memory_store());
        let uri = format!("/api/recommendations/{}", uuid::Uuid::new_v4());

        let (status, body) = send(&app, Method::GET, &uri, None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "NOT_FOUND");
        assert_eq!(body["code"], "404");
    }

    #[tokio::test]
    async fn test_generate_decide_and_record_flow() {
        let store = memory_store();
        let customer = seed_customer(&store, "A-1", AccountHealth::Good).await;
        let invoice = seed_invoice(&store, &customer, "INV-1", Decimal::new(15_000, 0), 35).await;
        let (app, crm) = app(store.clone());

        let (status, rec) = send(
            &app,
            Method::POST,
            "/api/recommendations",
            Some(json!({ "customer_id": customer.id, "invoice_id": invoice.id })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(rec["status"], "pending");
        let rec_id = rec["id"].as_str().unwrap().to_string();

        let decision = json!({
            "user_id": uuid::Uuid::new_v4(),
            "action": "approved",
            "execute_now": true
        });
        let uri = format!("/api/recommendations/{}/decision", rec_id);
        let (status, body) = send(&app, Method::POST, &uri, Some(decision.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["recommendation"]["status"], "executed");
        assert_eq!(crm.activities().len(), 1);

        let (status, body) = send(&app, Method::POST, &uri, Some(decision)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "CONFLICT");

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/outcomes",
            Some(json!({
                "recommendation_id": rec_id,
                "invoice_id": invoice.id,
                "payment_received": true,
                "days_to_payment": 6
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, analytics) =
            send(&app, Method::GET, "/api/outcomes/analytics?days=30", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(analytics["summary"]["success_rate"], 100.0);

        let uri = format!("/api/invoices/{}", invoice.id);
        let (_, body) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(body["status"], "paid");
    }

    #[tokio::test]
    async fn test_invalid_decision_action_is_bad_request() {
        let store = memory_store();
        let customer = seed_customer(&store, "A-1", AccountHealth::Good).await;
        let invoice = seed_invoice(&store, &customer, "INV-1", Decimal::new(100, 0), 5).await;
        let (app, _) = app(store);
        let (_, rec) = send(
            &app,
            Method::POST,
            "/api/recommendations",
            Some(json!({ "customer_id": customer.id, "invoice_id": invoice.id })),
        )
        .await;

        let uri = format!("/api/recommendations/{}/decision", rec["id"].as_str().unwrap());
        let (status, body) = send(
            &app,
            Method::POST,
            &uri,
            Some(json!({ "user_id": uuid::Uuid::new_v4(), "action": "escalate" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "INVALID_ACTION");
    }

    #[tokio::test]
    async fn test_dso_endpoint_reports_rounded_days() {
        let store = memory_store();
        let customer = seed_customer(&store, "A-1", AccountHealth::Good).await;
        seed_invoice(&store, &customer, "INV-1", Decimal::new(15_000, 0), 35).await;
        seed_invoice(&store, &customer, "INV-2", Decimal::new(7_500, 0), 48).await;
        let (app, _) = app(store);

        let (status, body) = send(&app, Method::POST, "/api/dso/recalculate", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["current_dso_days"], 39);
        assert_eq!(body["target_dso"], 35);

        let (_, history) = send(&app, Method::GET, "/api/dso/history", None).await;
        assert_eq!(history.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sync_endpoint_returns_reports() {
        let store = memory_store();
        let (app, crm) = app(store);
        crm.set_accounts(vec![crate::test_support::account(
            "A-9",
            "Initech",
            AccountHealth::Good,
        )]);

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/sync",
            Some(json!({ "source": "crm", "force": false })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["customers_created"], 1);

        let (_, status_body) = send(&app, Method::GET, "/api/sync/status", None).await;
        assert_eq!(status_body[0]["customer_count"], 1);
    }
}
