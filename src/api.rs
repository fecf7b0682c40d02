// 🌐 REST API - purchase analytics over HTTP (axum)
//
// Every route is a GET that runs one engine call on the blocking pool
// (adapters do blocking I/O) and wraps the result in ApiResponse.

use crate::analytics::PurchaseAnalytics;
use crate::repository::PurchaseRepository;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::error;

/// Shared application state
pub struct AppState {
    pub analytics: PurchaseAnalytics<Box<dyn PurchaseRepository>>,
}

pub type SharedState = Arc<AppState>;

/// API Response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn failure(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Run an engine call off the async runtime and turn the outcome into a response
async fn respond<T, F>(state: SharedState, operation: &'static str, f: F) -> Response
where
    T: Serialize + Send + 'static,
    F: FnOnce(&PurchaseAnalytics<Box<dyn PurchaseRepository>>) -> anyhow::Result<T> + Send + 'static,
{
    let outcome = tokio::task::spawn_blocking(move || f(&state.analytics)).await;

    match outcome {
        Ok(Ok(data)) => (StatusCode::OK, Json(ApiResponse::ok(data))).into_response(),
        Ok(Err(e)) => {
            error!(operation, error = %format!("{:#}", e), "request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::failure(format!("{:#}", e))),
            )
                .into_response()
        }
        Err(join_error) => {
            error!(operation, error = %join_error, "worker task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::failure(join_error.to_string())),
            )
                .into_response()
        }
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/data - Full snapshot keyed by customer id
async fn get_data(State(state): State<SharedState>) -> Response {
    respond(state, "all_purchases", |a| a.all_purchases()).await
}

/// GET /api/report - Every aggregate over one snapshot
async fn get_report(State(state): State<SharedState>) -> Response {
    respond(state, "report", |a| a.report()).await
}

/// GET /api/purchases/total_spent/:id
async fn total_spent(State(state): State<SharedState>, Path(id): Path<i64>) -> Response {
    respond(state, "total_spent", move |a| a.total_spent(id)).await
}

/// GET /api/purchases/most_spending
async fn most_spending(State(state): State<SharedState>) -> Response {
    respond(state, "top_spenders", |a| a.top_spenders()).await
}

/// GET /api/purchases/most_spending_in_category/:category
async fn most_spending_in_category(
    State(state): State<SharedState>,
    Path(category): Path<String>,
) -> Response {
    respond(state, "top_spenders_in_category", move |a| {
        a.top_spenders_in_category(&category)
    })
    .await
}

/// GET /api/purchases/age_category_preference
async fn age_category_preference(State(state): State<SharedState>) -> Response {
    respond(state, "age_category_preference", |a| a.age_category_preference()).await
}

/// GET /api/purchases/category_avg_price
async fn category_avg_price(State(state): State<SharedState>) -> Response {
    respond(state, "category_avg_price", |a| a.category_avg_price()).await
}

/// GET /api/purchases/most_and_least_expensive
async fn most_and_least_expensive(State(state): State<SharedState>) -> Response {
    respond(state, "most_and_least_expensive_by_category", |a| {
        a.most_and_least_expensive_by_category()
    })
    .await
}

/// GET /api/purchases/most_frequent_category
async fn most_frequent_category(State(state): State<SharedState>) -> Response {
    respond(state, "most_frequent_category_per_customer", |a| {
        a.most_frequent_category_per_customer()
    })
    .await
}

/// GET /api/purchases/can_pay/:id
async fn can_pay(State(state): State<SharedState>, Path(id): Path<i64>) -> Response {
    respond(state, "can_pay", move |a| a.can_pay(id)).await
}

/// GET /api/purchases/get_debt/:id
async fn get_debt(State(state): State<SharedState>, Path(id): Path<i64>) -> Response {
    respond(state, "debt", move |a| a.debt(id)).await
}

/// GET /api/purchases/indebted_customers
async fn indebted_customers(State(state): State<SharedState>) -> Response {
    respond(state, "customers_with_debt", |a| a.customers_with_debt()).await
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: SharedState) -> Router {
    let purchase_routes: Router<SharedState> = Router::new()
        .route("/total_spent/:id", get(total_spent))
        .route("/most_spending", get(most_spending))
        .route("/most_spending_in_category/:category", get(most_spending_in_category))
        .route("/age_category_preference", get(age_category_preference))
        .route("/category_avg_price", get(category_avg_price))
        .route("/most_and_least_expensive", get(most_and_least_expensive))
        .route("/most_frequent_category", get(most_frequent_category))
        .route("/can_pay/:id", get(can_pay))
        .route("/get_debt/:id", get(get_debt))
        .route("/indebted_customers", get(indebted_customers));

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/data", get(get_data))
        .route("/report", get(get_report))
        .nest("/purchases", purchase_routes)
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Customer, Product, Purchase};
    use crate::repository::{InMemoryRepository, SourceType};
    use axum::body::Body;
    use axum::http::Request;
    use rust_decimal::Decimal;
    use serde_json::Value;
    use tower::ServiceExt;

    fn money(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    fn create_test_router() -> Router {
        let mut purchase = Purchase::new();
        let john = Customer::new(1, "John", "Doe", 30, money("1000.00"));
        let jane = Customer::new(2, "Jane", "Doe", 25, money("1500.00"));
        purchase.record(john.clone(), Product::new(1, "Laptop", "Electronics", money("1200.00")));
        purchase.record(john, Product::new(2, "Smartphone", "Electronics", money("800.00")));
        purchase.record(jane, Product::new(3, "Shoes", "Clothing", money("100.00")));

        let repository: Box<dyn PurchaseRepository> =
            Box::new(InMemoryRepository::with_purchases(purchase));
        router(Arc::new(AppState {
            analytics: PurchaseAnalytics::new(repository),
        }))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get_json(create_test_router(), "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], "OK");
    }

    #[tokio::test]
    async fn test_total_spent_and_debt() {
        let (status, body) = get_json(create_test_router(), "/api/purchases/total_spent/1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], "2000.00");

        let (_, body) = get_json(create_test_router(), "/api/purchases/get_debt/1").await;
        assert_eq!(body["data"], "1000.00");

        let (_, body) = get_json(create_test_router(), "/api/purchases/get_debt/42").await;
        assert_eq!(body["data"], "-1");

        let (_, body) = get_json(create_test_router(), "/api/purchases/can_pay/2").await;
        assert_eq!(body["data"], true);
    }

    #[tokio::test]
    async fn test_rankings() {
        let (_, body) = get_json(create_test_router(), "/api/purchases/most_spending").await;
        assert_eq!(body["data"][0]["first_name"], "John");
        assert_eq!(body["data"][0]["cash"], "1000.00");

        let (_, body) = get_json(
            create_test_router(),
            "/api/purchases/most_spending_in_category/Clothing",
        )
        .await;
        assert_eq!(body["data"][0]["id"], 2);

        let (_, body) = get_json(
            create_test_router(),
            "/api/purchases/most_spending_in_category/Garden%20Tools",
        )
        .await;
        assert_eq!(body["data"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_category_endpoints() {
        let (_, body) = get_json(create_test_router(), "/api/purchases/age_category_preference").await;
        assert_eq!(body["data"]["30"], "Electronics");

        let (_, body) = get_json(create_test_router(), "/api/purchases/category_avg_price").await;
        let avg: Decimal = body["data"]["Clothing"].as_str().unwrap().parse().unwrap();
        assert_eq!(avg, money("100"));

        let (_, body) = get_json(create_test_router(), "/api/purchases/most_and_least_expensive").await;
        assert_eq!(body["data"]["Electronics"]["max"]["name"], "Laptop");
        assert_eq!(body["data"]["Electronics"]["min"]["name"], "Smartphone");

        let (_, body) = get_json(create_test_router(), "/api/purchases/most_frequent_category").await;
        assert_eq!(body["data"]["Clothing"][0]["first_name"], "Jane");

        let (_, body) = get_json(create_test_router(), "/api/purchases/indebted_customers").await;
        assert_eq!(body["data"]["1"], "1000.00");
    }

    #[tokio::test]
    async fn test_data_and_report() {
        let (_, body) = get_json(create_test_router(), "/api/data").await;
        assert_eq!(body["data"]["1"].as_array().unwrap().len(), 2);

        let (status, body) = get_json(create_test_router(), "/api/report").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["purchase_count"], 3);
    }

    struct FailingRepository;

    impl PurchaseRepository for FailingRepository {
        fn get_purchases(&self) -> anyhow::Result<Purchase> {
            anyhow::bail!("feed offline")
        }

        fn source_type(&self) -> SourceType {
            SourceType::Csv
        }
    }

    #[tokio::test]
    async fn test_repository_failure_is_500() {
        let repository: Box<dyn PurchaseRepository> = Box::new(FailingRepository);
        let app = router(Arc::new(AppState {
            analytics: PurchaseAnalytics::new(repository),
        }));

        let (status, body) = get_json(app, "/api/purchases/most_spending").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("feed offline"));
    }
}
