use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    serve, Json, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::errors::SandboxError;
use crate::memory::InMemoryCommerce;
use checkout_types::domain::address::Address;
use checkout_types::domain::cart::CartLine;
use checkout_types::domain::order::{Order, PaymentMethod};
use checkout_types::domain::payment::Payment;

#[derive(Clone)]
pub struct SandboxServerConfig {
    pub port: String,
}

/// Serves an [`InMemoryCommerce`] over the storefront's HTTP routes.
#[derive(Clone)]
pub struct SandboxServer {
    pub service: Arc<InMemoryCommerce>,
    pub config: SandboxServerConfig,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub user_id: i64,
    pub address_id: i64,
    pub payment_method: PaymentMethod,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentRequest {
    pub order_id: i64,
    pub method: PaymentMethod,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    pub payment_id: i64,
    pub transaction_id: String,
    pub success: bool,
}

type Shared = Arc<InMemoryCommerce>;

impl SandboxServer {
    pub fn new(service: InMemoryCommerce, config: SandboxServerConfig) -> Self {
        Self {
            service: Arc::new(service),
            config,
        }
    }

    pub fn router(&self) -> Router {
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &axum::extract::Request<_>| {
                let uri = request.uri().to_string();
                let request_id = Uuid::new_v4();
                tracing::info_span!(
                    "http_request",
                    %request_id,
                    method = %request.method(),
                    uri
                )
            })
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &tracing::Span| {
                    tracing::info!(
                        parent: span,
                        status = %response.status(),
                        latency_ms = %latency.as_millis(),
                        "response"
                    );
                },
            );

        Router::new()
            .route("/health", get(health))
            .route("/api/addresses/{user_id}", post(create_address))
            .route("/api/cart/{user_id}", put(put_cart))
            .route("/api/orders/place", post(place_order))
            .route("/api/orders/{order_id}", get(get_order))
            .route("/api/orders/user/{user_id}", get(list_orders))
            .route("/api/payments/initiate", post(initiate_payment))
            .route("/api/payments/verify", post(verify_payment))
            .route("/api/payments/status/{order_id}", get(payment_status))
            .layer(trace_layer)
            // the storefront calls from the browser origin
            .layer(CorsLayer::permissive())
            .with_state(self.service.clone())
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let app = self.router();
        let addr: SocketAddr = format!("0.0.0.0:{}", self.config.port).parse()?;
        tracing::info!("sandbox order/payment service on {}", addr);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        serve(listener, app.into_make_service()).await?;
        Ok(())
    }
}

async fn health() -> (axum::http::StatusCode, Json<serde_json::Value>) {
    (
        axum::http::StatusCode::OK,
        Json(serde_json::json!({ "status": "ok" })),
    )
}

async fn create_address(
    State(service): State<Shared>,
    Path(user_id): Path<i64>,
    Json(payload): Json<Address>,
) -> Result<Json<Address>, SandboxError> {
    Ok(Json(service.add_address(user_id, payload)?))
}

async fn put_cart(
    State(service): State<Shared>,
    Path(user_id): Path<i64>,
    Json(lines): Json<Vec<CartLine>>,
) -> Json<Vec<CartLine>> {
    service.put_cart(user_id, lines);
    Json(service.cart(user_id))
}

async fn place_order(
    State(service): State<Shared>,
    Json(payload): Json<PlaceOrderRequest>,
) -> Result<Json<Order>, SandboxError> {
    let order = service.place(payload.user_id, payload.address_id, payload.payment_method)?;
    Ok(Json(order))
}

async fn get_order(
    State(service): State<Shared>,
    Path(order_id): Path<i64>,
) -> Result<Json<Order>, SandboxError> {
    Ok(Json(service.get_order(order_id)?))
}

async fn list_orders(
    State(service): State<Shared>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<Order>>, SandboxError> {
    Ok(Json(service.user_orders(user_id)?))
}

async fn initiate_payment(
    State(service): State<Shared>,
    Json(payload): Json<InitiatePaymentRequest>,
) -> Result<Json<Payment>, SandboxError> {
    Ok(Json(service.initiate(payload.order_id, payload.method)?))
}

async fn verify_payment(
    State(service): State<Shared>,
    Json(payload): Json<VerifyPaymentRequest>,
) -> Result<Json<Payment>, SandboxError> {
    let payment = service.verify(
        payload.payment_id,
        &payload.transaction_id,
        payload.success,
    )?;
    Ok(Json(payment))
}

async fn payment_status(
    State(service): State<Shared>,
    Path(order_id): Path<i64>,
) -> Result<String, SandboxError> {
    Ok(match service.payment_status(order_id)? {
        Some(status) => status.to_string(),
        None => "NO PAYMENT FOUND".to_string(),
    })
}
