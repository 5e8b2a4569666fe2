use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use checkout_types::domain::address::Address;
use checkout_types::domain::order::{Order, OrderPlacement, PaymentMethod};
use checkout_types::domain::payment::{Payment, PaymentOutcome, PaymentStatus};
use checkout_types::ports::commerce_api::{ApiError, CommerceApi};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Upper bound for a single request unless the builder overrides it.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Configures a [`CommerceClient`]. Every request carries the default
/// headers; the bearer token is marked sensitive so it never shows up in
/// debug output.
#[derive(Clone)]
pub struct CommerceClientBuilder {
    base: Url,
    headers: HeaderMap,
    timeout: Duration,
    http: Option<reqwest::Client>,
}

/// HTTP adapter for the storefront's order, address and payment endpoints.
#[derive(Clone)]
pub struct CommerceClient {
    base: Url,
    client: reqwest::Client,
}

impl CommerceClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        Self::builder(base_url)?.build()
    }

    /// Relative routes are joined onto `base_url`, so a missing trailing
    /// slash is added rather than letting the last path segment be replaced.
    pub fn builder(base_url: &str) -> anyhow::Result<CommerceClientBuilder> {
        let mut base = Url::parse(base_url).context("invalid base url")?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        Ok(CommerceClientBuilder {
            base,
            headers,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            http: None,
        })
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base
            .join(path)
            .map_err(|e| ApiError::Transport(format!("failed to join url: {e}")))
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ApiError> {
        let res = req
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let status = res.status();
        if !status.is_success() {
            let body = error_message(&res.text().await.unwrap_or_default());
            tracing::debug!(status = %status, body = %body, "commerce api rejected request");
            return Err(ApiError::status(status.as_u16(), body));
        }
        res.json::<T>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    pub async fn create_address(&self, user_id: i64, address: &Address) -> Result<i64, ApiError> {
        let created: Address = self
            .send(
                self.client
                    .post(self.url(&format!("api/addresses/{user_id}"))?)
                    .json(address),
            )
            .await?;
        created
            .id
            .ok_or_else(|| ApiError::Decode("address response carried no id".into()))
    }

    pub async fn place_order(
        &self,
        user_id: i64,
        address_id: i64,
        method: PaymentMethod,
    ) -> Result<OrderPlacement, ApiError> {
        let req = PlaceOrderRequest {
            user_id,
            address_id,
            payment_method: method,
        };
        self.send(self.client.post(self.url("api/orders/place")?).json(&req))
            .await
    }

    pub async fn list_orders(&self, user_id: i64) -> Result<Vec<Order>, ApiError> {
        self.send(
            self.client
                .get(self.url(&format!("api/orders/user/{user_id}"))?),
        )
        .await
    }

    pub async fn initiate_payment(
        &self,
        order_id: i64,
        method: PaymentMethod,
    ) -> Result<Payment, ApiError> {
        let req = InitiatePaymentRequest { order_id, method };
        self.send(self.client.post(self.url("api/payments/initiate")?).json(&req))
            .await
    }

    pub async fn verify_payment(
        &self,
        payment_id: i64,
        transaction_id: &str,
        success: bool,
    ) -> Result<PaymentOutcome, ApiError> {
        let req = VerifyPaymentRequest {
            payment_id,
            transaction_id: transaction_id.to_string(),
            success,
        };
        self.send(self.client.post(self.url("api/payments/verify")?).json(&req))
            .await
    }

    /// Status of the order's payment, `None` when no payment exists yet.
    pub async fn payment_status(&self, order_id: i64) -> Result<Option<PaymentStatus>, ApiError> {
        let res = self
            .client
            .get(self.url(&format!("api/payments/status/{order_id}"))?)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        if !status.is_success() {
            return Err(ApiError::status(status.as_u16(), error_message(&body)));
        }
        parse_payment_status(&body)
    }
}

/// Unwraps `{"error": "..."}` bodies; anything else is passed through.
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: String,
    }
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(e) => e.error,
        Err(_) => body.to_string(),
    }
}

fn parse_payment_status(body: &str) -> Result<Option<PaymentStatus>, ApiError> {
    match body.trim().trim_matches('"') {
        "PENDING" => Ok(Some(PaymentStatus::Pending)),
        "SUCCESS" => Ok(Some(PaymentStatus::Success)),
        "FAILED" => Ok(Some(PaymentStatus::Failed)),
        "NO PAYMENT FOUND" => Ok(None),
        other => Err(ApiError::Decode(format!("unknown payment status {other:?}"))),
    }
}

#[async_trait]
impl CommerceApi for CommerceClient {
    async fn create_address(&self, user_id: i64, address: &Address) -> Result<i64, ApiError> {
        CommerceClient::create_address(self, user_id, address).await
    }

    async fn place_order(
        &self,
        user_id: i64,
        address_id: i64,
        method: PaymentMethod,
    ) -> Result<OrderPlacement, ApiError> {
        CommerceClient::place_order(self, user_id, address_id, method).await
    }

    async fn list_orders(&self, user_id: i64) -> Result<Vec<Order>, ApiError> {
        CommerceClient::list_orders(self, user_id).await
    }

    async fn initiate_payment(
        &self,
        order_id: i64,
        method: PaymentMethod,
    ) -> Result<Payment, ApiError> {
        CommerceClient::initiate_payment(self, order_id, method).await
    }

    async fn verify_payment(
        &self,
        payment_id: i64,
        transaction_id: &str,
        success: bool,
    ) -> Result<PaymentOutcome, ApiError> {
        CommerceClient::verify_payment(self, payment_id, transaction_id, success).await
    }
}

impl CommerceClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn header(self, name: &str, value: &str) -> anyhow::Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .with_context(|| format!("invalid header name {name:?}"))?;
        let value = HeaderValue::from_str(value).context("invalid header value")?;
        Ok(self.insert(name, value))
    }

    pub fn bearer_auth(self, token: &str) -> anyhow::Result<Self> {
        let mut value =
            HeaderValue::from_str(&format!("Bearer {token}")).context("invalid bearer token")?;
        value.set_sensitive(true);
        Ok(self.insert(AUTHORIZATION, value))
    }

    /// Uses a preconfigured client as is; default headers and timeout set
    /// on this builder are then ignored.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http = Some(client);
        self
    }

    fn insert(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn build(self) -> anyhow::Result<CommerceClient> {
        let client = match self.http {
            Some(client) => client,
            None => reqwest::Client::builder()
                .default_headers(self.headers)
                .timeout(self.timeout)
                .build()
                .context("failed to build http client")?,
        };
        Ok(CommerceClient {
            base: self.base,
            client,
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub user_id: i64,
    pub address_id: i64,
    pub payment_method: PaymentMethod,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentRequest {
    pub order_id: i64,
    pub method: PaymentMethod,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    pub payment_id: i64,
    pub transaction_id: String,
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkout_types::domain::money::Money;
    use checkout_types::domain::order::{OrderItem, OrderStatus};
    use httpmock::prelude::*;

    fn springfield() -> Address {
        Address::new("1 Main St", "Springfield", "IL", "62704", "US")
    }

    fn sample_order() -> Order {
        Order {
            order_id: 1,
            user_id: Some(7),
            address_id: Some(3),
            payment_method: Some(PaymentMethod::Card),
            total_amount: Money::from_cents(99999).unwrap(),
            status: OrderStatus::Pending,
            created_at: Some(chrono::Utc::now()),
            items: vec![OrderItem {
                product_id: 1,
                product_name: "Laptop".into(),
                quantity: 1,
                price: Money::from_cents(99999).unwrap(),
            }],
        }
    }

    #[tokio::test]
    async fn create_address_and_place_order() {
        let server = MockServer::start();

        let address_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/addresses/7")
                .header("authorization", "Bearer tok")
                .json_body_obj(&springfield());
            let mut saved = springfield();
            saved.id = Some(3);
            then.status(200).json_body_obj(&saved);
        });

        let order_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/orders/place")
                .json_body_obj(&PlaceOrderRequest {
                    user_id: 7,
                    address_id: 3,
                    payment_method: PaymentMethod::Card,
                });
            then.status(200).json_body(serde_json::json!({
                "orderId": 1,
                "totalAmount": 999.99,
                "status": "PENDING",
                "items": []
            }));
        });

        let client = CommerceClient::builder(&server.base_url())
            .unwrap()
            .bearer_auth("tok")
            .unwrap()
            .build()
            .unwrap();

        let address_id = client.create_address(7, &springfield()).await.unwrap();
        assert_eq!(address_id, 3);

        let placed = client
            .place_order(7, address_id, PaymentMethod::Card)
            .await
            .unwrap();
        assert_eq!(placed.order_id, 1);
        assert_eq!(placed.total_amount.to_string(), "999.99");
        assert_eq!(placed.status, OrderStatus::Pending);

        address_mock.assert();
        order_mock.assert();
    }

    #[tokio::test]
    async fn initiate_verify_and_status() {
        let server = MockServer::start();

        let initiate_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/payments/initiate")
                .json_body_obj(&InitiatePaymentRequest {
                    order_id: 1,
                    method: PaymentMethod::Card,
                });
            then.status(200).json_body(serde_json::json!({
                "paymentId": 1,
                "orderId": 1,
                "amount": 999.99,
                "status": "PENDING",
                "transactionId": "T1"
            }));
        });

        let verify_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/payments/verify")
                .json_body_obj(&VerifyPaymentRequest {
                    payment_id: 1,
                    transaction_id: "T1".into(),
                    success: true,
                });
            then.status(200).json_body(serde_json::json!({
                "paymentId": 1,
                "orderId": 1,
                "amount": 999.99,
                "status": "SUCCESS",
                "transactionId": "T1"
            }));
        });

        let status_mock = server.mock(|when, then| {
            when.method(GET).path("/api/payments/status/1");
            then.status(200).body("SUCCESS");
        });

        let client = CommerceClient::new(&server.base_url()).unwrap();
        let payment = client
            .initiate_payment(1, PaymentMethod::Card)
            .await
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.transaction_id, "T1");

        let outcome = client.verify_payment(1, "T1", true).await.unwrap();
        assert!(outcome.succeeded());

        let status = client.payment_status(1).await.unwrap();
        assert_eq!(status, Some(PaymentStatus::Success));

        initiate_mock.assert();
        verify_mock.assert();
        status_mock.assert();
    }

    #[tokio::test]
    async fn list_orders_and_error_statuses() {
        let server = MockServer::start();
        let order = sample_order();

        let list_mock = server.mock(|when, then| {
            when.method(GET).path("/api/orders/user/7");
            then.status(200).json_body_obj(&vec![order.clone()]);
        });

        let failing_mock = server.mock(|when, then| {
            when.method(POST).path("/api/orders/place");
            then.status(400).body("Cart is empty");
        });

        let client = CommerceClient::new(&server.base_url()).unwrap();
        let listed = client.list_orders(7).await.unwrap();
        assert_eq!(listed, vec![order]);

        let err = client
            .place_order(7, 3, PaymentMethod::Card)
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::status(400, "Cart is empty"));

        list_mock.assert();
        failing_mock.assert();
    }

    #[tokio::test]
    async fn address_without_id_is_a_decode_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/addresses/7");
            then.status(200).json_body_obj(&springfield());
        });

        let client = CommerceClient::new(&server.base_url()).unwrap();
        let err = client.create_address(7, &springfield()).await.unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn payment_status_text_parsing() {
        assert_eq!(parse_payment_status("\"PENDING\"").unwrap(), Some(PaymentStatus::Pending));
        assert_eq!(parse_payment_status("NO PAYMENT FOUND").unwrap(), None);
        assert!(parse_payment_status("WHAT").is_err());
    }

    #[test]
    fn json_error_bodies_are_unwrapped() {
        assert_eq!(error_message(r#"{"error":"Order not found"}"#), "Order not found");
        assert_eq!(error_message("plain text"), "plain text");
    }

    #[test]
    fn base_path_is_kept_when_joining_routes() {
        let client = CommerceClient::new("http://shop.test/storefront").unwrap();
        assert_eq!(
            client.url("api/orders/place").unwrap().as_str(),
            "http://shop.test/storefront/api/orders/place"
        );
        assert!(CommerceClient::builder("not a url").is_err());
        assert!(CommerceClient::builder("http://shop.test/")
            .unwrap()
            .header("bad header", "x")
            .is_err());
    }

    #[tokio::test]
    async fn default_headers_reach_the_server() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/orders/user/7")
                .header("accept", "application/json")
                .header("x-client", "checkout");
            then.status(200).json_body(serde_json::json!([]));
        });

        let client = CommerceClient::builder(&server.base_url())
            .unwrap()
            .header("x-client", "checkout")
            .unwrap()
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        assert!(client.list_orders(7).await.unwrap().is_empty());
        mock.assert();
    }
}
