//! Square payments API client.
//!
//! # Endpoints
//!
//! - `POST /v2/online-checkout/payment-links`: hosted checkout page plus the
//!   Square order it will pay for
//! - `GET /v2/orders/{order_id}`: order state, tenders, and amounts due
//!
//! Both calls time out after 15 seconds and are retried once on timeouts,
//! connection failures, and 5xx responses. Link creation carries an
//! idempotency key, so a retry never creates a second link.

mod error;
pub mod types;
pub mod webhook;

pub use error::{ApiErrorResponse, SquareError};
pub use types::*;

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::instrument;

use crate::config::SquareConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const MAX_ATTEMPTS: u32 = 2;
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Square API client.
#[derive(Clone)]
pub struct SquareClient {
    inner: Arc<SquareClientInner>,
}

struct SquareClientInner {
    client: reqwest::Client,
    base_url: String,
    location_id: String,
}

impl SquareClient {
    /// Create a new Square client.
    ///
    /// # Errors
    ///
    /// Returns `SquareError::Unauthorized` if the token isn't a valid header
    /// value, or `SquareError::Http` if the HTTP client can't be built.
    pub fn new(config: &SquareConfig) -> Result<Self, SquareError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut auth = HeaderValue::from_str(&format!(
            "Bearer {}",
            config.access_token.expose_secret()
        ))
        .map_err(|_| SquareError::Unauthorized("access token is not a valid header".to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        headers.insert(
            "Square-Version",
            HeaderValue::from_str(&config.api_version)
                .map_err(|e| SquareError::Parse(format!("invalid Square-Version: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            inner: Arc::new(SquareClientInner {
                client,
                base_url: config.environment.base_url().to_string(),
                location_id: config.location_id.clone(),
            }),
        })
    }

    /// Location that online orders are created under.
    #[must_use]
    pub fn location_id(&self) -> &str {
        &self.inner.location_id
    }

    /// Create a hosted checkout page for a new Square order.
    ///
    /// # Errors
    ///
    /// Returns an error if Square rejects the request or cannot be reached.
    #[instrument(skip(self, request), fields(reference_id = %request.order.reference_id))]
    pub async fn create_payment_link(
        &self,
        request: &CreatePaymentLinkRequest,
    ) -> Result<PaymentLink, SquareError> {
        let url = format!("{}/v2/online-checkout/payment-links", self.inner.base_url);
        let response: CreatePaymentLinkResponse = self
            .execute(|| self.inner.client.post(&url).json(request))
            .await?;

        tracing::info!(
            payment_link_id = %response.payment_link.id,
            square_order_id = %response.payment_link.order_id,
            "Payment link created"
        );
        Ok(response.payment_link)
    }

    /// Fetch a Square order.
    ///
    /// # Errors
    ///
    /// Returns an error if the order doesn't exist or Square cannot be reached.
    #[instrument(skip(self))]
    pub async fn retrieve_order(&self, order_id: &str) -> Result<SquareOrder, SquareError> {
        let url = format!("{}/v2/orders/{order_id}", self.inner.base_url);
        let response: RetrieveOrderResponse =
            self.execute(|| self.inner.client.get(&url)).await?;
        Ok(response.order)
    }

    /// Send a request, retrying once if the failure looks transient.
    async fn execute<T, F>(&self, build: F) -> Result<T, SquareError>
    where
        T: DeserializeOwned,
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 1;
        loop {
            match self.attempt(build()).await {
                Err(err) if err.is_transient() && attempt < MAX_ATTEMPTS => {
                    tracing::warn!(error = %err, attempt, "Square request failed, retrying");
                    attempt += 1;
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                result => return result,
            }
        }
    }

    async fn attempt<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, SquareError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SquareError::Timeout
            } else {
                SquareError::Http(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(handle_error_status(status, response).await);
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                SquareError::Timeout
            } else {
                SquareError::Http(e)
            }
        })?;

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse Square response"
            );
            SquareError::Parse(e.to_string())
        })
    }
}

/// Turn a non-success response into a `SquareError`.
async fn handle_error_status(
    status: reqwest::StatusCode,
    response: reqwest::Response,
) -> SquareError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(1);
        return SquareError::RateLimited(retry_after);
    }

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return SquareError::Unauthorized("access token rejected".to_string());
    }

    match response.text().await {
        Ok(body) => parse_error_body(status, &body),
        Err(e) => SquareError::Http(e),
    }
}

fn parse_error_body(status: reqwest::StatusCode, body: &str) -> SquareError {
    if let Ok(parsed) = serde_json::from_str::<ApiErrorResponse>(body)
        && let Some(first) = parsed.errors.into_iter().next()
    {
        return first.into();
    }

    let category = if status.is_server_error() {
        "API_ERROR"
    } else {
        "INVALID_REQUEST_ERROR"
    };
    SquareError::Api {
        category: category.to_string(),
        code: status.as_u16().to_string(),
        detail: body.chars().take(200).collect(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;
    use crate::config::SquareEnvironment;

    fn config() -> SquareConfig {
        SquareConfig {
            access_token: SecretString::from("EAAAl9xq3-token"),
            location_id: "L8RW2ZP3KQ".to_string(),
            environment: SquareEnvironment::Sandbox,
            api_version: "2025-01-23".to_string(),
            webhook_signature_key: None,
            webhook_notification_url: "http://localhost:3000/webhooks/square".to_string(),
        }
    }

    #[test]
    fn test_client_builds() {
        let client = SquareClient::new(&config()).unwrap();
        assert_eq!(client.location_id(), "L8RW2ZP3KQ");
    }

    #[test]
    fn test_bad_token_rejected() {
        let mut cfg = config();
        cfg.access_token = SecretString::from("line\nbreak");
        assert!(matches!(
            SquareClient::new(&cfg),
            Err(SquareError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_parse_error_body_prefers_square_errors() {
        let err = parse_error_body(
            reqwest::StatusCode::BAD_REQUEST,
            r#"{"errors":[{"category":"INVALID_REQUEST_ERROR","code":"MISSING_REQUIRED_PARAMETER","detail":"Missing location_id"}]}"#,
        );
        assert!(
            matches!(err, SquareError::Api { ref code, .. } if code == "MISSING_REQUIRED_PARAMETER")
        );
        assert!(!err.is_transient());
    }

    #[test]
    fn test_unparseable_5xx_is_transient() {
        let err = parse_error_body(reqwest::StatusCode::BAD_GATEWAY, "<html>upstream</html>");
        assert!(err.is_transient());
        assert!(matches!(err, SquareError::Api { ref code, .. } if code == "502"));
    }

    #[test]
    fn test_square_client_is_send_sync_clone() {
        fn assert_traits<T: Send + Sync + Clone>() {}
        assert_traits::<SquareClient>();
    }
}
