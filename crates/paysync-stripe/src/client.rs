//! Stripe API client implementation.

use std::time::Duration;

use paysync_sync::{ProviderError, Result};
use reqwest::{header::RETRY_AFTER, Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::params::FormParams;
use crate::types::StripeErrorResponse;

/// Stripe API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.stripe.com/v1";

/// Request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl StripeClient {
    /// Create a new Stripe client.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Stripe secret API key (`sk_test_...` or `sk_live_...`)
    /// * `base_url` - API base override; defaults to [`DEFAULT_API_BASE`]
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Configuration` if the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>, base_url: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Configuration(format!("HTTP client: {e}")))?;

        let base_url = base_url
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// The API base URL in use.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` with query parameters.
    ///
    /// # Errors
    ///
    /// Returns the mapped HTTP, API or decode error.
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &FormParams) -> Result<T> {
        debug!(method = "GET", path, "Stripe request");
        let request = self.client.get(self.url(path)).query(query.as_slice());
        self.send(request).await
    }

    /// POST `path` with a form body.
    ///
    /// # Errors
    ///
    /// Returns the mapped HTTP, API or decode error.
    pub async fn post<T: DeserializeOwned>(&self, path: &str, form: &FormParams) -> Result<T> {
        debug!(method = "POST", path, params = form.as_slice().len(), "Stripe request");
        let request = self.client.post(self.url(path)).form(form.as_slice());
        self.send(request).await
    }

    /// DELETE `path`.
    ///
    /// # Errors
    ///
    /// Returns the mapped HTTP, API or decode error.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        debug!(method = "DELETE", path, "Stripe request");
        let request = self.client.delete(self.url(path));
        self.send(request).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request
            .basic_auth(&self.api_key, Option::<&str>::None)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        Self::handle_response(response).await
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        let body = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        if status.is_success() {
            return serde_json::from_slice(&body).map_err(|e| ProviderError::Decode(e.to_string()));
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited { retry_after });
        }

        // Try to parse error response
        match serde_json::from_slice::<StripeErrorResponse>(&body) {
            Ok(stripe_error) => Err(ProviderError::Api {
                status: status.as_u16(),
                error_type: stripe_error.error.error_type,
                message: stripe_error.error.message,
                code: stripe_error.error.code,
            }),
            Err(_) => Err(ProviderError::Api {
                status: status.as_u16(),
                error_type: "unknown".to_string(),
                message: format!("HTTP {status}"),
                code: None,
            }),
        }
    }
}

/// Turn a 404 into `ProviderError::NotFound` for `entity`.
pub(crate) fn not_found(
    entity: &'static str,
    id: &str,
) -> impl FnOnce(ProviderError) -> ProviderError {
    let id = id.to_string();
    move |error| match error {
        ProviderError::Api { status: 404, .. } => ProviderError::NotFound { entity, id },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_defaults_and_trims() {
        let client = StripeClient::new("sk_test_xxx", None).unwrap();
        assert_eq!(client.base_url(), DEFAULT_API_BASE);

        let client =
            StripeClient::new("sk_test_xxx", Some("http://127.0.0.1:9/v1/".into())).unwrap();
        assert_eq!(client.url("/customers"), "http://127.0.0.1:9/v1/customers");
    }

    #[test]
    fn debug_hides_key() {
        let client = StripeClient::new("sk_test_secret", None).unwrap();
        assert!(!format!("{client:?}").contains("sk_test_secret"));
    }

    #[test]
    fn not_found_maps_only_404() {
        let api = |status| ProviderError::Api {
            status,
            error_type: "invalid_request_error".into(),
            message: "No such customer".into(),
            code: Some("resource_missing".into()),
        };

        let mapped = not_found("customer", "cus_1")(api(404));
        assert!(matches!(mapped, ProviderError::NotFound { entity: "customer", .. }));

        let kept = not_found("customer", "cus_1")(api(400));
        assert!(matches!(kept, ProviderError::Api { status: 400, .. }));
    }
}
