//! Transport plumbing shared by the HTTP adapters.
//!
//! Every adapter posts one JSON body and decodes one JSON reply; what differs
//! is the body and the reply. This module owns the client construction, the
//! status-code mapping, and the race against the cancellation token.

use std::time::Duration;

use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use tiller_core::error::ProviderError;
use tokio_util::sync::CancellationToken;
use tracing::warn;

const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// Build a client with the configured per-request timeout.
pub(crate) fn build_client(timeout_secs: u64) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ProviderError::NotConfigured(format!("Failed to create HTTP client: {e}")))
}

/// Send `request` and decode the JSON reply, unless `cancel` fires first.
pub(crate) async fn send_json<T: DeserializeOwned>(
    cancel: &CancellationToken,
    request: RequestBuilder,
    provider: &str,
    model: &str,
) -> Result<T, ProviderError> {
    let call = async {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            return Err(ProviderError::RateLimited { retry_after_secs });
        }
        if !(200..300).contains(&status) {
            let error_body = response.text().await.unwrap_or_default();
            warn!(provider, status, body = %error_body, "Provider API error");
            return Err(status_error(status, error_body, provider, model));
        }

        let body = response.text().await.map_err(transport_error)?;
        serde_json::from_str(&body).map_err(|e| {
            ProviderError::MalformedResponse(format!("Failed to parse {provider} response: {e}"))
        })
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProviderError::Cancelled),
        result = call => result,
    }
}

/// Map a non-success status to an error. A 404 mentioning the model means the
/// backend does not know it.
fn status_error(status: u16, body: String, provider: &str, model: &str) -> ProviderError {
    if status == 401 || status == 403 {
        let body = body.trim();
        return ProviderError::AuthenticationFailed(if body.is_empty() {
            format!("{provider} rejected the API key (status {status})")
        } else {
            format!("{provider} rejected the API key (status {status}): {body}")
        });
    }
    if status == 404 && body.to_lowercase().contains("model") {
        return ProviderError::UnknownModel {
            provider: provider.to_string(),
            model: model.to_string(),
        };
    }
    ProviderError::ApiError {
        status_code: status,
        message: body,
    }
}

fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}
