//! Model endpoint clients for Aru.
//!
//! All providers implement `aru_core::Provider`. The router picks one from
//! the `provider/model` string in configuration.

pub mod anthropic;
pub mod openai_compat;
pub mod router;

pub use anthropic::AnthropicProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use router::{ProviderRouter, build_from_config};

use aru_core::error::ProviderError;
use tracing::warn;

fn http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}

/// Map a non-200 response onto the provider error taxonomy.
fn status_error(provider: &str, status: u16, body: String) -> ProviderError {
    match status {
        429 => ProviderError::RateLimited { retry_after_secs: 5 },
        401 | 403 => ProviderError::AuthenticationFailed(format!("{provider} rejected the API key")),
        404 => ProviderError::ModelNotFound(body),
        _ => {
            warn!(provider, status, body = %body, "Provider returned error");
            ProviderError::ApiError {
                status_code: status,
                message: body,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert!(matches!(status_error("openai", 429, String::new()), ProviderError::RateLimited { .. }));
        assert!(matches!(status_error("openai", 401, String::new()), ProviderError::AuthenticationFailed(_)));
        assert!(matches!(
            status_error("openai", 500, "boom".into()),
            ProviderError::ApiError { status_code: 500, .. }
        ));
    }
}
