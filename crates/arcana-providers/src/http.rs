use std::time::Duration;

use arcana_core::{Error, ProviderError, Result};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Error as ReqwestError, StatusCode};

/// Longest backend message carried into an error.
const MAX_MESSAGE_CHARS: usize = 500;

/// Builds an HTTP client with the given overall request timeout.
///
/// # Errors
/// Returns an error if the TLS backend cannot be initialized.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder().timeout(timeout).build().map_err(Error::from)
}

/// Parses a `Retry-After` header given in (possibly fractional) seconds.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?;
    let secs = raw.trim().parse::<f64>().ok()?;
    (secs.is_finite() && secs >= 0.0).then(|| Duration::from_secs_f64(secs))
}

/// Maps a non-success HTTP status onto the provider error taxonomy.
pub fn classify_status(
    provider: &str,
    status: StatusCode,
    headers: &HeaderMap,
    body: &str,
) -> ProviderError {
    let provider = provider.to_owned();
    let message = format!("{status}: {}", truncate_message(body));

    match status.as_u16() {
        429 => ProviderError::RateLimited {
            provider,
            message,
            retry_after: parse_retry_after(headers),
        },
        401 | 403 => ProviderError::Unauthenticated { provider, message },
        400 | 404 | 413 | 422 => ProviderError::InvalidRequest { provider, message },
        408 | 504 => ProviderError::TimedOut {
            provider,
            elapsed_ms: 0,
        },
        _ => ProviderError::Unavailable { provider, message },
    }
}

/// Maps a transport-level failure (connect, DNS, body decode).
pub fn classify_transport(provider: &str, error: &ReqwestError, elapsed: Duration) -> ProviderError {
    if error.is_timeout() {
        ProviderError::TimedOut {
            provider: provider.to_owned(),
            elapsed_ms: elapsed.as_millis() as u64,
        }
    } else {
        ProviderError::Unavailable {
            provider: provider.to_owned(),
            message: error.to_string(),
        }
    }
}

/// Error for a call cut off by the per-call timeout.
pub fn timed_out(provider: &str, elapsed: Duration) -> ProviderError {
    ProviderError::TimedOut {
        provider: provider.to_owned(),
        elapsed_ms: elapsed.as_millis() as u64,
    }
}

/// Error for a success response the adapter could not decode.
pub fn malformed_body(provider: &str, detail: &str) -> ProviderError {
    ProviderError::Unavailable {
        provider: provider.to_owned(),
        message: format!("malformed response body: {}", truncate_message(detail)),
    }
}

/// Shortens long backend messages.
fn truncate_message(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_MESSAGE_CHARS {
        trimmed.to_owned()
    } else {
        let head: String = trimmed.chars().take(MAX_MESSAGE_CHARS).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_rate_limit_reads_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("2.5"));

        let error = classify_status("groq", StatusCode::TOO_MANY_REQUESTS, &headers, "slow down");
        assert_eq!(error.retry_after(), Some(Duration::from_millis(2500)));
        assert!(matches!(error, ProviderError::RateLimited { .. }));
    }

    #[test]
    fn test_status_taxonomy() {
        let headers = HeaderMap::new();
        let cases = [
            (StatusCode::UNAUTHORIZED, "unauthenticated"),
            (StatusCode::FORBIDDEN, "unauthenticated"),
            (StatusCode::BAD_REQUEST, "invalid_request"),
            (StatusCode::UNPROCESSABLE_ENTITY, "invalid_request"),
            (StatusCode::GATEWAY_TIMEOUT, "timed_out"),
            (StatusCode::INTERNAL_SERVER_ERROR, "unavailable"),
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
        ];
        for (status, kind) in cases {
            let error = classify_status("openai", status, &headers, "");
            let json = serde_json::to_value(&error).unwrap();
            assert_eq!(json["kind"], kind, "status {status}");
        }
    }

    #[test]
    fn test_unparseable_retry_after_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn test_long_messages_are_truncated() {
        let body = "x".repeat(2_000);
        let error = classify_status("openai", StatusCode::BAD_GATEWAY, &HeaderMap::new(), &body);
        assert!(error.to_string().len() < 700);
    }
}
