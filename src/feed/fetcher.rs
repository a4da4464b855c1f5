use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

/// Request timeout for a single feed fetch.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
/// The warnings feed is a few KB; 2MB leaves generous headroom.
const MAX_FEED_SIZE: usize = 2 * 1024 * 1024;

/// Errors that can occur while fetching the raw feed text.
///
/// Any of these fails the refresh cycle as a whole; the controller keeps the
/// previous snapshot and reports the failure to its subscribers.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the 30-second timeout
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Fetches the warnings feed and returns its body as text.
///
/// # Arguments
///
/// * `client` - HTTP client (allows custom configuration and reuse across cycles)
/// * `url` - Full feed URL (base + region code)
///
/// # Errors
///
/// Returns a [`FetchError`] for network failures, timeouts, non-2xx statuses,
/// and oversized or truncated bodies. There is no retry here: the periodic
/// refresh cycle is the retry, and a failed cycle leaves the previous
/// snapshot in place.
pub async fn fetch_feed(client: &reqwest::Client, url: &str) -> Result<String, FetchError> {
    let response = tokio::time::timeout(FETCH_TIMEOUT, client.get(url).send())
        .await
        .map_err(|_| FetchError::Timeout)?
        .map_err(FetchError::Network)?;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    let bytes = read_limited_bytes(response, MAX_FEED_SIZE).await?;

    // The Met Office feed declares UTF-8; lossy conversion keeps a stray
    // mis-encoded byte from failing the whole cycle.
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Capture Content-Length for completeness check
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    // A network interruption mid-body shows up as fewer bytes than the header
    // promised; surface it rather than handing truncated XML downstream.
    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Warnings</title>
    <item><title>Yellow warning of Wind affecting somewhere</title></item>
</channel></rss>"#;

    #[tokio::test]
    async fn test_fetch_success_returns_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .insert_header("Content-Type", "application/xml"),
            )
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let body = fetch_feed(&client, &format!("{}/feed", mock_server.uri()))
            .await
            .unwrap();
        assert!(body.contains("Yellow warning of Wind"));
    }

    #[tokio::test]
    async fn test_fetch_404_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let result = fetch_feed(&client, &format!("{}/feed", mock_server.uri())).await;
        match result.unwrap_err() {
            FetchError::HttpStatus(404) => {}
            e => panic!("Expected HttpStatus(404), got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_fetch_unreachable_is_network_error() {
        // Port 1 on localhost should refuse the connection immediately
        let client = reqwest::Client::new();
        let result = fetch_feed(&client, "http://127.0.0.1:1/feed").await;
        match result.unwrap_err() {
            FetchError::Network(_) => {}
            e => panic!("Expected Network error, got {:?}", e),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_timeout_on_hung_response() {
        let mock_server = MockServer::start().await;
        // Response delay is a tokio timer, so with the clock paused the
        // 30-second timeout fires deterministically and without real waiting
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .set_delay(Duration::from_secs(60)),
            )
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let result = fetch_feed(&client, &format!("{}/feed", mock_server.uri())).await;
        match result.unwrap_err() {
            FetchError::Timeout => {}
            e => panic!("Expected Timeout, got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_fetch_oversized_body_rejected() {
        let mock_server = MockServer::start().await;
        let big = "x".repeat(MAX_FEED_SIZE + 1);
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(big))
            .mount(&mock_server)
            .await;

        let client = reqwest::Client::new();
        let result = fetch_feed(&client, &format!("{}/feed", mock_server.uri())).await;
        match result.unwrap_err() {
            FetchError::ResponseTooLarge => {}
            e => panic!("Expected ResponseTooLarge, got {:?}", e),
        }
    }
}
