use log::debug;
use reqwest::{Client, ClientBuilder, Response, StatusCode, Url};
use std::time::Duration;
use tokio::time::sleep;

use super::client::ClientConfig;
use crate::error::{PolsigError, Result};

/// Build the HTTP client shared by one source adapter
pub fn build_client(config: &ClientConfig) -> Result<Client> {
    ClientBuilder::new()
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(30))
        .timeout(Duration::from_secs(config.timeout))
        .tcp_keepalive(Duration::from_secs(60))
        .tcp_nodelay(true)
        .user_agent(config.user_agent.clone())
        .cookie_store(true)
        .use_rustls_tls()
        .build()
        .map_err(PolsigError::Network)
}

/// Join a base URL and a path without doubling slashes
pub fn endpoint(base: &str, path: &str) -> Result<Url> {
    let joined = format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|e| PolsigError::Parse(format!("Invalid URL {}: {}", joined, e)))
}

/// Build a URL with query parameters in the given order
pub fn with_params<K, V>(url: Url, params: &[(K, V)]) -> Url
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut url = url;
    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in params {
            pairs.append_pair(key.as_ref(), value.as_ref());
        }
    }
    url
}

/// Execute a GET with retry: 429, 5xx and transport failures are retried
/// with exponential backoff, other non-2xx statuses fail immediately.
pub async fn execute_with_retry(
    client: &Client,
    config: &ClientConfig,
    url: &Url,
) -> Result<Response> {
    let mut last_error = None;
    let mut retry_delay = Duration::from_millis(config.retry_base_delay);

    for attempt in 0..config.max_retries.max(1) {
        if attempt > 0 {
            debug!("Retrying {} (attempt {})", url, attempt + 1);
            sleep(retry_delay).await;
            retry_delay *= 2;
        }

        let error = match client.get(url.clone()).send().await {
            Ok(response) if response.status().is_success() => return Ok(response),
            Ok(response) => status_error(url, response.status()),
            Err(e) => PolsigError::Network(e),
        };
        if !error.is_retryable() {
            return Err(error);
        }
        last_error = Some(error);
    }

    Err(last_error
        .unwrap_or_else(|| PolsigError::Other("Request failed after all retries".to_string())))
}

fn status_error(url: &Url, status: StatusCode) -> PolsigError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        PolsigError::RateLimit
    } else if status.is_server_error() {
        PolsigError::ServerError(format!("Server returned status {}", status))
    } else {
        PolsigError::api_error(
            status.as_u16().to_string(),
            format!("Request to {} failed with status {}", url.path(), status),
            None,
        )
    }
}

/// Fetch a body as text and reject HTML error pages served in place of JSON
pub async fn get_json_text(client: &Client, config: &ClientConfig, url: &Url) -> Result<String> {
    let response = execute_with_retry(client, config, url).await?;

    let is_html = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.contains("text/html"))
        .unwrap_or(false);

    let text = response.text().await.map_err(PolsigError::Network)?;

    if is_html || text.trim_start().starts_with('<') {
        return Err(PolsigError::invalid_response(
            "HTML",
            "service returned HTML instead of JSON",
        ));
    }
    if text.trim().is_empty() {
        return Err(PolsigError::invalid_response("EMPTY", "service returned an empty body"));
    }
    Ok(text)
}

/// Fetch a body as text without content checks (RSS, XML)
pub async fn get_text(client: &Client, config: &ClientConfig, url: &Url) -> Result<String> {
    let response = execute_with_retry(client, config, url).await?;
    response.text().await.map_err(PolsigError::Network)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let url = endpoint("https://laws.e-gov.go.jp/api/2/", "/laws").unwrap();
        assert_eq!(url.as_str(), "https://laws.e-gov.go.jp/api/2/laws");
    }

    #[test]
    fn test_params_keep_insertion_order() {
        let url = endpoint("http://localhost", "getStatsData").unwrap();
        let url = with_params(url, &[("appId", "x"), ("statsDataId", "1"), ("limit", "5")]);
        assert_eq!(url.query(), Some("appId=x&statsDataId=1&limit=5"));
    }

    #[tokio::test]
    async fn test_html_body_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/api")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let config = ClientConfig::default();
        let client = build_client(&config).unwrap();
        let url = endpoint(&server.url(), "api").unwrap();
        let err = get_json_text(&client, &config, &url).await.unwrap_err();
        assert!(matches!(err, PolsigError::UpstreamInvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", "/missing")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let config = ClientConfig::default();
        let client = build_client(&config).unwrap();
        let url = endpoint(&server.url(), "missing").unwrap();
        let err = execute_with_retry(&client, &config, &url).await.unwrap_err();
        assert!(matches!(err, PolsigError::ApiError { .. }));
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_retries_then_fails() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", "/flaky")
            .with_status(503)
            .expect(2)
            .create_async()
            .await;

        let config = ClientConfig {
            max_retries: 2,
            retry_base_delay: 1,
            ..Default::default()
        };
        let client = build_client(&config).unwrap();
        let url = endpoint(&server.url(), "flaky").unwrap();
        let err = execute_with_retry(&client, &config, &url).await.unwrap_err();
        assert!(matches!(err, PolsigError::ServerError(_)));
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", "/busy")
            .with_status(429)
            .expect(3)
            .create_async()
            .await;

        let config = ClientConfig {
            max_retries: 3,
            retry_base_delay: 1,
            ..Default::default()
        };
        let client = build_client(&config).unwrap();
        let url = endpoint(&server.url(), "busy").unwrap();
        let err = execute_with_retry(&client, &config, &url).await.unwrap_err();
        assert!(matches!(err, PolsigError::RateLimit));
        m.assert_async().await;
    }
}
