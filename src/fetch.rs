//! HTTP input: fetch a buffered SSE body from a URL.
//!
//! One GET request; the body is read to completion (bounded by `fetch.max_bytes`) and handed to
//! the parser as a single blob.

use crate::config::FetchConfig;
use anyhow::Context;
use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::{ACCEPT, HeaderName, HeaderValue};
use std::time::Duration;
use tracing::debug;

/// Build a reqwest client with timeouts from fetch config.
pub fn build_client(cfg: &FetchConfig) -> anyhow::Result<Client> {
    let timeout = Duration::from_secs(cfg.timeout_secs);
    Client::builder()
        .connect_timeout(Duration::from_secs(std::cmp::min(10, cfg.timeout_secs)))
        .timeout(timeout)
        .build()
        .context("build reqwest client")
}

/// Build the GET request with `Accept: text/event-stream` and configured extra headers.
pub fn build_request(client: &Client, cfg: &FetchConfig, url: &str) -> anyhow::Result<reqwest::Request> {
    let mut req = client
        .get(url)
        .header(ACCEPT, HeaderValue::from_static("text/event-stream"));
    for (k, v) in &cfg.headers {
        let name = HeaderName::try_from(k.as_str())
            .with_context(|| format!("invalid header name: {:?}", k))?;
        let value = HeaderValue::try_from(v.as_str())
            .with_context(|| format!("invalid header value for {}: {:?}", k, v))?;
        req = req.header(name, value);
    }
    req.build().context("build request")
}

/// GET `url` and return the full body as text. Non-2xx status and bodies over `max_bytes` are errors.
pub async fn fetch_text(cfg: &FetchConfig, url: &str) -> anyhow::Result<String> {
    let client = build_client(cfg)?;
    let req = build_request(&client, cfg, url)?;
    let response = client
        .execute(req)
        .await
        .with_context(|| format!("GET {}", url))?;
    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("GET {} returned {}", url, status);
    }
    let mut body: Vec<u8> = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.with_context(|| format!("read body of {}", url))?;
        body.extend_from_slice(&chunk);
        if let Some(max) = cfg.max_bytes
            && body.len() as u64 > max
        {
            anyhow::bail!("response body from {} exceeds max_bytes ({})", url, max);
        }
    }
    debug!(url, bytes = body.len(), %status, "fetched SSE body");
    String::from_utf8(body).with_context(|| format!("response body from {} is not UTF-8", url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn request_carries_accept_and_extra_headers() {
        let mut cfg = FetchConfig::default();
        cfg.headers.insert("X-Trace".to_string(), "abc".to_string());
        let client = build_client(&cfg).unwrap();
        let req = build_request(&client, &cfg, "http://localhost/stream").unwrap();
        assert_eq!(req.headers()[ACCEPT], "text/event-stream");
        assert_eq!(req.headers()["x-trace"], "abc");
    }

    #[test]
    fn invalid_header_name_is_error() {
        let mut cfg = FetchConfig::default();
        cfg.headers.insert("bad header".to_string(), "v".to_string());
        let client = build_client(&cfg).unwrap();
        assert!(build_request(&client, &cfg, "http://localhost/").is_err());
    }

    #[tokio::test]
    async fn fetch_text_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/events"))
            .and(header("accept", "text/event-stream"))
            .respond_with(ResponseTemplate::new(200).set_body_string("data: {\"a\":1}\n\n"))
            .mount(&server)
            .await;
        let body = fetch_text(&FetchConfig::default(), &format!("{}/events", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "data: {\"a\":1}\n\n");
    }

    #[tokio::test]
    async fn fetch_text_rejects_error_status_and_oversized_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/big"))
            .respond_with(ResponseTemplate::new(200).set_body_string("data: 0123456789\n\n"))
            .mount(&server)
            .await;

        let err = fetch_text(&FetchConfig::default(), &format!("{}/missing", server.uri()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("404"), "{}", err);

        let cfg = FetchConfig {
            max_bytes: Some(4),
            ..Default::default()
        };
        let err = fetch_text(&cfg, &format!("{}/big", server.uri()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("max_bytes"), "{}", err);
    }
}
