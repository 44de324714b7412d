//! JSON-or-text HTTP client (spec.md §6) with bounded retry and
//! exponential backoff + jitter. Generalizes the teacher's
//! `HashdiveScraper::execute_with_retry` (see
//! `scrapers/hashdive_api.rs`) from a single fixed endpoint into a
//! reusable client any provider can share.

use std::time::Duration;

use rand::Rng;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

const MAX_ATTEMPTS: u32 = 4;
const BASE_DELAY_MS: u64 = 250;
const MAX_DELAY_MS: u64 = 8_000;
const MAX_RETRY_AFTER_MS: u64 = 30_000;
const BODY_SNIPPET_LEN: usize = 512;

#[derive(Debug, Clone)]
pub struct HttpError {
    pub status: u16,
    pub status_text: String,
    pub url: String,
    pub body_snippet: String,
    pub headers: Vec<(String, String)>,
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "http {} ({}) for {}: {}", self.status, self.status_text, self.url, self.body_snippet)
    }
}

impl std::error::Error for HttpError {}

#[derive(Debug)]
pub enum Body {
    Json(Value),
    Text(String),
    Empty,
}

pub struct HttpClient {
    client: Client,
    timeout: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct RequestSpec<'a> {
    pub query: &'a [(&'a str, &'a str)],
    pub headers: &'a [(&'a str, &'a str)],
    pub json_body: Option<&'a Value>,
}

impl HttpClient {
    pub fn new(user_agent: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent.to_string())
            .build()?;
        Ok(Self { client, timeout })
    }

    pub async fn get(&self, url: &str, spec: &RequestSpec<'_>) -> Result<Body, HttpError> {
        self.execute(Method::GET, url, spec).await
    }

    pub async fn put(&self, url: &str, spec: &RequestSpec<'_>) -> Result<Body, HttpError> {
        self.execute(Method::PUT, url, spec).await
    }

    async fn execute(&self, method: Method, url: &str, spec: &RequestSpec<'_>) -> Result<Body, HttpError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let mut request = self.client.request(method.clone(), url);
            if !spec.query.is_empty() {
                request = request.query(spec.query);
            }
            for (k, v) in spec.headers {
                request = request.header(*k, *v);
            }
            if let Some(body) = spec.json_body {
                request = request.json(body);
            }

            let outcome = timeout(self.timeout, request.send()).await;

            match outcome {
                Ok(Ok(response)) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(parse_body(response).await);
                    }

                    if status == StatusCode::NO_CONTENT {
                        return Ok(Body::Empty);
                    }

                    if is_retryable_status(status) && attempt < MAX_ATTEMPTS {
                        let retry_after = retry_after_delay_ms(&response);
                        warn!(%url, %status, attempt, "retryable http status, backing off");
                        sleep(Duration::from_millis(retry_after.unwrap_or_else(|| backoff_ms(attempt)))).await;
                        continue;
                    }

                    let headers = snapshot_headers(&response);
                    let status_text = status.canonical_reason().unwrap_or("unknown").to_string();
                    let body_snippet = response
                        .text()
                        .await
                        .map(|t| truncate(&t, BODY_SNIPPET_LEN))
                        .unwrap_or_default();
                    return Err(HttpError {
                        status: status.as_u16(),
                        status_text,
                        url: url.to_string(),
                        body_snippet,
                        headers,
                    });
                }
                Ok(Err(e)) => {
                    if attempt < MAX_ATTEMPTS {
                        warn!(%url, attempt, error = %e, "transport error, retrying");
                        sleep(Duration::from_millis(backoff_ms(attempt))).await;
                        continue;
                    }
                    return Err(HttpError {
                        status: 0,
                        status_text: "transport error".into(),
                        url: url.to_string(),
                        body_snippet: truncate(&e.to_string(), BODY_SNIPPET_LEN),
                        headers: Vec::new(),
                    });
                }
                Err(_) => {
                    if attempt < MAX_ATTEMPTS {
                        debug!(%url, attempt, "request timed out, retrying");
                        sleep(Duration::from_millis(backoff_ms(attempt))).await;
                        continue;
                    }
                    return Err(HttpError {
                        status: 0,
                        status_text: "timeout".into(),
                        url: url.to_string(),
                        body_snippet: String::new(),
                        headers: Vec::new(),
                    });
                }
            }
        }
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn backoff_ms(attempt: u32) -> u64 {
    let exp = BASE_DELAY_MS.saturating_mul(1u64 << (attempt.saturating_sub(1)));
    let capped = exp.min(MAX_DELAY_MS);
    let jitter = rand::thread_rng().gen_range(0.5..=1.0);
    (capped as f64 * jitter) as u64
}

fn retry_after_delay_ms(response: &reqwest::Response) -> Option<u64> {
    let header = response.headers().get(reqwest::header::RETRY_AFTER)?.to_str().ok()?;
    let ms = if let Ok(secs) = header.parse::<u64>() {
        secs.saturating_mul(1000)
    } else {
        let target = chrono::DateTime::parse_from_rfc2822(header).ok()?;
        let now = chrono::Utc::now();
        let delta = target.with_timezone(&chrono::Utc) - now;
        delta.num_milliseconds().max(0) as u64
    };
    Some(ms.min(MAX_RETRY_AFTER_MS))
}

fn snapshot_headers(response: &reqwest::Response) -> Vec<(String, String)> {
    response
        .headers()
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
        .collect()
}

async fn parse_body(response: reqwest::Response) -> Body {
    let is_json = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.contains("json"))
        .unwrap_or(false);

    if is_json {
        match response.json::<Value>().await {
            Ok(v) => Body::Json(v),
            Err(_) => Body::Empty,
        }
    } else {
        match response.text().await {
            Ok(t) => Body::Text(t),
            Err(_) => Body::Empty,
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_and_caps() {
        let b1 = backoff_ms(1);
        let b4 = backoff_ms(4);
        assert!(b1 <= BASE_DELAY_MS);
        assert!(b4 <= MAX_DELAY_MS);
    }

    #[test]
    fn truncate_respects_char_boundary() {
        let s = "a".repeat(10);
        assert_eq!(truncate(&s, 5).len(), 5);
        assert_eq!(truncate(&s, 50).len(), 10);
    }

    #[test]
    fn is_retryable_status_matches_spec_set() {
        assert!(is_retryable_status(StatusCode::REQUEST_TIMEOUT));
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
        assert!(!is_retryable_status(StatusCode::UNAUTHORIZED));
    }
}
