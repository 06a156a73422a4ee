use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::error::HarvestError;

const MAX_RETRIES: usize = 3;
const BASE_DELAY_MS: u64 = 200;

pub fn user_agent() -> String {
    format!("dock-harvest/{}", env!("CARGO_PKG_VERSION"))
}

pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&user_agent()) {
        headers.insert(USER_AGENT, value);
    }
    Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
}

/// Sends the request, retrying transient statuses and transport errors with linear back-off.
/// The final response is returned whatever its status.
pub fn send_with_retries<F>(mut make_req: F) -> Result<Response, reqwest::Error>
where
    F: FnMut() -> RequestBuilder,
{
    let mut attempt = 0usize;
    loop {
        match make_req().send() {
            Ok(resp) => {
                let status = resp.status().as_u16();
                if attempt < MAX_RETRIES && is_retryable_status(status) {
                    backoff(attempt);
                    attempt += 1;
                    continue;
                }
                return Ok(resp);
            }
            Err(err) => {
                if attempt < MAX_RETRIES && is_retryable_error(&err) {
                    backoff(attempt);
                    attempt += 1;
                    continue;
                }
                return Err(err);
            }
        }
    }
}

/// Passes a success response through; otherwise builds the caller's status error from the body.
pub fn require_success<F>(response: Response, to_error: F) -> Result<Response, HarvestError>
where
    F: FnOnce(u16, String) -> HarvestError,
{
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = response
        .text()
        .unwrap_or_else(|_| "request failed".to_string());
    Err(to_error(status, message))
}

fn backoff(attempt: usize) {
    let delay = BASE_DELAY_MS * (attempt as u64 + 1);
    thread::sleep(Duration::from_millis(delay));
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
