//! Remote transport for loading, saving and request submission.

use qc_schema::{Payload, RequestPayload};
use serde::Deserialize;
use serde::Serialize;
use std::thread;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, RetryPolicy};
use crate::error::{AppError, AppResult, TransportError};

/// Header carrying the anti-forgery token on writes.
pub const CSRF_HEADER: &str = "X-CSRF-Token";

/// The three remote interactions the application needs.
pub trait Transport {
    fn fetch_payload(&self, endpoint: &str) -> Result<Payload, TransportError>;

    fn save_payload(&self, endpoint: &str, payload: &Payload) -> Result<(), TransportError>;

    fn submit_request(
        &self,
        endpoint: &str,
        request: &RequestPayload,
    ) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn fetch_payload(&self, endpoint: &str) -> Result<Payload, TransportError> {
        (**self).fetch_payload(endpoint)
    }

    fn save_payload(&self, endpoint: &str, payload: &Payload) -> Result<(), TransportError> {
        (**self).save_payload(endpoint, payload)
    }

    fn submit_request(
        &self,
        endpoint: &str,
        request: &RequestPayload,
    ) -> Result<(), TransportError> {
        (**self).submit_request(endpoint, request)
    }
}

/// Optional acknowledgement body returned by write endpoints.
#[derive(Debug, Default, Deserialize)]
struct Ack {
    success: Option<bool>,
    message: Option<String>,
}

/// Blocking HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    csrf_token: Option<String>,
    auth_token: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Config(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            csrf_token: config.csrf_token.clone(),
            auth_token: config.auth_token.clone(),
        })
    }

    fn authorize(
        &self,
        builder: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn post_json<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) -> Result<(), TransportError> {
        let mut builder = self.authorize(self.client.post(endpoint)).json(body);
        if let Some(token) = &self.csrf_token {
            builder = builder.header(CSRF_HEADER, token);
        }
        let response = builder.send().map_err(classify)?;
        let text = checked(response)?.text().map_err(classify)?;
        acknowledge(&text)
    }
}

impl Transport for HttpTransport {
    fn fetch_payload(&self, endpoint: &str) -> Result<Payload, TransportError> {
        debug!(endpoint, "fetching payload");
        let response = self
            .authorize(self.client.get(endpoint))
            .send()
            .map_err(classify)?;
        let text = checked(response)?.text().map_err(classify)?;
        serde_json::from_str(&text).map_err(|e| TransportError::Decode(e.to_string()))
    }

    fn save_payload(&self, endpoint: &str, payload: &Payload) -> Result<(), TransportError> {
        debug!(endpoint, rows = payload.rows.len(), "saving payload");
        self.post_json(endpoint, payload)
    }

    fn submit_request(
        &self,
        endpoint: &str,
        request: &RequestPayload,
    ) -> Result<(), TransportError> {
        debug!(endpoint, request_id = %request.request_id, "submitting request");
        self.post_json(endpoint, request)
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_decode() {
        TransportError::Decode(err.to_string())
    } else if let Some(status) = err.status()
        && let Some(classified) = TransportError::from_status(status.as_u16())
    {
        classified
    } else {
        TransportError::Network(err.to_string())
    }
}

fn checked(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, TransportError> {
    match TransportError::from_status(response.status().as_u16()) {
        Some(err) => Err(err),
        None => Ok(response),
    }
}

/// Interpret a write endpoint's body. An empty or non-JSON body on a
/// success status counts as success.
fn acknowledge(body: &str) -> Result<(), TransportError> {
    let ack: Ack = serde_json::from_str(body).unwrap_or_default();
    match ack.success {
        Some(false) => Err(TransportError::Rejected {
            message: ack.message.unwrap_or_else(|| "no message".to_string()),
        }),
        _ => Ok(()),
    }
}

/// Run `op`, retrying transient failures with exponential backoff.
pub fn retry_with_backoff<T>(
    policy: &RetryPolicy,
    what: &str,
    mut op: impl FnMut() -> Result<T, TransportError>,
) -> Result<T, TransportError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => {
                if attempt > 1 {
                    info!(what, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_transient() && attempt < max_attempts => {
                let delay = policy.delay(attempt);
                warn!(what, attempt, %err, delay_ms = delay.as_millis() as u64, "transient failure, retrying");
                thread::sleep(delay);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
