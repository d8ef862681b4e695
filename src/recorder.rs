//! The single upstream call of a recording request.

use crate::canonical::{canonicalize_headers, HeaderSide};
use crate::entry::{HeaderValue, RecordedResponse};
use crate::error::TapeError;
use http_client::{HttpClient, Request, Response};
use std::collections::BTreeMap;

/// Forwards one request to the real network via an unstubbed inner client.
///
/// No retries: a transport failure (including a cancellation mid-flight)
/// surfaces as `TapeError::Recorder`, and nothing reaches the cassette.
#[derive(Debug)]
pub struct Recorder {
    inner: Box<dyn HttpClient>,
}

impl Recorder {
    pub fn new(inner: Box<dyn HttpClient>) -> Self {
        Self { inner }
    }

    /// Forward the request and split the outcome: a pristine response for
    /// the caller (verbatim headers, raw body bytes) and the copy destined
    /// for the cassette (volatile response headers dropped, body base64).
    pub async fn record(&self, req: Request) -> Result<(Response, RecordedResponse), TapeError> {
        let mut upstream = self
            .inner
            .send(req)
            .await
            .map_err(|e| TapeError::Recorder(e.to_string()))?;

        let status = upstream.status();

        let mut headers: Vec<(String, Vec<String>)> = Vec::new();
        for (name, values) in upstream.iter() {
            headers.push((
                name.as_str().to_string(),
                values.iter().map(|v| v.as_str().to_string()).collect(),
            ));
        }

        let body = upstream
            .body_bytes()
            .await
            .map_err(|e| TapeError::Recorder(format!("failed to read upstream body: {e}")))?;

        // The caller sees the upstream exchange untouched.
        let mut pristine = Response::new(status);
        for (name, values) in &headers {
            for value in values {
                let _ = pristine.append_header(name.as_str(), value.as_str());
            }
        }
        pristine.set_body(body.clone());

        let recorded_headers: BTreeMap<String, HeaderValue> =
            canonicalize_headers(headers, HeaderSide::Response)
                .into_iter()
                .map(|(name, values)| (name, HeaderValue::from_values(values)))
                .collect();

        let recorded = RecordedResponse::from_bytes(status.into(), recorded_headers, &body);

        Ok((pristine, recorded))
    }

    pub fn set_config(&mut self, config: http_client::Config) -> Result<(), http_client::Error> {
        self.inner.set_config(config)
    }

    pub fn config(&self) -> &http_client::Config {
        self.inner.config()
    }
}
