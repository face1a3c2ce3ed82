//! HTTP backend for the synthesis service.
//!
//! Sends `{text, voice, rate, style}` as JSON and expects raw audio bytes
//! back. Endpoint and credentials come from configuration; the wire shape of
//! the audio (sample rate, encoding) is owned by the service.

use std::time::Duration;

use async_trait::async_trait;
use crier_types::VoiceParams;
use reqwest::StatusCode;
use serde_json::json;

use crate::error::SynthesisError;
use crate::Synthesizer;

/// Maximum text input size accepted before a request is even attempted.
/// Prevents resource exhaustion from oversized synthesis requests.
const MAX_SYNTH_INPUT_BYTES: usize = 64 * 1024;

/// A [`Synthesizer`] backed by an HTTP synthesis service.
#[derive(Debug, Clone)]
pub struct HttpSynthesizer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpSynthesizer {
    /// Creates a client for the given endpoint with a per-call timeout.
    ///
    /// # Errors
    ///
    /// Returns `SynthesisError::Config` if the underlying HTTP client cannot
    /// be constructed.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        call_timeout: Duration,
    ) -> Result<Self, SynthesisError> {
        let client = reqwest::Client::builder()
            .timeout(call_timeout)
            .build()
            .map_err(|e| SynthesisError::Config(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }
}

#[async_trait]
impl Synthesizer for HttpSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        params: &VoiceParams,
    ) -> Result<Vec<u8>, SynthesisError> {
        if text.len() > MAX_SYNTH_INPUT_BYTES {
            return Err(SynthesisError::TextRejected(format!(
                "text exceeds maximum size: {} bytes (limit: {} bytes)",
                text.len(),
                MAX_SYNTH_INPUT_BYTES
            )));
        }

        let body = json!({
            "text": text,
            "voice": params.voice,
            "rate": params.rate,
            "style": params.style,
        });

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SynthesisError::Timeout
            } else {
                SynthesisError::Transient(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| SynthesisError::Transient(e.to_string()))?;
            return Ok(bytes.to_vec());
        }

        let detail = response.text().await.unwrap_or_default();
        match status {
            StatusCode::TOO_MANY_REQUESTS => Err(SynthesisError::RateLimited),
            StatusCode::UNPROCESSABLE_ENTITY => Err(SynthesisError::InvalidVoiceParams(detail)),
            StatusCode::BAD_REQUEST | StatusCode::PAYLOAD_TOO_LARGE => {
                Err(SynthesisError::TextRejected(detail))
            }
            s if s.is_server_error() => {
                Err(SynthesisError::Transient(format!("server error {s}: {detail}")))
            }
            s => Err(SynthesisError::Config(format!(
                "synthesis service rejected request with {s}: {detail}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn oversized_text_is_rejected_without_network() {
        // Endpoint is never contacted for oversized input, so a bogus
        // address is fine here.
        let synth = HttpSynthesizer::new(
            "http://127.0.0.1:1/synthesize",
            None,
            Duration::from_millis(100),
        )
        .expect("client should build");

        let text = "a".repeat(MAX_SYNTH_INPUT_BYTES + 1);
        let err = synth
            .synthesize(&text, &VoiceParams::default())
            .await
            .expect_err("oversized text should be rejected");
        match err {
            SynthesisError::TextRejected(_) => {}
            other => panic!("expected TextRejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transient() {
        let synth = HttpSynthesizer::new(
            "http://127.0.0.1:1/synthesize",
            None,
            Duration::from_millis(200),
        )
        .expect("client should build");

        let err = synth
            .synthesize("hello", &VoiceParams::default())
            .await
            .expect_err("unreachable endpoint should fail");
        assert!(err.is_transient(), "connection failure should be retryable");
    }
}
