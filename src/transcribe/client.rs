//! HTTP transcription client.
//!
//! One `POST {base_url}/transcribe` multipart upload per finalized
//! recording; the response body is `{ "text": "…" }` on success or
//! `{ "error": "…" }` with a non-2xx status on failure. No retries here —
//! the user retries by holding the hotkey again.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use crate::audio::AudioPayload;
use crate::config::ServiceConfig;
use crate::transcribe::{Transcriber, TranscribeError, Transcript};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, serde::Deserialize)]
struct WireTranscription {
    #[serde(default)]
    text: String,
    #[serde(default)]
    error: Option<String>,
}

// ---------------------------------------------------------------------------
// HttpTranscriber
// ---------------------------------------------------------------------------

/// Production [`Transcriber`] backed by the hosted endpoint.
///
/// All connection details (`base_url`, `api_key`, timeout) come from
/// [`ServiceConfig`]; nothing is hardcoded.
pub struct HttpTranscriber {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpTranscriber {
    /// Build a transcriber from service config.
    ///
    /// The HTTP client carries the per-request timeout from
    /// `config.timeout_secs`. A default (no-timeout) client is used as a
    /// last-resort fallback if the builder fails (should never happen in
    /// practice).
    pub fn from_config(config: &ServiceConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, payload: &AudioPayload) -> Result<Transcript, TranscribeError> {
        let url = format!("{}/transcribe", self.base_url);

        let part = Part::bytes(payload.bytes.clone())
            .file_name("recording.wav")
            .mime_str(payload.mime)
            .map_err(|e| TranscribeError::new(e.to_string()))?;
        let form = Form::new().part("audio", part);

        let mut req = self.client.post(&url).multipart(form);

        // Attach Authorization header only when an API key is configured.
        let key = self.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req
            .send()
            .await
            .map_err(|e| TranscribeError::new(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(300).collect();
            return Err(TranscribeError::new(format!("HTTP {status}: {snippet}")));
        }

        let wire: WireTranscription = response
            .json()
            .await
            .map_err(|e| TranscribeError::new(e.to_string()))?;

        if let Some(error) = wire.error {
            return Err(TranscribeError::new(error));
        }

        Ok(Transcript::new(wire.text))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
