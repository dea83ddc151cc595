//! HTTP translation client — single-shot JSON and SSE streaming.
//!
//! `POST {base_url}/translate` with
//! `{ text, context?, sourceLanguage, targetLanguage }`. The service picks
//! the response protocol per request:
//!
//! * `application/json` — one body, parsed directly into a final result;
//! * `text/event-stream` — `data:` lines carrying chat-completion deltas,
//!   terminated by `data: [DONE]`. Deltas concatenate into the same JSON
//!   document, scraped for partial text along the way and strictly parsed
//!   at the end.
//!
//! HTTP 429 and 402 are meaningful (rate limit, quota) and map to their own
//! error kinds; everything else non-2xx is a generic failure. One call is
//! one attempt.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use crate::config::ServiceConfig;
use crate::translate::partial::PartialEmitter;
use crate::translate::{PartialSink, TranslateError, TranslateRequest, Translation, Translator};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<&'a str>,
    #[serde(rename = "sourceLanguage")]
    source_language: &'a str,
    #[serde(rename = "targetLanguage")]
    target_language: &'a str,
}

#[derive(Debug, Deserialize)]
struct WireTranslation {
    #[serde(default)]
    translation: String,
    #[serde(rename = "originalPhrase", default)]
    original_phrase: Option<String>,
    #[serde(default)]
    examples: Vec<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl WireTranslation {
    fn into_final(self) -> Translation {
        Translation {
            translation: self.translation,
            original_phrase: self.original_phrase.filter(|p| !p.is_empty()),
            examples: self.examples,
            notes: self.notes,
            is_final: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Status / stream helpers
// ---------------------------------------------------------------------------

/// Map an HTTP status to its error kind, `None` for success.
fn classify_status(status: u16) -> Option<TranslateError> {
    match status {
        429 => Some(TranslateError::RateLimited),
        402 => Some(TranslateError::QuotaExceeded),
        s if (200..300).contains(&s) => None,
        s => Some(TranslateError::Failed(format!("HTTP {s}"))),
    }
}

/// Process one SSE line, appending any content delta to `content`.
///
/// Returns `true` when a delta was appended. Non-`data:` lines, the
/// `[DONE]` sentinel and malformed delta JSON are all skipped silently.
fn append_sse_line(content: &mut String, line: &str) -> bool {
    let trimmed = line.trim();
    let Some(data) = trimmed.strip_prefix("data:") else {
        return false;
    };
    let data = data.trim_start();
    if data == "[DONE]" {
        return false;
    }
    let Ok(value) = serde_json::from_str::<serde_json::Value>(data) else {
        return false;
    };
    let Some(delta) = value["choices"][0]["delta"]["content"].as_str() else {
        return false;
    };
    content.push_str(delta);
    true
}

/// Strictly parse the fully-accumulated stream content into the final
/// result, falling back to the scraper's partial state when the parse
/// fails — a malformed finish must not discard a mostly-good answer.
fn finalize_stream(content: &str, emitter: &PartialEmitter) -> Result<Translation, TranslateError> {
    match serde_json::from_str::<WireTranslation>(content) {
        Ok(wire) => {
            if let Some(error) = wire.error {
                return Err(TranslateError::Failed(error));
            }
            Ok(wire.into_final())
        }
        Err(parse_err) => {
            if emitter.has_content() {
                log::warn!("streamed translation did not parse ({parse_err}); using partial text");
                Ok(emitter.snapshot(true))
            } else {
                Err(TranslateError::StreamParse(parse_err.to_string()))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// HttpTranslator
// ---------------------------------------------------------------------------

/// Production [`Translator`] backed by the hosted endpoint.
pub struct HttpTranslator {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    partial_interval: Duration,
}

impl HttpTranslator {
    /// Build a translator from service config.
    ///
    /// `partial_interval` is the minimum spacing between partial-result
    /// callbacks while streaming.
    pub fn from_config(config: &ServiceConfig, partial_interval: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            partial_interval,
        }
    }

    /// Consume an SSE response, emitting throttled partials, and produce
    /// the final result.
    async fn consume_stream(
        &self,
        response: reqwest::Response,
        on_partial: Option<PartialSink<'_>>,
    ) -> Result<Translation, TranslateError> {
        let mut stream = response.bytes_stream();
        let mut line_buf: Vec<u8> = Vec::new();
        let mut content = String::new();
        let mut emitter = PartialEmitter::new(self.partial_interval);

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| TranslateError::Failed(e.to_string()))?;
            line_buf.extend_from_slice(&chunk);

            // Only complete lines are processed; a partial line (and any
            // multi-byte character split across chunks) waits in the buffer.
            while let Some(pos) = line_buf.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = line_buf.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line);
                if append_sse_line(&mut content, &line) {
                    if let (Some(cb), Some(partial)) = (on_partial, emitter.poll(&content)) {
                        cb(partial);
                    }
                }
            }
        }

        finalize_stream(&content, &emitter)
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(
        &self,
        request: &TranslateRequest,
        on_partial: Option<PartialSink<'_>>,
    ) -> Result<Translation, TranslateError> {
        if request.text.trim().is_empty() {
            return Err(TranslateError::EmptyText);
        }

        let url = format!("{}/translate", self.base_url);
        let body = WireRequest {
            text: &request.text,
            context: request.context.as_deref(),
            source_language: &request.source_language,
            target_language: &request.target_language,
        };

        let mut req = self.client.post(&url).json(&body);

        let key = self.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req
            .send()
            .await
            .map_err(|e| TranslateError::Failed(e.to_string()))?;

        if let Some(err) = classify_status(response.status().as_u16()) {
            return Err(err);
        }

        let is_stream = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("text/event-stream"));

        if is_stream {
            return self.consume_stream(response, on_partial).await;
        }

        let wire: WireTranslation = response
            .json()
            .await
            .map_err(|e| TranslateError::Failed(e.to_string()))?;

        if let Some(error) = wire.error {
            return Err(TranslateError::Failed(error));
        }

        Ok(wire.into_final())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
