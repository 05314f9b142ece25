//! Google Gemini `generateContent` over plain REST.
//!
//! ## Why a second backend?
//!
//! Gemini answers with a list of candidates, each holding text parts. When
//! the model follows instructions every part is a (possibly fenced) JSON
//! object, so the gateway decodes them strictly here and merges their
//! `relevant` / `irrelevant` arrays into one pre-parsed object. Replies the
//! strict decode cannot handle fall back to the lenient parser downstream
//! through the raw `text`.

use super::{Gateway, GatewayReply};
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::pipeline::parse::strip_fences;
use crate::report::TokenUsage;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash-latest";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiGateway {
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    client: reqwest::Client,
}

impl GeminiGateway {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AnalysisError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            temperature: 0.2,
            client,
        })
    }

    /// Build from `GEMINI_API_KEY` and the analysis config.
    pub fn from_env(config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AnalysisError::GatewayNotConfigured {
                provider: "gemini-rest".to_string(),
                hint: "Set GEMINI_API_KEY to use the Gemini REST gateway.".to_string(),
            })?;
        let model = config.model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL);
        Ok(Self::new(api_key, model, config.request_timeout)?.with_temperature(config.temperature))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, t: f32) -> Self {
        self.temperature = t;
        self
    }

    /// The key travels in the `x-goog-api-key` header, never in the URL,
    /// so transport errors (which quote the URL) cannot leak it.
    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

/// Error text safe to store in a report or log.
fn redact(e: reqwest::Error) -> String {
    e.without_url().to_string()
}

#[async_trait]
impl Gateway for GeminiGateway {
    async fn send(&self, prompt: &str) -> GatewayReply {
        let start = Instant::now();
        let body = request_body(prompt, self.temperature);

        let request = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body);

        let resp = match request.send().await {
            Ok(resp) => resp,
            Err(e) => {
                let detail = redact(e);
                warn!("gemini: transport error: {}", detail);
                return GatewayReply::failure(0, detail, start.elapsed());
            }
        };

        let status = resp.status();
        let text = match resp.text().await {
            Ok(t) => t,
            Err(e) => {
                return GatewayReply::failure(status.as_u16(), redact(e), start.elapsed())
            }
        };

        if !status.is_success() {
            warn!("gemini: HTTP {}", status);
            return GatewayReply::failure(status.as_u16(), text, start.elapsed());
        }

        let elapsed = start.elapsed();
        let payload: Value = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(e) => {
                return GatewayReply::failure(
                    status.as_u16(),
                    format!("undecodable response body: {e}"),
                    elapsed,
                )
            }
        };

        let decoded = decode_payload(&payload);
        debug!(
            "gemini: {} input tokens, {} output tokens, {:?}",
            decoded.usage.input, decoded.usage.output, elapsed
        );

        let reply = GatewayReply::success(decoded.text, decoded.usage, elapsed)
            .with_status(status.as_u16());
        match decoded.parsed {
            Some(parsed) => reply.with_parsed(parsed),
            None => reply,
        }
    }

    fn name(&self) -> &str {
        "gemini-rest"
    }
}

fn request_body(prompt: &str, temperature: f32) -> Value {
    json!({
        "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        "generationConfig": { "temperature": temperature }
    })
}

/// What a successful `generateContent` payload yields.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DecodedPayload {
    pub parsed: Option<Value>,
    pub text: String,
    pub usage: TokenUsage,
}

/// Gather the first candidate's text parts, strictly decode each, merge
/// the categories. Further candidates are alternatives, not continuations.
///
/// `parsed` is `Some` only when at least one part decoded to an object;
/// `text` joins every raw part so the lenient parser can try again.
pub(crate) fn decode_payload(payload: &Value) -> DecodedPayload {
    let mut relevant: Vec<Value> = Vec::new();
    let mut irrelevant: Vec<Value> = Vec::new();
    let mut decoded_any = false;
    let mut raw_parts: Vec<&str> = Vec::new();

    let parts = payload
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    for part in parts {
        let Some(text) = part.get("text").and_then(Value::as_str) else {
            continue;
        };
        raw_parts.push(text);

        match serde_json::from_str::<Value>(strip_fences(text)) {
            Ok(Value::Object(obj)) => {
                decoded_any = true;
                if let Some(Value::Array(items)) = obj.get("relevant") {
                    relevant.extend(items.iter().cloned());
                }
                if let Some(Value::Array(items)) = obj.get("irrelevant") {
                    irrelevant.extend(items.iter().cloned());
                }
            }
            _ => debug!("gemini: part is not strict JSON, leaving it to the parser"),
        }
    }

    let usage = TokenUsage::new(
        payload
            .pointer("/usageMetadata/promptTokenCount")
            .and_then(Value::as_u64)
            .unwrap_or(0),
        payload
            .pointer("/usageMetadata/candidatesTokenCount")
            .and_then(Value::as_u64)
            .unwrap_or(0),
    );

    DecodedPayload {
        parsed: decoded_any.then(|| json!({ "relevant": relevant, "irrelevant": irrelevant })),
        text: raw_parts.join("\n"),
        usage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(parts: &[&str]) -> Value {
        let parts: Vec<Value> = parts.iter().map(|t| json!({ "text": t })).collect();
        json!({
            "candidates": [{ "content": { "role": "model", "parts": parts } }],
            "usageMetadata": { "promptTokenCount": 812, "candidatesTokenCount": 64 }
        })
    }

    #[test]
    fn request_body_shape() {
        let body = request_body("hello", 0.2);
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert!((body["generationConfig"]["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn fenced_part_is_decoded() {
        let p = payload(&["```json\n{\"relevant\":[{\"name\":\"Metformin\",\"explanation\":\"first line\"}],\"irrelevant\":[]}\n```"]);
        let d = decode_payload(&p);
        let parsed = d.parsed.unwrap();
        assert_eq!(parsed["relevant"][0]["name"], "Metformin");
        assert_eq!(d.usage, TokenUsage::new(812, 64));
    }

    #[test]
    fn parts_are_merged() {
        let p = payload(&[
            r#"{"relevant":[{"name":"A","explanation":""}]}"#,
            r#"{"irrelevant":[{"name":"B","explanation":""}],"relevant":[{"name":"C","explanation":""}]}"#,
        ]);
        let parsed = decode_payload(&p).parsed.unwrap();
        assert_eq!(parsed["relevant"].as_array().unwrap().len(), 2);
        assert_eq!(parsed["irrelevant"][0]["name"], "B");
    }

    #[test]
    fn prose_part_leaves_parsed_empty() {
        let p = payload(&["Relevant:\n- Metformin"]);
        let d = decode_payload(&p);
        assert!(d.parsed.is_none());
        assert_eq!(d.text, "Relevant:\n- Metformin");
    }

    #[test]
    fn trailing_comma_is_not_strict_json() {
        let p = payload(&[r#"{"relevant":[{"name":"A","explanation":""},]}"#]);
        let d = decode_payload(&p);
        assert!(d.parsed.is_none());
        assert!(!d.text.is_empty());
    }

    #[test]
    fn missing_usage_counts_zero() {
        let p = json!({ "candidates": [] });
        let d = decode_payload(&p);
        assert_eq!(d.usage, TokenUsage::default());
        assert!(d.parsed.is_none());
        assert!(d.text.is_empty());
    }

    #[test]
    fn endpoint_uses_model_and_base() {
        let g = GeminiGateway::new("k", "gemini-x", Duration::from_secs(5))
            .unwrap()
            .with_base_url("http://localhost:9999/v1beta/");
        assert_eq!(
            g.endpoint(),
            "http://localhost:9999/v1beta/models/gemini-x:generateContent"
        );
    }

    #[test]
    fn only_first_candidate_is_read() {
        let p = json!({
            "candidates": [
                { "content": { "parts": [{ "text": r#"{"relevant":[{"name":"A","explanation":""}]}"# }] } },
                { "content": { "parts": [{ "text": r#"{"relevant":[{"name":"B","explanation":""}]}"# }] } }
            ]
        });
        let d = decode_payload(&p);
        let parsed = d.parsed.unwrap();
        assert_eq!(parsed["relevant"].as_array().unwrap().len(), 1);
        assert_eq!(parsed["relevant"][0]["name"], "A");
        assert!(!d.text.contains("\"B\""));
    }

    // ── send() against a one-shot local HTTP server ─────────────────────────

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    const KEY: &str = "SECRET-KEY-123";

    /// Serve one request with a canned response; yields the raw request head.
    async fn serve_once(
        status_line: &'static str,
        body: String,
    ) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            let head_end = loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break buf.len();
                }
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };
            let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
            let content_length = head
                .lines()
                .find_map(|l| {
                    let (name, value) = l.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            while buf.len() < head_end + content_length {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }

            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            let _ = tx.send(head);
        });

        (format!("http://{addr}/v1beta"), rx)
    }

    fn gateway(base: &str) -> GeminiGateway {
        GeminiGateway::new(KEY, "gemini-x", Duration::from_secs(5))
            .unwrap()
            .with_base_url(base)
    }

    #[tokio::test]
    async fn send_success_carries_status_usage_and_parsed() {
        let body = payload(&[r#"{"relevant":[{"name":"Metformin","explanation":"first line"}],"irrelevant":[]}"#]);
        let (base, head) = serve_once("200 OK", body.to_string()).await;

        let reply = gateway(&base).send("classify this").await;
        assert!(reply.ok);
        assert_eq!(reply.status, 200);
        assert_eq!(reply.usage, TokenUsage::new(812, 64));
        assert_eq!(reply.parsed.unwrap()["relevant"][0]["name"], "Metformin");

        let head = head.await.unwrap();
        let request_line = head.lines().next().unwrap();
        assert_eq!(request_line, "POST /v1beta/models/gemini-x:generateContent HTTP/1.1");
        assert!(!request_line.contains(KEY));
        assert!(head
            .lines()
            .any(|l| l.eq_ignore_ascii_case(&format!("x-goog-api-key: {KEY}"))));
    }

    #[tokio::test]
    async fn send_non_success_status_is_failure_with_body() {
        let (base, _head) = serve_once(
            "429 Too Many Requests",
            r#"{"error":{"code":429,"message":"quota"}}"#.to_string(),
        )
        .await;

        let reply = gateway(&base).send("x").await;
        assert!(!reply.ok);
        assert_eq!(reply.status, 429);
        assert!(reply.text.contains("quota"));
        assert!(reply.parsed.is_none());
    }

    #[tokio::test]
    async fn send_undecodable_body_is_failure() {
        let (base, _head) = serve_once("200 OK", "<html>not json</html>".to_string()).await;

        let reply = gateway(&base).send("x").await;
        assert!(!reply.ok);
        assert_eq!(reply.status, 200);
        assert!(reply.text.contains("undecodable"));
    }

    #[tokio::test]
    async fn transport_error_never_leaks_key() {
        let reply = gateway("http://127.0.0.1:1/v1beta").send("hi").await;
        assert!(!reply.ok);
        assert_eq!(reply.status, 0);
        assert!(!reply.text.is_empty());
        assert!(!reply.text.contains(KEY));
    }
}
