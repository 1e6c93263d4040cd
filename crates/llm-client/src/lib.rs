//! Structured-extraction client for the LLM completion service.
//!
//! One call per source document: the target type's JSON schema is
//! embedded in the system prompt, the completion is parsed back into the
//! type, and anything malformed surfaces as a typed error instead of a
//! panic. Token usage is returned so callers can charge a cost ledger.

use std::time::Duration;

use reqwest::Client;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::time::sleep;
use tracing::instrument;
use uuid::Uuid;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {0}")]
    ApiError(String),
    #[error("HTTP status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Timeout")]
    Timeout,
    #[error("Schema validation failed: {0}")]
    SchemaValidationFailed(String),
}

/// A parsed extraction plus the token usage it cost.
#[derive(Debug, Clone)]
pub struct Extraction<T> {
    pub request_id: Uuid,
    pub value: T,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

pub struct LlmClient {
    client: Client,
    api_key: String,
    model: String,
    max_retries: u32,
    base_url: String,
}

impl LlmClient {
    pub fn new(
        api_key: String,
        model: String,
        timeout_ms: u64,
        max_retries: u32,
    ) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| LlmError::ApiError(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            model,
            max_retries,
            base_url: ANTHROPIC_API_URL.to_string(),
        })
    }

    /// Point the client at a different messages endpoint (proxies, local
    /// stand-ins).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Run one structured extraction. `task` names what to extract and
    /// `payload` carries the source material (page text, item context).
    #[instrument(skip(self, payload), fields(task = task))]
    pub async fn extract<T>(&self, task: &str, payload: &Value) -> Result<Extraction<T>, LlmError>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let request_id = Uuid::new_v4();
        let schema = schemars::schema_for!(T);
        let schema_json = serde_json::to_string_pretty(&schema)?;

        let system_prompt = format!(
            r#"You are a high-precision market research extraction assistant.
Your goal is to pull typed facts (pricing, market size, launch engagement) out of the supplied page text.
You must output strictly valid JSON conforming to the schema below.
Only report facts present in the source; leave optional fields null when the source is silent.
Do NOT output any markdown blocks or conversational text. JUST the JSON object.

JSON Schema:
{schema_json}
"#
        );

        let user_prompt = json!({
            "task": task,
            "request_id": request_id,
            "payload": payload,
        });

        let body = json!({
            "model": self.model,
            "max_tokens": 1024,
            "system": system_prompt,
            "messages": [
                {
                    "role": "user",
                    "content": serde_json::to_string(&user_prompt)?
                }
            ]
        });

        let mut attempt = 0u32;
        loop {
            let send_result = self
                .client
                .post(&self.base_url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .header("content-type", "application/json")
                .json(&body)
                .send()
                .await;

            match send_result {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        let body = response.text().await.unwrap_or_default();
                        if status.as_u16() == 429 && attempt < self.max_retries {
                            attempt += 1;
                            sleep(Duration::from_millis(150 * u64::from(attempt))).await;
                            continue;
                        }
                        return Err(LlmError::HttpStatus {
                            status: status.as_u16(),
                            body,
                        });
                    }

                    let response_body: Value = response
                        .json()
                        .await
                        .map_err(|e| LlmError::ApiError(e.to_string()))?;
                    let text_content = extract_text_content(&response_body)?;
                    let value: T = parse_json_window(text_content)?;
                    let (input_tokens, output_tokens) = token_usage(&response_body);

                    return Ok(Extraction {
                        request_id,
                        value,
                        input_tokens,
                        output_tokens,
                    });
                }
                Err(e) => {
                    if e.is_timeout() {
                        if attempt < self.max_retries {
                            attempt += 1;
                            sleep(Duration::from_millis(150 * u64::from(attempt))).await;
                            continue;
                        }
                        return Err(LlmError::Timeout);
                    }
                    if attempt < self.max_retries {
                        attempt += 1;
                        sleep(Duration::from_millis(150 * u64::from(attempt))).await;
                        continue;
                    }
                    return Err(LlmError::ApiError(e.to_string()));
                }
            }
        }
    }
}

fn extract_text_content(response_body: &Value) -> Result<&str, LlmError> {
    let content_arr = response_body
        .get("content")
        .and_then(|c| c.as_array())
        .ok_or_else(|| {
            LlmError::SchemaValidationFailed("Missing or invalid 'content' field".into())
        })?;

    content_arr
        .iter()
        .find(|item| item["type"] == "text")
        .and_then(|item| item["text"].as_str())
        .ok_or_else(|| LlmError::SchemaValidationFailed("Missing 'text' content".into()))
}

/// Parse the first `{...}` window in the completion. The prompt requests
/// JSON-only output, but models occasionally wrap it in prose anyway.
fn parse_json_window<T: DeserializeOwned>(text: &str) -> Result<T, LlmError> {
    let json_start = text.find('{').unwrap_or(0);
    let json_end = text.rfind('}').map(|i| i + 1).unwrap_or(text.len());
    let json_str = &text[json_start..json_end];
    serde_json::from_str(json_str).map_err(LlmError::JsonError)
}

fn token_usage(response_body: &Value) -> (u64, u64) {
    let usage = &response_body["usage"];
    (
        usage["input_tokens"].as_u64().unwrap_or(0),
        usage["output_tokens"].as_u64().unwrap_or(0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct PricedTool {
        name: String,
        price: f64,
    }

    #[test]
    fn parses_plain_json() {
        let tool: PricedTool = parse_json_window(r#"{"name":"acme","price":29.0}"#).unwrap();
        assert_eq!(tool.name, "acme");
    }

    #[test]
    fn recovers_json_from_wrapped_text() {
        let wrapped = "Sure, here it is:\n{\"name\":\"acme\",\"price\":29.0}\nDone.";
        let tool: PricedTool = parse_json_window(wrapped).unwrap();
        assert_eq!(tool.price, 29.0);
    }

    #[test]
    fn malformed_output_is_an_error_not_a_panic() {
        let err = parse_json_window::<PricedTool>("no json here at all").unwrap_err();
        assert!(matches!(err, LlmError::JsonError(_)));
    }

    #[test]
    fn text_content_extraction_handles_mixed_blocks() {
        let body = serde_json::json!({
            "content": [
                {"type": "tool_use", "id": "x"},
                {"type": "text", "text": "{\"ok\":true}"}
            ],
            "usage": {"input_tokens": 120, "output_tokens": 40}
        });
        assert_eq!(extract_text_content(&body).unwrap(), "{\"ok\":true}");
        assert_eq!(token_usage(&body), (120, 40));
    }

    #[test]
    fn missing_content_is_a_schema_failure() {
        let body = serde_json::json!({"usage": {}});
        assert!(matches!(
            extract_text_content(&body),
            Err(LlmError::SchemaValidationFailed(_))
        ));
    }
}
