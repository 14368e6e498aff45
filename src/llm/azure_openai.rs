use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::pipeline::error::ModelError;
use crate::pipeline::traits::{CritiqueRequest, LanguageModel};
use crate::utils::http::{get_http_client, summarize_error_body, truncate_for_log};
use crate::utils::timing::log_service_timing;

/// Chat completions against an Azure OpenAI deployment.
pub struct AzureOpenAiModel {
    endpoint: String,
    api_key: String,
    api_version: String,
    deployment: String,
}

impl AzureOpenAiModel {
    pub fn new(endpoint: &str, api_key: &str, api_version: &str, deployment: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            api_version: api_version.to_string(),
            deployment: deployment.to_string(),
        }
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }

    async fn call_chat_api(&self, payload: &Value) -> Result<Value, ModelError> {
        debug!("Azure OpenAI request: {}", summarize_payload(payload));

        let response = get_http_client()
            .post(self.completions_url())
            .header("api-key", &self.api_key)
            .timeout(Duration::from_secs(90))
            .json(payload)
            .send()
            .await
            .map_err(|err| ModelError(format!("request failed: {err}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let (message, body_summary) = summarize_error_body(&body);
            warn!(
                "Azure OpenAI API error: status={}, body={}",
                status, body_summary
            );
            let detail = message.unwrap_or(body_summary);
            return Err(ModelError(format!("status {status}: {detail}")));
        }

        response
            .json::<Value>()
            .await
            .map_err(|err| ModelError(format!("malformed response: {err}")))
    }
}

#[async_trait]
impl LanguageModel for AzureOpenAiModel {
    async fn generate_critique(&self, request: &CritiqueRequest) -> Result<String, ModelError> {
        let payload = build_payload(request);
        let metadata = json!({ "max_tokens": request.max_tokens, "top_p": request.top_p });
        let response = log_service_timing(
            "azure_openai",
            &self.deployment,
            "photo_critique",
            Some(metadata),
            || self.call_chat_api(&payload),
        )
        .await?;
        extract_completion_text(&response)
    }
}

fn summarize_payload(payload: &Value) -> String {
    let message_count = payload
        .get("messages")
        .and_then(|v| v.as_array())
        .map(|messages| messages.len())
        .unwrap_or(0);
    let image_ref = payload
        .pointer("/messages/1/content/0/image_url/url")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    format!(
        "messages={}, max_tokens={}, image={}",
        message_count,
        payload.get("max_tokens").unwrap_or(&Value::Null),
        truncate_for_log(image_ref, 80)
    )
}

/// System instruction first, then the photo as the only user content.
pub fn build_payload(request: &CritiqueRequest) -> Value {
    json!({
        "messages": [
            { "role": "system", "content": request.system_prompt },
            {
                "role": "user",
                "content": [
                    { "type": "image_url", "image_url": { "url": request.image_ref } }
                ]
            }
        ],
        "max_tokens": request.max_tokens,
        "top_p": request.top_p
    })
}

pub fn extract_completion_text(response: &Value) -> Result<String, ModelError> {
    let content = response
        .pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if content.trim().is_empty() {
        let reason = response
            .pointer("/choices/0/finish_reason")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        warn!(
            "Azure OpenAI response had empty content: {}",
            truncate_for_log(&response.to_string(), 2000)
        );
        return Err(ModelError(format!(
            "empty completion (finish_reason={reason})"
        )));
    }
    Ok(content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CritiqueRequest {
        CritiqueRequest {
            system_prompt: "critique this".to_string(),
            image_ref: "https://cdn.test/files/original_image_r1.jpg".to_string(),
            max_tokens: 800,
            top_p: 0.95,
        }
    }

    #[test]
    fn url_targets_the_deployment() {
        let model = AzureOpenAiModel::new("https://aoai.test/", "k", "2024-02-15-preview", "gpt-4o");
        assert_eq!(
            model.completions_url(),
            "https://aoai.test/openai/deployments/gpt-4o/chat/completions?api-version=2024-02-15-preview"
        );
    }

    #[test]
    fn payload_carries_prompt_image_and_sampling() {
        let payload = build_payload(&request());
        assert_eq!(payload["messages"][0]["role"], "system");
        assert_eq!(payload["messages"][0]["content"], "critique this");
        assert_eq!(payload["messages"][1]["role"], "user");
        assert_eq!(
            payload["messages"][1]["content"][0]["image_url"]["url"],
            "https://cdn.test/files/original_image_r1.jpg"
        );
        assert_eq!(payload["max_tokens"], 800);
        let top_p = payload["top_p"].as_f64().unwrap();
        assert!((top_p - 0.95).abs() < 1e-6);
        assert!(summarize_payload(&payload).starts_with("messages=2, max_tokens=800"));
    }

    #[test]
    fn completion_text_is_returned_verbatim() {
        let response = json!({
            "choices": [{ "message": { "role": "assistant", "content": "  📷 構圖很好。\n" }, "finish_reason": "stop" }]
        });
        assert_eq!(extract_completion_text(&response).unwrap(), "  📷 構圖很好。\n");
    }

    #[test]
    fn whitespace_only_completion_is_an_error() {
        let response = json!({
            "choices": [{ "message": { "content": " \n " }, "finish_reason": "length" }]
        });
        let err = extract_completion_text(&response).unwrap_err();
        assert!(err.0.contains("finish_reason=length"));
    }

    #[test]
    fn empty_completion_is_an_error() {
        let response = json!({
            "choices": [{ "message": { "content": null }, "finish_reason": "content_filter" }]
        });
        let err = extract_completion_text(&response).unwrap_err();
        assert!(err.0.contains("content_filter"));
    }
}
