use once_cell::sync::Lazy;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_else(|err| {
            tracing::error!("Failed to build configured HTTP client: {err}");
            Client::new()
        })
});

pub fn get_http_client() -> &'static Client {
    &HTTP_CLIENT
}

pub fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

/// Pulls a human readable message out of an Azure style error body and
/// returns it with a truncated copy of the body for logging.
pub fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_is_read_from_nested_error() {
        let (message, _) =
            summarize_error_body(r#"{"error":{"code":"InvalidRequest","message":"bad image"}}"#);
        assert_eq!(message.as_deref(), Some("bad image"));
    }

    #[test]
    fn plain_text_body_is_kept_for_logging() {
        let (message, summary) = summarize_error_body("  gateway timeout ");
        assert!(message.is_none());
        assert_eq!(summary, "gateway timeout");
    }

    #[test]
    fn empty_body_is_labelled() {
        assert_eq!(summarize_error_body("").1, "empty response body");
    }

    #[test]
    fn long_values_are_truncated() {
        assert_eq!(truncate_for_log("abcdef", 3), "abc... (truncated)");
        assert_eq!(truncate_for_log("abc", 3), "abc");
    }
}
