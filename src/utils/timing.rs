use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use teloxide::types::Message;
use tracing::info;

use crate::utils::logging::TIMING_TARGET;

/// Who asked for a critique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOrigin {
    Chat {
        chat_id: i64,
        user_id: Option<i64>,
        username: Option<String>,
        message_id: i32,
    },
    Web,
}

impl RequestOrigin {
    pub fn from_message(message: &Message) -> Self {
        let user = message.from.as_ref();
        RequestOrigin::Chat {
            chat_id: message.chat.id.0,
            user_id: user.and_then(|u| i64::try_from(u.id.0).ok()),
            username: user.and_then(|u| u.username.clone()),
            message_id: message.id.0,
        }
    }
}

impl fmt::Display for RequestOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestOrigin::Chat {
                chat_id,
                user_id,
                username,
                message_id,
            } => write!(
                f,
                "origin=chat chat_id={chat_id} user_id={user_id:?} username={username:?} message_id={message_id}"
            ),
            RequestOrigin::Web => write!(f, "origin=web"),
        }
    }
}

/// Logs receipt and completion of one photo request on the timing target.
/// A timer dropped before completion is logged as `abandoned`.
#[derive(Debug)]
pub struct CommandTimer {
    command: &'static str,
    origin: RequestOrigin,
    started_at: DateTime<Utc>,
    started_perf: Instant,
    outcome: Option<(String, Option<String>)>,
}

impl CommandTimer {
    pub fn start(command: &'static str, origin: RequestOrigin) -> Self {
        let timer = CommandTimer {
            command,
            origin,
            started_at: Utc::now(),
            started_perf: Instant::now(),
            outcome: None,
        };
        info!(
            target: TIMING_TARGET,
            "event=request_received command={} {} received_at={}",
            timer.command,
            timer.origin,
            timer.started_at.to_rfc3339()
        );
        timer
    }

    pub fn is_completed(&self) -> bool {
        self.outcome.is_some()
    }

    /// Records the outcome once; later calls are ignored.
    pub fn complete(&mut self, status: &str, detail: Option<String>) {
        if self.outcome.is_some() {
            return;
        }
        let duration = self.started_perf.elapsed().as_secs_f64();
        info!(
            target: TIMING_TARGET,
            "event=request_completed command={} {} started_at={} completed_at={} duration_s={:.3} status={} detail={}",
            self.command,
            self.origin,
            self.started_at.to_rfc3339(),
            Utc::now().to_rfc3339(),
            duration,
            status,
            detail.as_deref().unwrap_or_default()
        );
        self.outcome = Some((status.to_string(), detail));
    }
}

impl Drop for CommandTimer {
    fn drop(&mut self) {
        if !self.is_completed() {
            self.complete("abandoned", None);
        }
    }
}

pub fn start_command_timer(command: &'static str, message: &Message) -> CommandTimer {
    CommandTimer::start(command, RequestOrigin::from_message(message))
}

pub fn start_request_timer(command: &'static str) -> CommandTimer {
    CommandTimer::start(command, RequestOrigin::Web)
}

pub fn complete_command_timer(timer: &mut CommandTimer, status: &str, detail: Option<String>) {
    timer.complete(status, detail);
}

/// Wraps one outbound service call with request/response timing events.
pub async fn log_service_timing<T, E, F, Fut>(
    provider: &str,
    model: &str,
    operation: &str,
    metadata: Option<JsonValue>,
    call: F,
) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let started_perf = Instant::now();
    let metadata_text = metadata.map(|value| value.to_string()).unwrap_or_default();
    info!(
        target: TIMING_TARGET,
        "event=service_request provider={} model={} operation={} started_at={} metadata={}",
        provider,
        model,
        operation,
        Utc::now().to_rfc3339(),
        metadata_text
    );

    let result = call().await;

    info!(
        target: TIMING_TARGET,
        "event=service_response provider={} model={} operation={} completed_at={} duration_s={:.3} status={} metadata={}",
        provider,
        model,
        operation,
        Utc::now().to_rfc3339(),
        started_perf.elapsed().as_secs_f64(),
        if result.is_ok() { "success" } else { "error" },
        metadata_text
    );

    result
}
