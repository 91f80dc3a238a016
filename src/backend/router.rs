//! Hosted chat-completions backend (Hugging Face router or any
//! OpenAI-compatible endpoint).
use super::{
    compact_detail, retry_with_backoff, Backend, BackendError, CallOutcome, RetryPolicy,
    CALL_TIMEOUT,
};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use ureq::Agent;

const DETAIL_MAX_CHARS: usize = 300;

pub struct RouterBackend {
    agent: Agent,
    base_url: String,
    token: String,
    model: String,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatReply>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl RouterBackend {
    pub fn new(token: String, model: String, base_url: String, retry: RetryPolicy) -> Result<Self> {
        if token.trim().is_empty() {
            return Err(anyhow!("HF_TOKEN is empty"));
        }
        if model.trim().is_empty() {
            return Err(anyhow!("HF_MODEL is empty"));
        }
        let config = Agent::config_builder()
            .timeout_global(Some(CALL_TIMEOUT))
            .http_status_as_error(false)
            .build();
        Ok(Self {
            agent: Agent::new_with_config(config),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            model,
            retry,
        })
    }

    fn call_once(&self, request: &ChatRequest<'_>) -> CallOutcome {
        let url = format!("{}/chat/completions", self.base_url);
        let start = Instant::now();
        let response = self
            .agent
            .post(url.as_str())
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/json")
            .send_json(request);
        let mut response = match response {
            Ok(response) => response,
            Err(err) => return classify_transport_error(err),
        };
        let status = response.status().as_u16();
        let body = match response.body_mut().read_to_string() {
            Ok(body) => body,
            Err(err) => return CallOutcome::Transient(format!("read router response: {err}")),
        };
        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            status,
            response_bytes = body.len(),
            "router call complete"
        );
        classify_response(status, &body, &self.model)
    }
}

impl Backend for RouterBackend {
    fn generate(
        &mut self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, BackendError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature,
            max_tokens,
        };
        retry_with_backoff(&self.retry, |_| self.call_once(&request))
    }

    fn set_model(&mut self, model: &str) {
        self.model = model.to_string();
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

fn classify_transport_error(err: ureq::Error) -> CallOutcome {
    match err {
        ureq::Error::Timeout(_) | ureq::Error::Io(_) | ureq::Error::ConnectionFailed => {
            CallOutcome::Transient(format!("router unreachable: {err}"))
        }
        other => CallOutcome::Fatal(BackendError::Transport(other.to_string())),
    }
}

/// Map an HTTP status and body onto the tri-state call outcome.
fn classify_response(status: u16, body: &str, model: &str) -> CallOutcome {
    let detail = || compact_detail(body, DETAIL_MAX_CHARS);
    if matches!(status, 429 | 503 | 504) {
        return CallOutcome::Transient(format!("temporary router error {status}: {}", detail()));
    }
    if matches!(status, 401 | 403) {
        return CallOutcome::Fatal(BackendError::Unauthorized {
            status,
            detail: detail(),
        });
    }
    if status >= 400 {
        return CallOutcome::Fatal(BackendError::Rejected {
            status,
            detail: detail(),
        });
    }

    let parsed: ChatResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(err) => {
            return CallOutcome::Fatal(BackendError::Rejected {
                status,
                detail: format!("response is not chat-completions JSON: {err}"),
            })
        }
    };
    let text = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .unwrap_or_default();
    if text.trim().is_empty() {
        return CallOutcome::Fatal(BackendError::EmptyResponse {
            model: model.to_string(),
        });
    }
    CallOutcome::Success(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = "meta-llama/Llama-3.1-8B-Instruct";

    #[test]
    fn rate_limits_and_gateway_errors_are_transient() {
        for status in [429, 503, 504] {
            let outcome = classify_response(status, "slow   down\n", MODEL);
            assert_eq!(
                outcome,
                CallOutcome::Transient(format!("temporary router error {status}: slow down"))
            );
        }
    }

    #[test]
    fn auth_failures_are_fatal() {
        let outcome = classify_response(401, r#"{"error":"Invalid credentials"}"#, MODEL);
        assert!(matches!(
            outcome,
            CallOutcome::Fatal(BackendError::Unauthorized { status: 401, .. })
        ));
    }

    #[test]
    fn malformed_requests_are_fatal() {
        let outcome = classify_response(422, "max_tokens too large", MODEL);
        assert_eq!(
            outcome,
            CallOutcome::Fatal(BackendError::Rejected {
                status: 422,
                detail: "max_tokens too large".to_string(),
            })
        );
        let outcome = classify_response(500, "boom", MODEL);
        assert!(matches!(outcome, CallOutcome::Fatal(BackendError::Rejected { status: 500, .. })));
    }

    #[test]
    fn extracts_first_choice_content_verbatim() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"MCQs:\n1. Q"}}]}"#;
        assert_eq!(
            classify_response(200, body, MODEL),
            CallOutcome::Success("MCQs:\n1. Q".to_string())
        );
    }

    #[test]
    fn blank_or_missing_content_is_an_empty_response() {
        for body in [
            r#"{"choices":[]}"#,
            r#"{"choices":[{"message":{"content":"   "}}]}"#,
            r#"{"choices":[{"message":{}}]}"#,
            r#"{}"#,
        ] {
            assert_eq!(
                classify_response(200, body, MODEL),
                CallOutcome::Fatal(BackendError::EmptyResponse {
                    model: MODEL.to_string()
                })
            );
        }
    }

    #[test]
    fn non_json_success_body_is_rejected() {
        let outcome = classify_response(200, "<html>gateway</html>", MODEL);
        assert!(matches!(outcome, CallOutcome::Fatal(BackendError::Rejected { status: 200, .. })));
    }

    #[test]
    fn request_serializes_as_single_user_message() {
        let request = ChatRequest {
            model: MODEL,
            messages: [ChatMessage {
                role: "user",
                content: "Explain GDP",
            }],
            temperature: 0.0,
            max_tokens: 360,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], MODEL);
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "Explain GDP");
        assert_eq!(value["max_tokens"], 360);
    }

    #[test]
    fn constructor_requires_token_and_model() {
        let base = crate::config::DEFAULT_ROUTER_BASE_URL.to_string();
        assert!(RouterBackend::new(" ".into(), MODEL.into(), base.clone(), RetryPolicy::default()).is_err());
        assert!(RouterBackend::new("hf_x".into(), "".into(), base.clone(), RetryPolicy::default()).is_err());
        let mut backend =
            RouterBackend::new("hf_x".into(), MODEL.into(), format!("{base}/"), RetryPolicy::default())
                .unwrap();
        assert_eq!(backend.base_url, base);
        backend.set_model("Qwen/Qwen2.5-7B-Instruct");
        assert_eq!(backend.model_id(), "Qwen/Qwen2.5-7B-Instruct");
    }
}
