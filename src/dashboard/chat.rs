//! Webhook-backed chat.
//!
//! Each user turn is POSTed as `{"query": ...}` to a fixed webhook. Whatever
//! happens (a reply, an HTTP error status, a transport failure) ends up as an
//! assistant entry in the transcript; nothing is raised to the caller.

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use std::error::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, instrument, warn};

use crate::models::ChatMessage;

/// An in-memory transcript bound to one webhook.
#[derive(Debug)]
pub struct ChatSession {
    http: Client,
    webhook_url: String,
    messages: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new(http: Client, webhook_url: impl Into<String>) -> Self {
        Self {
            http,
            webhook_url: webhook_url.into(),
            messages: Vec::new(),
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Record `prompt`, send it to the webhook, record and return the reply.
    #[instrument(level = "info", skip_all)]
    pub async fn submit(&mut self, prompt: &str) -> &ChatMessage {
        self.messages.push(ChatMessage::user(prompt));
        let reply = invoke_webhook(&self.http, &self.webhook_url, prompt).await;
        self.messages.push(ChatMessage::assistant(reply));
        &self.messages[self.messages.len() - 1]
    }
}

async fn invoke_webhook(http: &Client, url: &str, prompt: &str) -> String {
    let response = match http.post(url).json(&json!({ "query": prompt })).send().await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "Webhook request failed");
            return format!("Exception: {e}");
        }
    };

    let status = response.status();
    if status != StatusCode::OK {
        warn!(%status, "Webhook returned an error status");
        return format!("❌ Request failed: {}", status.as_u16());
    }

    match response.text().await {
        Ok(body) => {
            debug!(bytes = body.len(), "Webhook replied");
            reply_from_body(&body)
        }
        Err(e) => {
            warn!(error = %e, "Failed reading webhook body");
            format!("Exception: {e}")
        }
    }
}

/// Pick the text to show for a successful webhook response.
///
/// A JSON object with a truthy `reply` yields that reply; any other JSON
/// object is shown whole; anything else is shown as raw text.
pub fn reply_from_body(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => match map.get("reply") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(other) if is_truthy(other) => other.to_string(),
            _ => serde_json::to_string(&map).unwrap_or_else(|_| body.to_string()),
        },
        _ => body.to_string(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Interactive loop: read a line, submit it, print the reply.
///
/// Ends on EOF or on `exit` / `quit`.
pub async fn run_repl<I, O>(session: &mut ChatSession, input: I, mut output: O) -> Result<(), Box<dyn Error>>
where
    I: AsyncBufRead + Unpin,
    O: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    loop {
        output.write_all(b"you> ").await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let prompt = line.trim();
        if prompt.is_empty() {
            continue;
        }
        if prompt.eq_ignore_ascii_case("exit") || prompt.eq_ignore_ascii_case("quit") {
            break;
        }

        let reply = session.submit(prompt).await;
        output
            .write_all(format!("assistant> {}\n", reply.content).as_bytes())
            .await?;
    }
    output.write_all(b"\n").await?;
    output.flush().await?;
    info!(turns = session.messages().len(), "Chat session ended");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use mockito::{Matcher, Mock, ServerGuard};
    use tokio::io::BufReader;

    async fn session_with(status: usize, body: &str) -> (ServerGuard, Mock, ChatSession) {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/webhook/invoke_agent")
            .match_body(Matcher::Json(json!({"query": "hello"})))
            .with_status(status)
            .with_body(body)
            .create_async()
            .await;
        let url = format!("{}/webhook/invoke_agent", server.url());
        (server, mock, ChatSession::new(Client::new(), url))
    }

    #[tokio::test]
    async fn test_reply_field_becomes_assistant_entry() {
        let (_server, _mock, mut session) = session_with(200, r#"{"reply": "hi"}"#).await;

        let reply = session.submit("hello").await.clone();

        assert_eq!(reply, ChatMessage::assistant("hi"));
        assert_eq!(
            session.messages(),
            &[ChatMessage::user("hello"), ChatMessage::assistant("hi")]
        );
    }

    #[tokio::test]
    async fn test_error_status_is_reported_inline() {
        let (_server, _mock, mut session) = session_with(500, "boom").await;

        let reply = session.submit("hello").await;

        assert_eq!(reply.role, Role::Assistant);
        assert!(reply.content.starts_with("❌ Request failed: 500"));
        assert_eq!(session.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_webhook_is_exception_entry() {
        let mut session = ChatSession::new(Client::new(), "http://127.0.0.1:9/webhook");
        let reply = session.submit("hello").await;
        assert!(reply.content.starts_with("Exception: "));
    }

    #[test]
    fn test_reply_fallbacks() {
        assert_eq!(reply_from_body(r#"{"reply": "hi"}"#), "hi");
        assert_eq!(reply_from_body(r#"{"reply": ""}"#), r#"{"reply":""}"#);
        assert_eq!(reply_from_body(r#"{"output": "x"}"#), r#"{"output":"x"}"#);
        assert_eq!(reply_from_body(r#"{"reply": 42}"#), "42");
        assert_eq!(reply_from_body("[1, 2]"), "[1, 2]");
        assert_eq!(reply_from_body("plain text"), "plain text");
    }

    #[tokio::test]
    async fn test_repl_runs_until_exit() {
        let (_server, _mock, mut session) = session_with(200, r#"{"reply": "hi"}"#).await;
        let input = BufReader::new(&b"\nhello\nexit\nignored\n"[..]);
        let mut output = Vec::new();

        run_repl(&mut session, input, &mut output).await.unwrap();

        let shown = String::from_utf8(output).unwrap();
        assert!(shown.contains("assistant> hi\n"));
        assert_eq!(session.messages().len(), 2);
    }
}
