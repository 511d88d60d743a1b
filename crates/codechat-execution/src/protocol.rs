//! Backend message kinds and the Jupyter wire decoding that produces them.

use serde_json::{Value, json};

/// A classified message received from an execution session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendMessage {
    /// Stream or plain-text output, appended verbatim.
    TextOutput { text: String },
    /// Rich display payload carrying a base64 encoded image.
    DisplayPayload { mime: String, data: String },
    /// An exception raised by the submitted code.
    ErrorNotification { name: String, detail: String },
}

impl BackendMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self::TextOutput { text: text.into() }
    }

    pub fn image(mime: impl Into<String>, data: impl Into<String>) -> Self {
        Self::DisplayPayload {
            mime: mime.into(),
            data: data.into(),
        }
    }

    pub fn error(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ErrorNotification {
            name: name.into(),
            detail: detail.into(),
        }
    }
}

/// `"{name}: {detail}"`, the form in which errors land in the output buffer.
pub fn format_error(name: &str, detail: &str) -> String {
    format!("{}: {}", name, detail)
}

/// One decoded channel frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelFrame {
    Message(BackendMessage),
    /// The kernel went idle for our request: the submission is fully processed.
    Idle,
    /// Unrelated or uninteresting frame.
    Ignored,
}

/// Builds the `execute_request` sent on the shell channel.
pub fn execute_request(msg_id: &str, session: &str, code: &str) -> Value {
    json!({
        "header": {
            "msg_id": msg_id,
            "username": "codechat",
            "session": session,
            "msg_type": "execute_request",
            "version": "5.3",
            "date": chrono::Utc::now().to_rfc3339(),
        },
        "parent_header": {},
        "metadata": {},
        "content": {
            "code": code,
            "silent": false,
            "store_history": true,
            "user_expressions": {},
            "allow_stdin": false,
            "stop_on_error": true,
        },
        "channel": "shell",
        "buffers": [],
    })
}

/// Decodes a raw channel frame, keeping only replies to `request_id`.
///
/// Returns `None` when the frame is not valid JSON.
pub fn decode_frame(raw: &str, request_id: &str) -> Option<KernelFrame> {
    let frame: Value = serde_json::from_str(raw).ok()?;

    let parent_id = frame
        .pointer("/parent_header/msg_id")
        .and_then(Value::as_str);
    if parent_id != Some(request_id) {
        return Some(KernelFrame::Ignored);
    }

    let msg_type = frame
        .pointer("/header/msg_type")
        .or_else(|| frame.get("msg_type"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let content = frame.get("content").unwrap_or(&Value::Null);

    let decoded = match msg_type {
        "stream" => content
            .get("text")
            .and_then(Value::as_str)
            .map(|text| KernelFrame::Message(BackendMessage::text(text))),
        "display_data" | "execute_result" => decode_display(content),
        "error" => {
            let name = content.get("ename").and_then(Value::as_str).unwrap_or("Error");
            let detail = content.get("evalue").and_then(Value::as_str).unwrap_or_default();
            Some(KernelFrame::Message(BackendMessage::error(name, detail)))
        }
        "status" => match content.get("execution_state").and_then(Value::as_str) {
            Some("idle") => Some(KernelFrame::Idle),
            _ => None,
        },
        _ => None,
    };

    Some(decoded.unwrap_or(KernelFrame::Ignored))
}

fn decode_display(content: &Value) -> Option<KernelFrame> {
    let data = content.get("data")?.as_object()?;

    // Deterministic pick: prefer png, then any other image type by name.
    // Entries without a string payload are not usable images.
    let mut images: Vec<(&String, &str)> = data
        .iter()
        .filter(|(mime, _)| mime.starts_with("image/"))
        .filter_map(|(mime, payload)| payload.as_str().map(|payload| (mime, payload)))
        .collect();
    images.sort_by(|(a, _), (b, _)| {
        let rank = |mime: &str| (mime != "image/png", mime.to_string());
        rank(a.as_str()).cmp(&rank(b.as_str()))
    });

    if let Some((mime, payload)) = images.first() {
        let stripped: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        return Some(KernelFrame::Message(BackendMessage::image(
            mime.as_str(),
            stripped,
        )));
    }

    data.get("text/plain")
        .and_then(Value::as_str)
        .map(|text| KernelFrame::Message(BackendMessage::text(text)))
}
