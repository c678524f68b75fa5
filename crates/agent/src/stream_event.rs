//! Client-facing stream events and their wire encoding.
//!
//! A turn produces
//! `checkpoint? (content | tool_output)* (loop_limit_exceeded | error)? end`
//! and every event goes over the wire through [`encode_frame`].

use serde::{Deserialize, Serialize};
use toolchat_core::tool::ToolResult;

/// One unit of the outward server-sent-event protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Id of a newly created session. Only sent when the client supplied none.
    Checkpoint { checkpoint_id: String },

    /// Fragment of assistant text.
    Content { content: String },

    /// One tool request has resolved.
    ToolOutput { output: ToolOutput },

    /// The loop hit its iteration bound before the model stopped requesting tools.
    LoopLimitExceeded { max_iterations: u32 },

    /// The model could not be reached; the turn ends without a final answer.
    Error { message: String },

    /// Always the last event of a turn.
    End,
}

/// Payload of a `tool_output` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub name: String,
    pub success: bool,
    /// The tool's JSON value, or `{"error": ".."}`
    pub result: serde_json::Value,
}

impl From<&ToolResult> for ToolOutput {
    fn from(result: &ToolResult) -> Self {
        Self {
            tool_call_id: result.call_id.clone(),
            name: result.name.clone(),
            success: result.success,
            result: result.payload.clone(),
        }
    }
}

impl StreamEvent {
    /// Value of the `type` field.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Checkpoint { .. } => "checkpoint",
            Self::Content { .. } => "content",
            Self::ToolOutput { .. } => "tool_output",
            Self::LoopLimitExceeded { .. } => "loop_limit_exceeded",
            Self::Error { .. } => "error",
            Self::End => "end",
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }
}

/// Encode one event as an SSE frame: `data: <json>\n\n`.
///
/// JSON string escaping turns CR, LF and every other control character into
/// escape sequences, so the frame is always a single `data:` line.
pub fn encode_frame(event: &StreamEvent) -> String {
    let json = serde_json::to_string(event).unwrap_or_else(|e| {
        tracing::error!(error = %e, event_type = event.event_type(), "Failed to encode stream event");
        r#"{"type":"error","message":"internal encoding error"}"#.to_string()
    });
    format!("data: {json}\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn checkpoint_frame() {
        let frame = encode_frame(&StreamEvent::Checkpoint {
            checkpoint_id: "0b9f6c1e-3c1d-4a8e-9a57-0c0f3e1a2b3c".into(),
        });
        assert_eq!(
            frame,
            "data: {\"type\":\"checkpoint\",\"checkpoint_id\":\"0b9f6c1e-3c1d-4a8e-9a57-0c0f3e1a2b3c\"}\n\n"
        );
    }

    #[test]
    fn end_frame() {
        assert_eq!(encode_frame(&StreamEvent::End), "data: {\"type\":\"end\"}\n\n");
    }

    #[test]
    fn content_with_delimiters_stays_on_one_line() {
        let text = "line one\nline two\r\n\"quoted\" \\ back\u{0007}bell\n\ndata: fake";
        let frame = encode_frame(&StreamEvent::Content { content: text.into() });

        let body = frame.strip_prefix("data: ").unwrap().strip_suffix("\n\n").unwrap();
        assert!(!body.contains('\n'));
        assert!(!body.contains('\r'));
        assert!(!body.chars().any(|c| c.is_control()));

        let decoded: StreamEvent = serde_json::from_str(body).unwrap();
        assert_eq!(decoded, StreamEvent::Content { content: text.into() });
    }

    #[test]
    fn tool_output_frame() {
        let event = StreamEvent::ToolOutput {
            output: ToolOutput {
                tool_call_id: "call_1".into(),
                name: "calculator".into(),
                success: true,
                result: json!({"result": 42}),
            },
        };
        let value: serde_json::Value =
            serde_json::from_str(encode_frame(&event).trim_start_matches("data: ").trim_end()).unwrap();
        assert_eq!(value["type"], "tool_output");
        assert_eq!(value["output"]["result"]["result"], 42);
        assert_eq!(value["output"]["tool_call_id"], "call_1");
    }

    #[test]
    fn loop_limit_and_error_shapes() {
        assert_eq!(
            serde_json::to_value(StreamEvent::LoopLimitExceeded { max_iterations: 5 }).unwrap(),
            json!({"type": "loop_limit_exceeded", "max_iterations": 5})
        );
        assert_eq!(
            serde_json::to_value(StreamEvent::Error { message: "boom".into() }).unwrap(),
            json!({"type": "error", "message": "boom"})
        );
    }

    #[test]
    fn event_type_matches_serialized_tag() {
        let events = [
            StreamEvent::Checkpoint { checkpoint_id: "x".into() },
            StreamEvent::Content { content: "x".into() },
            StreamEvent::LoopLimitExceeded { max_iterations: 1 },
            StreamEvent::Error { message: "x".into() },
            StreamEvent::End,
        ];
        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["type"], event.event_type());
        }
    }
}
