//! Conversation state: the append-only message log of one session.

use serde::{Deserialize, Serialize};

use crate::error::StateError;
use crate::message::{Message, Role, ToolRequest};

/// Ordered sequence of messages for one session.
///
/// `merge` is the only way to add messages. It appends in arrival order and
/// enforces that every tool message answers an unanswered request of the
/// assistant message that opened the current tool round.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    messages: Vec<Message>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Append `incoming` in order. On error nothing is appended.
    pub fn merge(&mut self, incoming: impl IntoIterator<Item = Message>) -> Result<(), StateError> {
        let checkpoint = self.messages.len();
        for message in incoming {
            if let Err(e) = self.validate(&message) {
                self.messages.truncate(checkpoint);
                return Err(e);
            }
            self.messages.push(message);
        }
        Ok(())
    }

    /// Tool requests of the latest assistant message that have no result yet.
    pub fn pending_tool_requests(&self) -> Vec<&ToolRequest> {
        let Some(opener) = self.round_opener() else {
            return Vec::new();
        };
        let answered = &self.messages[opener + 1..];
        self.messages[opener]
            .tool_requests
            .iter()
            .filter(|req| {
                !answered
                    .iter()
                    .any(|m| m.tool_call_id.as_deref() == Some(req.id.as_str()))
            })
            .collect()
    }

    /// Index of the assistant message followed only by tool messages.
    fn round_opener(&self) -> Option<usize> {
        let idx = self.messages.iter().rposition(|m| m.role != Role::Tool)?;
        (self.messages[idx].role == Role::Assistant).then_some(idx)
    }

    fn validate(&self, message: &Message) -> Result<(), StateError> {
        let pending = self.pending_tool_requests();
        match message.role {
            Role::Tool => {
                let id = message
                    .tool_call_id
                    .as_deref()
                    .ok_or(StateError::MissingToolCallId)?;
                if pending.iter().any(|req| req.id == id) {
                    Ok(())
                } else {
                    Err(StateError::UnmatchedToolResult {
                        tool_call_id: id.to_string(),
                    })
                }
            }
            _ if !pending.is_empty() => Err(StateError::PendingToolRequests {
                count: pending.len(),
            }),
            _ => Ok(()),
        }
    }
}

impl From<ConversationState> for Vec<Message> {
    fn from(state: ConversationState) -> Self {
        state.messages
    }
}
