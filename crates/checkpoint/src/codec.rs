//! JSON encoding shared by the database-backed stores.

use toolchat_core::error::CheckpointError;
use toolchat_core::message::SessionId;
use toolchat_core::state::ConversationState;

pub(crate) fn encode(state: &ConversationState) -> Result<String, CheckpointError> {
    serde_json::to_string(state).map_err(|e| CheckpointError::Storage(format!("encode state: {e}")))
}

pub(crate) fn decode(session: &SessionId, raw: &str) -> Result<ConversationState, CheckpointError> {
    serde_json::from_str(raw).map_err(|e| CheckpointError::Corrupt {
        session_id: session.to_string(),
        reason: e.to_string(),
    })
}
