use super::{ChatSession, SessionUpdate};
use crate::types::{ChatMessage, Sender};
use tokio::sync::mpsc;

impl ChatSession {
    pub(super) fn append_user_message(
        &mut self,
        content: &str,
        updates: Option<&mpsc::UnboundedSender<SessionUpdate>>,
    ) {
        let message = self.push_message(Sender::User, content.to_string());
        emit_update(updates, SessionUpdate::MessageAppended(message));
    }

    pub(super) fn append_agent_message(
        &mut self,
        content: String,
        updates: Option<&mpsc::UnboundedSender<SessionUpdate>>,
    ) {
        let message = self.push_message(Sender::Agent, content);
        emit_update(updates, SessionUpdate::MessageAppended(message));
    }

    /// Synthetic agent-sender entry naming a failed exchange, so the failure
    /// stays visible in the transcript.
    pub(super) fn append_error_message(
        &mut self,
        error: &anyhow::Error,
        updates: Option<&mpsc::UnboundedSender<SessionUpdate>>,
    ) {
        let content = format!("Sorry, something went wrong: {error}. Please try again.");
        self.append_agent_message(content, updates);
    }

    fn push_message(&mut self, sender: Sender, content: String) -> ChatMessage {
        let message = ChatMessage::new(self.next_message_id, sender, content);
        self.next_message_id += 1;
        self.transcript.push(message.clone());
        message
    }
}

pub(super) fn emit_update(
    updates: Option<&mpsc::UnboundedSender<SessionUpdate>>,
    update: SessionUpdate,
) {
    if let Some(tx) = updates {
        // a dropped receiver is not an error; the session keeps driving
        let _ = tx.send(update);
    }
}
