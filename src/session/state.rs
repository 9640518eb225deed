use crate::api::ChatClient;
use crate::config::Config;
use crate::types::{ChatMessage, InterruptPayload};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    AwaitingResponse,
    Streaming,
    AwaitingInterruptResolution,
}

/// How an exchange (or an attempt to start one) ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// The call was a no-op: blank input, wrong phase, or no pending interrupt.
    Ignored,
    /// A form submission failed client-side validation; nothing was sent.
    Rejected { missing: Vec<String> },
    Completed,
    Interrupted,
    Cancelled,
    Failed,
}

/// A server-initiated pause awaiting user approval or structured input.
///
/// `raw` holds the payload exactly as the server sent it; resolvers echo it
/// back with the response merged in, so the typed view is never re-serialized.
#[derive(Debug, Clone)]
pub struct PendingInterrupt {
    pub payload: InterruptPayload,
    pub raw: serde_json::Value,
}

impl PendingInterrupt {
    pub fn tool_name(&self) -> &str {
        match &self.payload {
            InterruptPayload::ToolApprove { tool } => tool,
            InterruptPayload::ToolInputForm { tool, .. } => tool,
        }
    }
}

/// Progress reports emitted while an exchange is driven. Hosts render these;
/// the session itself never touches a display.
#[derive(Debug, Clone)]
pub enum SessionUpdate {
    AgentDelta { content: String },
    MessageAppended(ChatMessage),
    InterruptPending(PendingInterrupt),
    ExchangeClosed { outcome: ExchangeOutcome },
}

/// Cloneable handle that aborts the exchange in flight from another task.
/// After a cancel or reset the session rotates to a fresh token, so take a
/// new handle before each exchange.
#[derive(Clone)]
pub struct SessionCancelHandle {
    pub(super) token: CancellationToken,
}

impl SessionCancelHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

/// Client-side controller for one conversation with one chat agent.
///
/// Exactly one exchange is in flight at a time: driving methods take
/// `&mut self` and run the stream to completion before returning. Two
/// invariants hold at every return: a pending interrupt exists exactly in
/// `AwaitingInterruptResolution`, and the stream buffer is non-empty only
/// while `Streaming`.
pub struct ChatSession {
    pub(super) client: Arc<ChatClient>,
    pub(super) user_id: String,
    pub(super) idle_timeout: Option<Duration>,
    pub(super) transcript: Vec<ChatMessage>,
    pub(super) task_id: Option<String>,
    pub(super) resume_key: Option<String>,
    pub(super) stream_buffer: String,
    pub(super) pending_interrupt: Option<PendingInterrupt>,
    pub(super) phase: SessionPhase,
    pub(super) next_message_id: u64,
    pub(super) cancel_token: CancellationToken,
}

impl ChatSession {
    pub fn new(client: ChatClient, config: &Config) -> Self {
        Self::with_parts(client, config.user_id.clone(), config.idle_timeout())
    }

    fn with_parts(client: ChatClient, user_id: String, idle_timeout: Option<Duration>) -> Self {
        Self {
            client: Arc::new(client),
            user_id,
            idle_timeout,
            transcript: Vec::new(),
            task_id: None,
            resume_key: None,
            stream_buffer: String::new(),
            pending_interrupt: None,
            phase: SessionPhase::Idle,
            next_message_id: 1,
            cancel_token: CancellationToken::new(),
        }
    }

    #[cfg(test)]
    pub fn new_mock(client: ChatClient) -> Self {
        Self::with_parts(client, "user-1".to_string(), None)
    }

    #[cfg(test)]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    /// Partial agent text accumulated by the current exchange.
    pub fn stream_buffer(&self) -> &str {
        &self.stream_buffer
    }

    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    pub fn resume_key(&self) -> Option<&str> {
        self.resume_key.as_deref()
    }

    pub fn pending_interrupt(&self) -> Option<&PendingInterrupt> {
        self.pending_interrupt.as_ref()
    }

    pub fn cancel_handle(&self) -> SessionCancelHandle {
        SessionCancelHandle {
            token: self.cancel_token.clone(),
        }
    }

    /// Drop the whole conversation: transcript, buffers, pending interrupt,
    /// and both continuation tokens. The next exchange starts a new server
    /// task from scratch.
    pub fn reset(&mut self) {
        self.cancel_token.cancel();
        self.cancel_token = CancellationToken::new();
        self.transcript.clear();
        self.stream_buffer.clear();
        self.pending_interrupt = None;
        self.task_id = None;
        self.resume_key = None;
        self.phase = SessionPhase::Idle;
        self.next_message_id = 1;
        tracing::debug!("session reset");
    }
}
