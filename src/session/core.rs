use super::history::emit_update;
use super::{ChatSession, ExchangeOutcome, PendingInterrupt, SessionPhase, SessionUpdate};
use crate::api::client::ByteStream;
use crate::api::stream::StreamDecoder;
use crate::types::{
    ChatRequest, EventKind, InterruptPayload, RequestKind, SseState, StreamEventRecord,
};
use anyhow::{anyhow, Result};
use bytes::Bytes;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

impl ChatSession {
    /// Send one user message and drive the whole exchange: POST the request,
    /// decode the response stream, and apply frames until a final frame,
    /// cancellation, or failure ends it.
    ///
    /// `Err` is reserved for host-level faults; transport and protocol
    /// problems resolve to `Ok(ExchangeOutcome::Failed)` with a synthetic
    /// transcript entry.
    pub async fn submit_user_message(
        &mut self,
        text: &str,
        updates: Option<&mpsc::UnboundedSender<SessionUpdate>>,
    ) -> Result<ExchangeOutcome> {
        if self.phase != SessionPhase::Idle {
            tracing::debug!(phase = ?self.phase, "submit ignored: an exchange is already in flight");
            return Ok(ExchangeOutcome::Ignored);
        }
        if text.trim().is_empty() {
            tracing::debug!("submit ignored: blank input");
            return Ok(ExchangeOutcome::Ignored);
        }

        self.append_user_message(text, updates);
        let request = self.base_request(RequestKind::Chat, text.to_string());
        self.run_exchange(request, updates).await
    }

    /// Every request echoes the sticky continuation tokens so the platform
    /// can route it to the running server-side task.
    pub(super) fn base_request(&self, kind: RequestKind, content: String) -> ChatRequest {
        ChatRequest {
            user_id: self.user_id.clone(),
            kind,
            content,
            resume_key: self.resume_key.clone(),
            task_id: self.task_id.clone(),
            payload: None,
        }
    }

    pub(super) async fn run_exchange(
        &mut self,
        request: ChatRequest,
        updates: Option<&mpsc::UnboundedSender<SessionUpdate>>,
    ) -> Result<ExchangeOutcome> {
        if self.cancel_token.is_cancelled() {
            // a cancel fired between exchanges; run this one on a fresh token
            self.cancel_token = CancellationToken::new();
        }
        self.phase = SessionPhase::AwaitingResponse;
        tracing::debug!(kind = ?request.kind, task_id = ?request.task_id, "opening exchange");

        let outcome = match self.drive_stream(&request, updates).await {
            Ok(outcome) => outcome,
            Err(error) => self.fail_exchange(error, updates),
        };
        if outcome == ExchangeOutcome::Cancelled {
            // the fired token stays cancelled; later exchanges need a new one
            self.cancel_token = CancellationToken::new();
        }

        emit_update(
            updates,
            SessionUpdate::ExchangeClosed {
                outcome: outcome.clone(),
            },
        );
        Ok(outcome)
    }

    async fn drive_stream(
        &mut self,
        request: &ChatRequest,
        updates: Option<&mpsc::UnboundedSender<SessionUpdate>>,
    ) -> Result<ExchangeOutcome> {
        let cancel = self.cancel_token.clone();
        let idle_timeout = self.idle_timeout;
        let client = Arc::clone(&self.client);

        let mut stream = tokio::select! {
            _ = cancel.cancelled() => return Ok(self.cancel_exchange()),
            opened = client.open_stream(request) => opened?,
        };

        let mut decoder = StreamDecoder::new();
        loop {
            let step = tokio::select! {
                _ = cancel.cancelled() => return Ok(self.cancel_exchange()),
                step = next_chunk(&mut stream, idle_timeout) => step,
            };

            let chunk = match step {
                Ok(Some(chunk)) => chunk,
                Ok(None) => {
                    let leftover = decoder.flush();
                    if !leftover.trim().is_empty() {
                        tracing::warn!(%leftover, "discarding unterminated line at end of stream");
                    }
                    return Err(anyhow!("stream closed before a final frame arrived"));
                }
                Err(error) => return Err(error),
            };

            let records = decoder.decode(&chunk);
            let total = records.len();
            for (index, record) in records.into_iter().enumerate() {
                if let Some(outcome) = self.apply_frame(record, updates) {
                    // the first final frame ends the exchange
                    let trailing = total - index - 1;
                    if trailing > 0 {
                        tracing::debug!(trailing, "dropping frames decoded after the final frame");
                    }
                    return Ok(outcome);
                }
            }
        }
    }

    /// Apply one decoded frame. Returns the outcome once a final frame has
    /// been handled; `None` keeps the stream going.
    fn apply_frame(
        &mut self,
        record: StreamEventRecord,
        updates: Option<&mpsc::UnboundedSender<SessionUpdate>>,
    ) -> Option<ExchangeOutcome> {
        match record.sse_state {
            SseState::Running => {
                if !record.is_stream {
                    tracing::debug!("ignoring running frame without the stream flag");
                    return None;
                }
                self.stream_buffer.push_str(&record.content);
                self.phase = SessionPhase::Streaming;
                emit_update(
                    updates,
                    SessionUpdate::AgentDelta {
                        content: record.content,
                    },
                );
                None
            }
            SseState::End => Some(self.finalize(record, updates)),
        }
    }

    fn finalize(
        &mut self,
        record: StreamEventRecord,
        updates: Option<&mpsc::UnboundedSender<SessionUpdate>>,
    ) -> ExchangeOutcome {
        let mut content = std::mem::take(&mut self.stream_buffer);
        content.push_str(&record.content);
        // appended even when empty, matching the platform transcript rules
        self.append_agent_message(content, updates);

        // both tokens are sticky: an absent field leaves the previous value intact
        if let Some(task_id) = record.task_id {
            self.task_id = Some(task_id);
        }
        if let Some(resume_key) = record.resume_key {
            self.resume_key = Some(resume_key);
        }

        match record.kind {
            None | Some(EventKind::Answer) => {
                self.phase = SessionPhase::Idle;
                ExchangeOutcome::Completed
            }
            Some(EventKind::Interrupt) => self.begin_interrupt(record.payload, updates),
            Some(EventKind::Unknown) => {
                tracing::warn!("final frame carries an unrecognized type; treating as an answer");
                self.phase = SessionPhase::Idle;
                ExchangeOutcome::Completed
            }
        }
    }

    fn begin_interrupt(
        &mut self,
        payload: Option<serde_json::Value>,
        updates: Option<&mpsc::UnboundedSender<SessionUpdate>>,
    ) -> ExchangeOutcome {
        let Some(raw) = payload else {
            tracing::warn!("interrupt frame without a payload; nothing to resolve");
            self.phase = SessionPhase::Idle;
            return ExchangeOutcome::Completed;
        };

        match serde_json::from_value::<InterruptPayload>(raw.clone()) {
            Ok(parsed) => {
                let pending = PendingInterrupt {
                    payload: parsed,
                    raw,
                };
                self.pending_interrupt = Some(pending.clone());
                self.phase = SessionPhase::AwaitingInterruptResolution;
                emit_update(updates, SessionUpdate::InterruptPending(pending));
                ExchangeOutcome::Interrupted
            }
            Err(error) => {
                tracing::warn!(error = %error, "interrupt payload does not match a known shape");
                self.phase = SessionPhase::Idle;
                ExchangeOutcome::Completed
            }
        }
    }

    fn cancel_exchange(&mut self) -> ExchangeOutcome {
        // a cancelled read never finalizes; the partial buffer is discarded
        self.stream_buffer.clear();
        self.phase = SessionPhase::Idle;
        tracing::debug!("exchange cancelled");
        ExchangeOutcome::Cancelled
    }

    fn fail_exchange(
        &mut self,
        error: anyhow::Error,
        updates: Option<&mpsc::UnboundedSender<SessionUpdate>>,
    ) -> ExchangeOutcome {
        tracing::warn!(error = %error, "exchange failed");
        self.stream_buffer.clear();
        self.append_error_message(&error, updates);
        self.phase = SessionPhase::Idle;
        ExchangeOutcome::Failed
    }
}

async fn next_chunk(
    stream: &mut ByteStream,
    idle_timeout: Option<Duration>,
) -> Result<Option<Bytes>> {
    match idle_timeout {
        Some(limit) => match tokio::time::timeout(limit, stream.next()).await {
            Ok(item) => item.transpose(),
            Err(_) => Err(anyhow!(
                "no frame received for {limit:?}; treating the stream as stalled"
            )),
        },
        None => stream.next().await.transpose(),
    }
}
