use crate::api::client::{ByteStream, MockStreamProducer};
use crate::types::ChatRequest;
use anyhow::{anyhow, Result};
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::sync::{Arc, Mutex};

/// Scripted transport for session tests: pops one response per exchange and
/// records every request it saw.
#[derive(Clone)]
pub struct MockChatClient {
    responses: Arc<Mutex<Vec<ScriptedResponse>>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

pub struct ScriptedResponse {
    chunks: Vec<String>,
    trailing_error: Option<String>,
    leave_open: bool,
}

impl ScriptedResponse {
    /// Each entry is delivered verbatim as one byte chunk, so tests control
    /// exactly where frames split.
    pub fn new(chunks: Vec<String>) -> Self {
        Self {
            chunks,
            trailing_error: None,
            leave_open: false,
        }
    }

    /// Inject a transport error after the scripted chunks.
    pub fn with_error(mut self, message: &str) -> Self {
        self.trailing_error = Some(message.to_string());
        self
    }

    /// Keep the stream open (pending forever) after the scripted chunks, for
    /// cancellation and idle-timeout tests.
    pub fn leave_open(mut self) -> Self {
        self.leave_open = true;
        self
    }
}

impl MockChatClient {
    pub fn new(responses: Vec<ScriptedResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every request the session put on the wire, in order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl MockStreamProducer for MockChatClient {
    fn open_mock_stream(&self, request: &ChatRequest) -> Result<ByteStream> {
        self.requests.lock().unwrap().push(request.clone());

        let mut responses_guard = self.responses.lock().unwrap();
        if responses_guard.is_empty() {
            return Err(anyhow!("MockChatClient: no more scripted responses"));
        }
        let scripted = responses_guard.remove(0);

        let mut items: Vec<Result<Bytes>> = scripted
            .chunks
            .into_iter()
            .map(|chunk| Ok(Bytes::from(chunk)))
            .collect();
        if let Some(message) = scripted.trailing_error {
            items.push(Err(anyhow!(message)));
        }

        if scripted.leave_open {
            Ok(Box::pin(stream::iter(items).chain(stream::pending())))
        } else {
            Ok(Box::pin(stream::iter(items)))
        }
    }
}
