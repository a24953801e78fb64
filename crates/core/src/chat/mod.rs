//! Chat history and the streaming state machine behind the assistant panel.

use crate::api::{ApiError, BrainApi, ChatChunk, ChatMessage};
use futures::StreamExt;
use thiserror::Error;
use tokio::sync::watch;

pub const GREETING: &str = "Hello! I'm your AI trading assistant. Ask me about stocks, request indicators, or change timeframes using natural language.";
pub const CONNECT_ERROR_MESSAGE: &str = "Error: Could not connect to the AI assistant.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    Idle,
    Sending,
    Streaming,
    /// The upstream reported an error mid-stream; the stream may still continue.
    Errored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("message is empty")]
    Empty,
    #[error("the assistant is still responding")]
    Busy,
}

/// A submitted turn: the history to send and the id of its placeholder.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub id: StreamId,
    pub request: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    Cancelled,
    ConnectionFailed,
}

/// What changed in the placeholder, for callers rendering incrementally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatUpdate<'a> {
    Chunk(&'a str),
    Error(&'a str),
    ConnectionFailed,
}

#[derive(Debug, Clone, Copy)]
struct ActiveTurn {
    id: StreamId,
    placeholder: usize,
}

#[derive(Debug)]
pub struct ChatPanel {
    history: Vec<ChatMessage>,
    input: String,
    state: ChatState,
    active: Option<ActiveTurn>,
    next_id: u64,
}

impl Default for ChatPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatPanel {
    pub fn new() -> Self {
        Self::with_history(vec![ChatMessage::ai(GREETING)])
    }

    pub fn with_history(history: Vec<ChatMessage>) -> Self {
        Self {
            history,
            input: String::new(),
            state: ChatState::Idle,
            active: None,
            next_id: 0,
        }
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn last_message(&self) -> Option<&ChatMessage> {
        self.history.last()
    }

    pub fn state(&self) -> ChatState {
        self.state
    }

    /// Input is only accepted while idle.
    pub fn accepts_input(&self) -> bool {
        self.state == ChatState::Idle
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, input: impl Into<String>) {
        self.input = input.into();
    }

    /// Append the user message and an empty assistant placeholder, clear the
    /// input, and hand back the turn to stream.
    pub fn submit(&mut self) -> Result<ChatTurn, SubmitError> {
        if self.input.trim().is_empty() {
            return Err(SubmitError::Empty);
        }
        if !self.accepts_input() {
            return Err(SubmitError::Busy);
        }

        let content = std::mem::take(&mut self.input);
        self.history.push(ChatMessage::user(content));
        let request = self.history.clone();

        self.next_id += 1;
        let id = StreamId(self.next_id);
        self.history.push(ChatMessage::ai(String::new()));
        self.active = Some(ActiveTurn {
            id,
            placeholder: self.history.len() - 1,
        });
        self.state = ChatState::Sending;

        Ok(ChatTurn { id, request })
    }

    pub fn submit_text(&mut self, text: impl Into<String>) -> Result<ChatTurn, SubmitError> {
        self.set_input(text);
        self.submit()
    }

    fn placeholder_mut(&mut self, id: StreamId) -> Option<&mut ChatMessage> {
        match self.active {
            Some(active) if active.id == id => self.history.get_mut(active.placeholder),
            _ => {
                tracing::warn!(?id, "ignoring event for a stream that is not active");
                None
            }
        }
    }

    pub fn on_stream_opened(&mut self, id: StreamId) {
        if self.placeholder_mut(id).is_some() && self.state == ChatState::Sending {
            self.state = ChatState::Streaming;
        }
    }

    pub fn on_chunk(&mut self, id: StreamId, text: &str) {
        if let Some(msg) = self.placeholder_mut(id) {
            msg.content.push_str(text);
        }
    }

    pub fn on_error(&mut self, id: StreamId, error: &str) {
        if let Some(msg) = self.placeholder_mut(id) {
            msg.content = format!("Error: {error}");
            self.state = ChatState::Errored;
            tracing::error!(?id, error, "error from chat stream");
        }
    }

    pub fn on_connect_failed(&mut self, id: StreamId, error: &ApiError) {
        if let Some(msg) = self.placeholder_mut(id) {
            msg.content = CONNECT_ERROR_MESSAGE.to_string();
            tracing::error!(?id, error = %error, "failed to fetch chat stream");
            self.finish(id);
        }
    }

    pub fn on_closed(&mut self, id: StreamId) {
        if self.placeholder_mut(id).is_some() {
            self.finish(id);
        }
    }

    /// Stop applying events for `id`, keeping whatever content arrived.
    pub fn on_cancelled(&mut self, id: StreamId) {
        if self.placeholder_mut(id).is_some() {
            tracing::info!(?id, "chat stream cancelled");
            self.finish(id);
        }
    }

    fn finish(&mut self, id: StreamId) {
        if self.active.map(|a| a.id) == Some(id) {
            self.active = None;
            self.state = ChatState::Idle;
        }
    }

    /// Run `turn` to completion: open the stream, then pull chunks until the
    /// server closes it, it fails, or `cancel` flips to `true`.
    pub async fn drive<F>(
        &mut self,
        api: &dyn BrainApi,
        turn: ChatTurn,
        mut cancel: watch::Receiver<bool>,
        mut on_update: F,
    ) -> TurnOutcome
    where
        F: FnMut(ChatUpdate<'_>),
    {
        let id = turn.id;

        let opened = tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => {
                self.on_cancelled(id);
                return TurnOutcome::Cancelled;
            }
            res = api.stream_chat(&turn.request) => res,
        };

        let mut stream = match opened {
            Ok(stream) => stream,
            Err(err) => {
                self.on_connect_failed(id, &err);
                on_update(ChatUpdate::ConnectionFailed);
                return TurnOutcome::ConnectionFailed;
            }
        };
        self.on_stream_opened(id);

        loop {
            let next = tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => {
                    self.on_cancelled(id);
                    return TurnOutcome::Cancelled;
                }
                item = stream.next() => item,
            };

            match next {
                Some(Ok(ChatChunk::Chunk(text))) => {
                    self.on_chunk(id, &text);
                    on_update(ChatUpdate::Chunk(&text));
                }
                Some(Ok(ChatChunk::Error(error))) => {
                    self.on_error(id, &error);
                    on_update(ChatUpdate::Error(&error));
                }
                Some(Err(err)) => {
                    self.on_connect_failed(id, &err);
                    on_update(ChatUpdate::ConnectionFailed);
                    return TurnOutcome::ConnectionFailed;
                }
                None => {
                    self.on_closed(id);
                    return TurnOutcome::Completed;
                }
            }
        }
    }
}

/// Resolves once the flag is `true`; never resolves if the sender is gone.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|cancel| *cancel).await.is_err() {
        std::future::pending::<()>().await;
    }
}
