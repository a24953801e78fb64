use crate::api::{
    ApiError, BrainApi, ChatChunk, ChatMessage, ChatStream, HealthResponse, StockDataQuery,
    StockDataResponse,
};
use std::collections::VecDeque;
use std::sync::Mutex;

type ChatScript = Result<Vec<Result<ChatChunk, ApiError>>, ApiError>;

/// In-process backend answering from queued scripts.
#[derive(Default)]
pub struct ScriptedApi {
    stock: Mutex<VecDeque<Result<StockDataResponse, ApiError>>>,
    chat: Mutex<VecDeque<ChatScript>>,
    pub queries: Mutex<Vec<StockDataQuery>>,
    pub chat_requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedApi {
    pub fn push_stock(&self, res: Result<StockDataResponse, ApiError>) {
        self.stock.lock().unwrap().push_back(res);
    }

    pub fn push_chat(&self, script: ChatScript) {
        self.chat.lock().unwrap().push_back(script);
    }
}

#[async_trait::async_trait]
impl BrainApi for ScriptedApi {
    async fn check_health(&self) -> Result<HealthResponse, ApiError> {
        Ok(HealthResponse {
            status: "ok".into(),
        })
    }

    async fn stream_chat(&self, messages: &[ChatMessage]) -> Result<ChatStream, ApiError> {
        self.chat_requests.lock().unwrap().push(messages.to_vec());
        let script = self
            .chat
            .lock()
            .unwrap()
            .pop_front()
            .expect("no chat script queued");
        script.map(ChatStream::from_items)
    }

    async fn get_stock_data_and_indicators(
        &self,
        query: &StockDataQuery,
    ) -> Result<StockDataResponse, ApiError> {
        self.queries.lock().unwrap().push(query.clone());
        self.stock
            .lock()
            .unwrap()
            .pop_front()
            .expect("no stock response queued")
    }
}
