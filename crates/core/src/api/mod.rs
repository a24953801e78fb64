pub mod error;
#[cfg(test)]
pub(crate) mod fake;
pub mod http;
pub mod sse;
pub mod types;

pub use error::ApiError;
pub use http::HttpBrainClient;
pub use sse::ChatStream;
pub use types::{
    ChatChunk, ChatMessage, ChatRole, HealthResponse, IndicatorData, IndicatorDataItem,
    StockDataItem, StockDataQuery, StockDataResponse,
};

/// The three backend operations. Every call is a single round-trip (or stream);
/// retry and caching are left to callers.
#[async_trait::async_trait]
pub trait BrainApi: Send + Sync {
    async fn check_health(&self) -> Result<HealthResponse, ApiError>;

    /// Opens a new stream over the full `messages` history.
    async fn stream_chat(&self, messages: &[ChatMessage]) -> Result<ChatStream, ApiError>;

    async fn get_stock_data_and_indicators(
        &self,
        query: &StockDataQuery,
    ) -> Result<StockDataResponse, ApiError>;
}
