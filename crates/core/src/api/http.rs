use crate::api::error::ApiError;
use crate::api::sse::ChatStream;
use crate::api::types::{
    ChatMessage, ChatRequest, HealthResponse, HttpValidationError, StockDataQuery,
    StockDataResponse,
};
use crate::api::BrainApi;
use crate::config::Settings;
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;

const HEALTH_PATH: &str = "/_healthz";
const CHAT_PATH: &str = "/routes/gemini/chat";
const STOCK_DATA_PATH: &str = "/routes/stock-data/";

#[derive(Debug, Clone)]
pub struct HttpBrainClient {
    http: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

impl HttpBrainClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let base_url = settings.require_api_base_url()?.to_string();

        let mut headers = HeaderMap::new();
        if let Some(api_key) = &settings.api_key {
            headers.insert(
                "x-api-key",
                HeaderValue::from_str(api_key).context("BRAIN_API_KEY is not a valid header value")?,
            );
        }

        // No overall timeout on the client: chat streams stay open as long as
        // the model keeps producing. JSON calls set a per-request timeout.
        let http = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .default_headers(headers)
            .build()
            .context("failed to build backend http client")?;

        Ok(Self {
            http,
            base_url,
            request_timeout: settings.request_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn read_json<T: DeserializeOwned>(res: reqwest::Response) -> Result<T, ApiError> {
        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            return Err(error_from_body(status, &text));
        }
        serde_json::from_str::<T>(&text)
            .map_err(|e| ApiError::Decode(format!("unexpected response body ({e}): {text}")))
    }
}

fn error_from_body(status: StatusCode, text: &str) -> ApiError {
    if status == StatusCode::UNPROCESSABLE_ENTITY {
        if let Ok(v) = serde_json::from_str::<HttpValidationError>(text) {
            return ApiError::Validation(v);
        }
    }

    // FastAPI-style `{"detail": "..."}`; fall back to the raw body.
    let detail = serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .unwrap_or_else(|| text.to_string());
    ApiError::Status { status, detail }
}

#[async_trait::async_trait]
impl BrainApi for HttpBrainClient {
    async fn check_health(&self) -> Result<HealthResponse, ApiError> {
        let res = self
            .http
            .get(self.url(HEALTH_PATH))
            .timeout(self.request_timeout)
            .send()
            .await?;
        Self::read_json(res).await
    }

    async fn stream_chat(&self, messages: &[ChatMessage]) -> Result<ChatStream, ApiError> {
        tracing::debug!(messages = messages.len(), "opening chat stream");
        let res = self
            .http
            .post(self.url(CHAT_PATH))
            .header(ACCEPT, "text/event-stream")
            .json(&ChatRequest { messages })
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await?;
            return Err(error_from_body(status, &text));
        }
        Ok(ChatStream::from_response(res))
    }

    async fn get_stock_data_and_indicators(
        &self,
        query: &StockDataQuery,
    ) -> Result<StockDataResponse, ApiError> {
        tracing::debug!(
            symbol = %query.symbol,
            period = %query.period,
            interval = %query.interval,
            indicators = ?query.indicators,
            "fetching stock data"
        );
        let res = self
            .http
            .get(self.url(STOCK_DATA_PATH))
            .query(&query.query_pairs())
            .timeout(self.request_timeout)
            .send()
            .await?;
        Self::read_json(res).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::ChatChunk;
    use axum::extract::Query;
    use axum::http::header::CONTENT_TYPE;
    use axum::http::StatusCode as AxumStatus;
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use futures::StreamExt;
    use serde_json::{json, Value};

    async fn stock_data(Query(pairs): Query<Vec<(String, String)>>) -> axum::response::Response {
        let symbol = pairs
            .iter()
            .find(|(k, _)| k == "symbol")
            .map(|(_, v)| v.clone())
            .unwrap_or_default();

        let has = |key: &str| pairs.iter().any(|(k, _)| k == key);

        match symbol.as_str() {
            _ if !has("period") || !has("interval") => (
                AxumStatus::UNPROCESSABLE_ENTITY,
                Json(json!({"detail": [{"loc": ["query"], "msg": "missing", "type": "missing"}]})),
            )
                .into_response(),
            "BAD" => (
                AxumStatus::UNPROCESSABLE_ENTITY,
                Json(json!({
                    "detail": [{"loc": ["query", "symbol"], "msg": "invalid symbol", "type": "value_error"}]
                })),
            )
                .into_response(),
            "BOOM" => (
                AxumStatus::INTERNAL_SERVER_ERROR,
                Json(json!({"detail": "An error occurred while fetching stock data"})),
            )
                .into_response(),
            _ => {
                let indicators: Vec<Value> = pairs
                    .iter()
                    .filter(|(k, _)| k == "indicators")
                    .map(|(_, name)| json!({"name": name, "data": [{"time": 2.0, "value": 10.5}]}))
                    .collect();
                Json(json!({
                    "data": [
                        {"time": 1.0, "open": 1.0, "high": 2.0, "low": 0.5, "close": 1.5},
                        {"time": 2.0, "open": 1.5, "high": 2.5, "low": 1.0, "close": 2.0}
                    ],
                    "indicators": indicators
                }))
                .into_response()
            }
        }
    }

    async fn chat(Json(body): Json<Value>) -> axum::response::Response {
        let count = body["messages"].as_array().map(|m| m.len()).unwrap_or(0);
        if count == 0 {
            return (
                AxumStatus::UNPROCESSABLE_ENTITY,
                Json(json!({
                    "detail": [{"loc": ["body", "messages"], "msg": "empty history", "type": "value_error"}]
                })),
            )
                .into_response();
        }
        let sse = "data: {\"chunk\": \"Hel\"}\n\n: ping\n\ndata: {\"chunk\": \"lo\"}\n\n";
        ([(CONTENT_TYPE, "text/event-stream")], sse).into_response()
    }

    async fn spawn_backend() -> HttpBrainClient {
        let app = Router::new()
            .route("/_healthz", get(|| async { Json(json!({"status": "healthy"})) }))
            .route("/routes/stock-data/", get(stock_data))
            .route("/routes/gemini/chat", post(chat));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        HttpBrainClient::from_settings(&Settings::for_base_url(format!("http://{addr}/"))).unwrap()
    }

    #[tokio::test]
    async fn health_check_returns_status() {
        let client = spawn_backend().await;
        let health = client.check_health().await.unwrap();
        assert_eq!(health.status, "healthy");
    }

    #[tokio::test]
    async fn stock_data_sends_indicator_labels_verbatim() {
        let client = spawn_backend().await;
        let query = StockDataQuery {
            symbol: "MSFT".into(),
            interval: "1h".into(),
            indicators: Some(vec!["SMA(20)".into(), "RSI(14)".into()]),
            ..Default::default()
        };
        let res = client.get_stock_data_and_indicators(&query).await.unwrap();
        assert_eq!(res.data.len(), 2);
        let names: Vec<_> = res.indicator_names().collect();
        assert_eq!(names, vec!["SMA(20)", "RSI(14)"]);
    }

    #[tokio::test]
    async fn validation_failure_is_structured() {
        let client = spawn_backend().await;
        let query = StockDataQuery {
            symbol: "BAD".into(),
            ..Default::default()
        };
        let err = client.get_stock_data_and_indicators(&query).await.unwrap_err();
        let v = err.validation().expect("validation error");
        assert_eq!(v.detail[0].location(), "query.symbol");
        assert_eq!(v.detail[0].message(), "invalid symbol");
        assert!(!err.is_transport());
    }

    #[tokio::test]
    async fn server_error_maps_to_status_with_detail() {
        let client = spawn_backend().await;
        let query = StockDataQuery {
            symbol: "BOOM".into(),
            ..Default::default()
        };
        let err = client.get_stock_data_and_indicators(&query).await.unwrap_err();
        match err {
            ApiError::Status { status, detail } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert!(detail.contains("fetching stock data"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn chat_stream_yields_chunks() {
        let client = spawn_backend().await;
        let stream = client
            .stream_chat(&[ChatMessage::user("hi")])
            .await
            .unwrap();
        let chunks: Vec<_> = stream.map(|r| r.unwrap()).collect().await;
        assert_eq!(
            chunks,
            vec![ChatChunk::Chunk("Hel".into()), ChatChunk::Chunk("lo".into())]
        );
    }

    #[tokio::test]
    async fn chat_open_failure_surfaces_validation() {
        let client = spawn_backend().await;
        let err = client.stream_chat(&[]).await.unwrap_err();
        assert!(err.validation().is_some());
    }

    #[tokio::test]
    async fn unreachable_backend_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client =
            HttpBrainClient::from_settings(&Settings::for_base_url(format!("http://{addr}"))).unwrap();
        let err = client.check_health().await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }
}
