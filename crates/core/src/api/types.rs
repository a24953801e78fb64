use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_SYMBOL: &str = "AAPL";
pub const DEFAULT_PERIOD: &str = "1y";
pub const DEFAULT_INTERVAL: &str = "1d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Ai,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Ai,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub messages: &'a [ChatMessage],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// One OHLC bar. `time` is whatever epoch unit the server uses (seconds today).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StockDataItem {
    pub time: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorDataItem {
    pub time: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorData {
    pub name: String,
    pub data: Vec<IndicatorDataItem>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StockDataResponse {
    pub data: Vec<StockDataItem>,
    #[serde(default)]
    pub indicators: Vec<IndicatorData>,
}

impl StockDataResponse {
    pub fn indicator_names(&self) -> impl Iterator<Item = &str> {
        self.indicators.iter().map(|i| i.name.as_str())
    }
}

/// Query for `GET /routes/stock-data/`.
///
/// Indicator labels such as `SMA(20)` are forwarded verbatim; the backend owns
/// their grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockDataQuery {
    pub symbol: String,
    pub period: String,
    pub interval: String,
    pub indicators: Option<Vec<String>>,
}

impl Default for StockDataQuery {
    fn default() -> Self {
        Self {
            symbol: DEFAULT_SYMBOL.to_string(),
            period: DEFAULT_PERIOD.to_string(),
            interval: DEFAULT_INTERVAL.to_string(),
            indicators: None,
        }
    }
}

impl StockDataQuery {
    /// Query pairs in wire order. Indicators use a repeated key, which is how
    /// the backend reads list parameters.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("symbol", self.symbol.clone()),
            ("period", self.period.clone()),
            ("interval", self.interval.clone()),
        ];
        if let Some(indicators) = &self.indicators {
            pairs.extend(indicators.iter().map(|i| ("indicators", i.clone())));
        }
        pairs
    }
}

/// Raw SSE payload of the chat stream: `{chunk?: string, error?: string}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct StreamChatFrame {
    #[serde(default)]
    pub chunk: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatChunk {
    /// Text fragment to append to the trailing assistant message.
    Chunk(String),
    /// Application-level error reported by the upstream model. Not necessarily final.
    Error(String),
}

impl StreamChatFrame {
    pub(crate) fn into_chunks(self) -> impl Iterator<Item = ChatChunk> {
        let chunk = self
            .chunk
            .filter(|c| !c.is_empty())
            .map(ChatChunk::Chunk);
        let error = self.error.map(ChatChunk::Error);
        chunk.into_iter().chain(error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocSegment {
    Index(u64),
    Field(String),
}

impl fmt::Display for LocSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocSegment::Index(i) => write!(f, "{i}"),
            LocSegment::Field(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub loc: Vec<LocSegment>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl ValidationError {
    /// Dotted location, e.g. `query.indicators.0`.
    pub fn location(&self) -> String {
        self.loc
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }

    pub fn message(&self) -> &str {
        &self.msg
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.location(), self.msg, self.kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HttpValidationError {
    #[serde(default)]
    pub detail: Vec<ValidationError>,
}

impl fmt::Display for HttpValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.detail.iter().map(|d| d.to_string()).collect();
        f.write_str(&parts.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_query_matches_backend_defaults() {
        let q = StockDataQuery::default();
        assert_eq!(
            q.query_pairs(),
            vec![
                ("symbol", "AAPL".to_string()),
                ("period", "1y".to_string()),
                ("interval", "1d".to_string()),
            ]
        );
    }

    #[test]
    fn indicators_are_repeated_and_verbatim() {
        let q = StockDataQuery {
            indicators: Some(vec!["SMA(20)".into(), "MACD(12,26,9)".into()]),
            ..Default::default()
        };
        let pairs = q.query_pairs();
        let indicators: Vec<_> = pairs
            .iter()
            .filter(|(k, _)| *k == "indicators")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(indicators, vec!["SMA(20)", "MACD(12,26,9)"]);
    }

    #[test]
    fn chat_roles_use_wire_names() {
        let v = serde_json::to_value(ChatMessage::ai("hi")).unwrap();
        assert_eq!(v, json!({"role": "ai", "content": "hi"}));
        let m: ChatMessage = serde_json::from_value(json!({"role": "user", "content": "x"})).unwrap();
        assert_eq!(m.role, ChatRole::User);
    }

    #[test]
    fn frame_with_both_keys_yields_chunk_then_error() {
        let frame: StreamChatFrame =
            serde_json::from_value(json!({"chunk": "A", "error": "boom"})).unwrap();
        let chunks: Vec<_> = frame.into_chunks().collect();
        assert_eq!(
            chunks,
            vec![ChatChunk::Chunk("A".into()), ChatChunk::Error("boom".into())]
        );
    }

    #[test]
    fn empty_chunk_is_dropped() {
        let frame: StreamChatFrame = serde_json::from_value(json!({"chunk": ""})).unwrap();
        assert_eq!(frame.into_chunks().count(), 0);
    }

    #[test]
    fn validation_error_parses_mixed_locations() {
        let v = json!({
            "detail": [
                {"loc": ["query", "indicators", 0], "msg": "field required", "type": "value_error.missing"}
            ]
        });
        let parsed: HttpValidationError = serde_json::from_value(v).unwrap();
        assert_eq!(parsed.detail.len(), 1);
        assert_eq!(parsed.detail[0].location(), "query.indicators.0");
        assert_eq!(parsed.detail[0].message(), "field required");
        assert_eq!(parsed.detail[0].kind, "value_error.missing");
    }

    #[test]
    fn stock_response_tolerates_missing_indicators() {
        let v = json!({"data": [{"time": 1.0, "open": 1.0, "high": 2.0, "low": 0.5, "close": 1.5}]});
        let parsed: StockDataResponse = serde_json::from_value(v).unwrap();
        assert_eq!(parsed.data.len(), 1);
        assert!(parsed.indicators.is_empty());
    }
}
