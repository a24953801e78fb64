use crate::api::types::DEFAULT_SYMBOL;
use crate::api::StockDataQuery;
use std::fmt;
use std::str::FromStr;

pub const AVAILABLE_INDICATORS: [&str; 5] = ["SMA(20)", "SMA(50)", "EMA(50)", "RSI(14)", "MACD"];

/// History window requested for every chart, whatever the timeframe.
pub const CHART_PERIOD: &str = "1y";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    H1,
    H4,
    #[default]
    D1,
    W1,
    Mo1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 8] = [
        Timeframe::M1,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::H1,
        Timeframe::H4,
        Timeframe::D1,
        Timeframe::W1,
        Timeframe::Mo1,
    ];

    /// Interval label sent to the backend as-is.
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
            Timeframe::W1 => "1w",
            Timeframe::Mo1 => "1mo",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Timeframe::ALL
            .into_iter()
            .find(|tf| tf.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<_> = Timeframe::ALL.iter().map(|tf| tf.as_str()).collect();
                anyhow::anyhow!("unknown timeframe {s:?} (expected one of {})", known.join(", "))
            })
    }
}

/// Symbol, timeframe and indicator selection shared by the chart and chat.
///
/// `revision` increases on every effective change and is what the chart
/// watches to decide when to refetch.
#[derive(Debug, Clone)]
pub struct ShellState {
    symbol: String,
    timeframe: Timeframe,
    indicators: Vec<String>,
    revision: u64,
}

impl Default for ShellState {
    fn default() -> Self {
        Self {
            symbol: DEFAULT_SYMBOL.to_string(),
            timeframe: Timeframe::default(),
            indicators: Vec::new(),
            revision: 0,
        }
    }
}

impl ShellState {
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// Active indicator labels in activation order.
    pub fn indicators(&self) -> &[String] {
        &self.indicators
    }

    pub fn is_active(&self, label: &str) -> bool {
        self.indicators.iter().any(|i| i == label)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Apply a symbol search. Blank input is ignored; anything else is
    /// trimmed and upper-cased. Returns whether the symbol changed.
    pub fn submit_symbol(&mut self, input: &str) -> bool {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return false;
        }
        let symbol = trimmed.to_uppercase();
        if symbol == self.symbol {
            return false;
        }
        tracing::info!(from = %self.symbol, to = %symbol, "symbol changed");
        self.symbol = symbol;
        self.bump();
        true
    }

    pub fn set_timeframe(&mut self, timeframe: Timeframe) -> bool {
        if timeframe == self.timeframe {
            return false;
        }
        self.timeframe = timeframe;
        self.bump();
        true
    }

    /// Flip `label` in the active set. Returns `true` if it is now active.
    pub fn toggle_indicator(&mut self, label: &str) -> bool {
        let active = match self.indicators.iter().position(|i| i == label) {
            Some(pos) => {
                self.indicators.remove(pos);
                false
            }
            None => {
                self.indicators.push(label.to_string());
                true
            }
        };
        self.bump();
        active
    }

    pub fn chart_query(&self) -> StockDataQuery {
        StockDataQuery {
            symbol: self.symbol.clone(),
            period: CHART_PERIOD.to_string(),
            interval: self.timeframe.as_str().to_string(),
            indicators: Some(self.indicators.clone()),
        }
    }

    fn bump(&mut self) {
        self.revision += 1;
    }
}
