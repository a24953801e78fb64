use chrono::DateTime;
use std::collections::BTreeMap;
use tradedash_core::api::{IndicatorDataItem, StockDataItem};
use tradedash_core::chart::{ChartSurface, LineSeriesOptions, SeriesId, CANDLE_DOWN_COLOR, CANDLE_UP_COLOR};

#[derive(Debug)]
struct Line {
    options: LineSeriesOptions,
    data: Vec<IndicatorDataItem>,
}

/// Text rendition of the chart: a summary printed every time the view is
/// rescaled.
#[derive(Debug, Default)]
pub struct TerminalSurface {
    title: String,
    next_id: u64,
    candles: Vec<StockDataItem>,
    lines: BTreeMap<SeriesId, Line>,
}

impl TerminalSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    fn summary(&self) -> String {
        let mut out = String::new();
        let header = if self.title.is_empty() { "chart" } else { self.title.as_str() };
        out.push_str(&format!("── {header} ──\n"));

        let (Some(first), Some(last)) = (self.candles.first(), self.candles.last()) else {
            out.push_str("no data\n");
            return out;
        };

        out.push_str(&format!(
            "{} bars  {} → {}\n",
            self.candles.len(),
            format_time(first.time),
            format_time(last.time)
        ));

        let (direction, color) = if last.close >= last.open {
            ("up", CANDLE_UP_COLOR)
        } else {
            ("down", CANDLE_DOWN_COLOR)
        };
        out.push_str(&format!(
            "last  O {:.2}  H {:.2}  L {:.2}  C {:.2}  ({direction} {color})\n",
            last.open, last.high, last.low, last.close
        ));

        let high = self.candles.iter().map(|c| c.high).fold(f64::MIN, f64::max);
        let low = self.candles.iter().map(|c| c.low).fold(f64::MAX, f64::min);
        out.push_str(&format!("range {low:.2} – {high:.2}\n"));

        for line in self.lines.values() {
            let last_value = line
                .data
                .last()
                .map(|p| format!("{:.2}", p.value))
                .unwrap_or_else(|| "n/a".to_string());
            out.push_str(&format!(
                "  {:<14} {}  last {last_value}  ({} pts)\n",
                line.options.title,
                line.options.color,
                line.data.len()
            ));
        }
        out
    }
}

/// Server times are epoch seconds; values that only make sense as
/// milliseconds are scaled down.
fn format_time(time: f64) -> String {
    let secs = if time > 1.0e11 { time / 1000.0 } else { time };
    DateTime::from_timestamp(secs as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| format!("{time}"))
}

impl ChartSurface for TerminalSurface {
    fn set_candles(&mut self, data: &[StockDataItem]) {
        self.candles = data.to_vec();
    }

    fn add_line_series(&mut self, options: LineSeriesOptions) -> SeriesId {
        self.next_id += 1;
        let id = SeriesId(self.next_id);
        self.lines.insert(
            id,
            Line {
                options,
                data: Vec::new(),
            },
        );
        id
    }

    fn set_line_data(&mut self, series: SeriesId, data: &[IndicatorDataItem]) {
        if let Some(line) = self.lines.get_mut(&series) {
            line.data = data.to_vec();
        }
    }

    fn remove_series(&mut self, series: SeriesId) {
        self.lines.remove(&series);
    }

    fn fit_content(&mut self) {
        print!("{}", self.summary());
    }

    fn set_loading(&mut self, loading: bool) {
        if loading {
            eprintln!("Loading chart...");
        }
    }

    fn remove(&mut self) {
        self.candles.clear();
        self.lines.clear();
    }
}
