//! Chart rendering against an external charting surface.

pub mod renderer;

pub use renderer::{ChartRenderer, FetchTicket, RenderOutcome};

use crate::api::{IndicatorDataItem, StockDataItem};

pub const CANDLE_UP_COLOR: &str = "#26A69A";
pub const CANDLE_DOWN_COLOR: &str = "#EF5350";

/// Indicator colors, assigned by position in the response (not by name).
pub const INDICATOR_PALETTE: [&str; 4] = ["#2962FF", "#FF6D00", "#FFD600", "#4CAF50"];
pub const INDICATOR_LINE_WIDTH: u32 = 2;

pub fn palette_color(index: usize) -> &'static str {
    INDICATOR_PALETTE[index % INDICATOR_PALETTE.len()]
}

/// Handle to a line series owned by a [`ChartSurface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineSeriesOptions {
    pub title: String,
    pub color: &'static str,
    pub line_width: u32,
}

/// The charting library, seen from the renderer: one candlestick series plus
/// any number of line series.
pub trait ChartSurface {
    /// Replace the candlestick dataset wholesale.
    fn set_candles(&mut self, data: &[StockDataItem]);
    fn add_line_series(&mut self, options: LineSeriesOptions) -> SeriesId;
    fn set_line_data(&mut self, series: SeriesId, data: &[IndicatorDataItem]);
    fn remove_series(&mut self, series: SeriesId);
    /// Rescale the time axis to the full dataset.
    fn fit_content(&mut self);
    fn set_loading(&mut self, loading: bool);
    /// Tear down the surface. No other call follows.
    fn remove(&mut self);
}

#[cfg(test)]
pub(crate) mod recording {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Debug, Default)]
    pub struct RecordingSurface {
        next_id: u64,
        pub candles: Vec<StockDataItem>,
        pub candle_writes: usize,
        pub lines: BTreeMap<SeriesId, (LineSeriesOptions, Vec<IndicatorDataItem>)>,
        pub removed: Vec<SeriesId>,
        pub fits: usize,
        pub loading: bool,
        pub loading_changes: Vec<bool>,
        pub surface_removed: bool,
    }

    impl RecordingSurface {
        pub fn line_titles(&self) -> Vec<String> {
            let mut titles: Vec<_> = self.lines.values().map(|(o, _)| o.title.clone()).collect();
            titles.sort();
            titles
        }

        fn assert_live(&self, call: &str) {
            assert!(!self.surface_removed, "{call} after the surface was removed");
        }

        pub fn color_of(&self, title: &str) -> Option<&'static str> {
            self.lines
                .values()
                .find(|(o, _)| o.title == title)
                .map(|(o, _)| o.color)
        }
    }

    impl ChartSurface for RecordingSurface {
        fn set_candles(&mut self, data: &[StockDataItem]) {
            self.assert_live("set_candles");
            self.candles = data.to_vec();
            self.candle_writes += 1;
        }

        fn add_line_series(&mut self, options: LineSeriesOptions) -> SeriesId {
            self.assert_live("add_line_series");
            self.next_id += 1;
            let id = SeriesId(self.next_id);
            self.lines.insert(id, (options, Vec::new()));
            id
        }

        fn set_line_data(&mut self, series: SeriesId, data: &[IndicatorDataItem]) {
            self.assert_live("set_line_data");
            let entry = self.lines.get_mut(&series).expect("set_line_data on unknown series");
            entry.1 = data.to_vec();
        }

        fn remove_series(&mut self, series: SeriesId) {
            self.assert_live("remove_series");
            assert!(
                self.lines.remove(&series).is_some(),
                "remove_series on unknown series {series:?}"
            );
            self.removed.push(series);
        }

        fn fit_content(&mut self) {
            self.assert_live("fit_content");
            self.fits += 1;
        }

        fn set_loading(&mut self, loading: bool) {
            self.assert_live("set_loading");
            self.loading = loading;
            self.loading_changes.push(loading);
        }

        fn remove(&mut self) {
            assert!(!self.surface_removed, "surface removed twice");
            self.surface_removed = true;
        }
    }
}
