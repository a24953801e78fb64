//! The dashboard shell: shared UI state plus the chart and chat it drives.

pub mod dashboard;
pub mod state;

pub use dashboard::Dashboard;
pub use state::{ShellState, Timeframe, AVAILABLE_INDICATORS, CHART_PERIOD};
